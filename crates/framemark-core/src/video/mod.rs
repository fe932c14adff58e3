pub mod decoder;
pub mod encoder;
pub mod fourcc;
pub mod frame;
pub mod preview;
pub mod probe;
mod stderr;
