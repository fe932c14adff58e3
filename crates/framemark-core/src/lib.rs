pub mod error;
pub mod overlay;
pub mod pipeline;
pub mod progress;
pub mod video;

pub use error::PipelineError;
