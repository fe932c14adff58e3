use image::RgbImage;

/// A single decoded video frame with metadata.
pub struct Frame {
    /// The frame's image data.
    pub image: RgbImage,
    /// Frame number from the start of the source (0-based).
    pub frame_number: u64,
}

/// Result of asking a capture session for its next frame.
pub enum ReadOutcome {
    Frame(Frame),
    /// The source has no more frames.
    EndOfStream,
    /// The source failed mid-stream. Callers currently treat this like
    /// [`ReadOutcome::EndOfStream`] but it is kept distinct for logging.
    ReadError(anyhow::Error),
}
