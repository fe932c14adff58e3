use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by [`crate::pipeline::process_file`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input could not be opened as a video source.
    #[error("cannot open input file {path}: {reason:#}")]
    SourceUnavailable {
        path: PathBuf,
        reason: anyhow::Error,
    },

    /// The input reported a frame size that cannot be encoded.
    #[error("input reports invalid frame geometry {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },

    /// The overlay font could not be loaded.
    #[error("cannot load overlay font: {0:#}")]
    Overlay(anyhow::Error),

    /// The output encoder could not be started.
    #[error("cannot open output file {path}: {reason:#}")]
    SinkUnavailable {
        path: PathBuf,
        reason: anyhow::Error,
    },

    /// The output encoder did not finalize the container cleanly.
    #[error("failed to finalize output: {0:#}")]
    SinkFailed(anyhow::Error),
}
