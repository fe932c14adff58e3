use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::PipelineError;
use crate::overlay::FrameAnnotator;
use crate::progress::Progress;
use crate::video::decoder::{FrameSource, VideoDecoder};
use crate::video::encoder::{FrameSink, OutputFormat, VideoEncoder};
use crate::video::frame::ReadOutcome;
use crate::video::preview::{FramePreview, PreviewEvent, PreviewWindow};

/// Parameters for the annotation pipeline.
pub struct PipelineConfig {
    /// Mirror every frame to a preview window; `q` stops early.
    pub watch: bool,
    /// Font for the frame counter, or None to search system fonts.
    pub font: Option<PathBuf>,
    /// Print the progress line to stdout.
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            watch: false,
            font: None,
            show_progress: true,
        }
    }
}

/// Why the frame loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEnd {
    EndOfStream,
    /// A read failed mid-stream; handled like the end of the stream.
    ReadError,
    /// The sink rejected a frame; the cause is reported when it is released.
    WriteError,
    /// The user quit from the preview window.
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub frames_written: u64,
    pub ended_by: LoopEnd,
}

/// Annotate every frame of `input` with its index and write the result to `output`.
///
/// The output takes its geometry, frame rate and codec from the input.
pub fn process_file(
    input: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<Summary, PipelineError> {
    info!(?input, ?output, watch = config.watch, "pipeline starting");

    let mut decoder =
        VideoDecoder::open(input).map_err(|reason| PipelineError::SourceUnavailable {
            path: input.to_path_buf(),
            reason,
        })?;

    let format = output_format(&decoder)?;
    let annotator = FrameAnnotator::new(config.font.as_deref()).map_err(PipelineError::Overlay)?;

    let mut encoder =
        VideoEncoder::open(output, &format).map_err(|reason| PipelineError::SinkUnavailable {
            path: output.to_path_buf(),
            reason,
        })?;

    let mut preview = if config.watch {
        match PreviewWindow::open(format.width, format.height, format.fps) {
            Ok(window) => Some(window),
            Err(e) => {
                warn!(error = %e, "preview unavailable, continuing without it");
                None
            }
        }
    } else {
        None
    };

    let mut progress_out: Box<dyn Write> = if config.show_progress {
        Box::new(io::stdout())
    } else {
        Box::new(io::sink())
    };

    let summary = transcode(
        &mut decoder,
        &mut encoder,
        preview.as_mut().map(|p| p as &mut dyn FramePreview),
        &annotator,
        &mut progress_out,
    )?;

    info!(
        frames_written = summary.frames_written,
        ended_by = ?summary.ended_by,
        ?output,
        "pipeline complete"
    );
    Ok(summary)
}

/// Derive the writer's format from the source, refusing frames with no area.
pub fn output_format(source: &dyn FrameSource) -> Result<OutputFormat, PipelineError> {
    let props = source.properties();
    if props.width == 0 || props.height == 0 {
        warn!(width = props.width, height = props.height, "refusing to encode empty frames");
        return Err(PipelineError::InvalidGeometry {
            width: props.width,
            height: props.height,
        });
    }
    Ok(OutputFormat::from_properties(props))
}

/// Run the frame loop, then release both sessions.
///
/// The source and sink are released exactly once here regardless of how the
/// loop ended.
pub fn transcode(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    preview: Option<&mut dyn FramePreview>,
    annotator: &FrameAnnotator,
    progress_out: &mut dyn Write,
) -> Result<Summary, PipelineError> {
    let summary = run_loop(source, sink, preview, annotator, progress_out);

    source.release();
    sink.release().map_err(PipelineError::SinkFailed)?;

    Ok(summary)
}

fn run_loop(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    mut preview: Option<&mut dyn FramePreview>,
    annotator: &FrameAnnotator,
    progress_out: &mut dyn Write,
) -> Summary {
    let mut progress = Progress::start(source.properties().frame_count);
    let mut frames_written = 0;

    let ended_by = loop {
        let mut frame = match source.read_frame() {
            ReadOutcome::Frame(frame) => frame,
            ReadOutcome::EndOfStream => break LoopEnd::EndOfStream,
            ReadOutcome::ReadError(e) => {
                warn!(index = progress.index(), error = %e, "frame read failed, ending stream");
                break LoopEnd::ReadError;
            }
        };

        annotator.annotate(&mut frame.image, progress.index());

        if let Err(e) = sink.write_frame(&frame) {
            warn!(index = progress.index(), error = %e, "frame write failed, ending stream");
            break LoopEnd::WriteError;
        }
        frames_written += 1;

        if let Some(preview) = preview.as_deref_mut() {
            if preview.show(&frame) == PreviewEvent::Quit {
                info!(index = progress.index(), "quit requested from preview");
                break LoopEnd::Quit;
            }
        }

        if let Err(e) = progress.report(progress_out) {
            warn!(error = %e, "failed to print progress");
        }
    };

    if progress.index() > 0 {
        let _ = writeln!(progress_out);
    }

    Summary {
        frames_written,
        ended_by,
    }
}
