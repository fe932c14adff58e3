mod cli;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use framemark_core::pipeline::{self, PipelineConfig};
use framemark_core::PipelineError;

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries the progress line. RUST_LOG=info shows pipeline events.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = cli::Cli::parse();

    match annotate(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", error_line(&e));
            ExitCode::FAILURE
        }
    }
}

fn annotate(cli: cli::Cli) -> Result<()> {
    let config = PipelineConfig {
        watch: cli.watch,
        font: cli.font,
        show_progress: !cli.no_progress,
    };

    let summary = pipeline::process_file(&cli.input, &cli.output, &config)?;
    info!(
        frames = summary.frames_written,
        ended_by = ?summary.ended_by,
        output = ?cli.output,
        "annotation complete"
    );
    Ok(())
}

/// The single line printed to stderr when a run fails.
fn error_line(e: &anyhow::Error) -> String {
    match e.downcast_ref::<PipelineError>() {
        Some(PipelineError::SourceUnavailable { .. }) => "Error: cannot open input file".to_string(),
        _ => format!("Error: {e:#}"),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use anyhow::anyhow;

    use super::*;

    #[test]
    fn unopenable_input_has_fixed_message() {
        let e = anyhow::Error::from(PipelineError::SourceUnavailable {
            path: PathBuf::from("missing.mp4"),
            reason: anyhow!("video file does not exist: missing.mp4"),
        });
        assert_eq!(error_line(&e), "Error: cannot open input file");
    }

    #[test]
    fn other_errors_are_one_line() {
        let e = anyhow::Error::from(PipelineError::InvalidGeometry { width: 0, height: 0 });
        let line = error_line(&e);
        assert_eq!(line, "Error: input reports invalid frame geometry 0x0");
        assert!(!line.contains('\n'));
    }
}
