//! Print FPS, FourCC, frame count and frame size of video files.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::warn;

use framemark_core::video::probe;

#[derive(Parser)]
#[command(name = "framemark-props", about = "Show video properties")]
struct Cli {
    /// Video files to inspect.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    for (i, path) in cli.files.iter().enumerate() {
        println!("File: {}", path.display());

        let props = match probe::probe(path) {
            Ok(props) => props,
            Err(e) => {
                warn!(?path, error = %e, "cannot read video properties, skipping");
                continue;
            }
        };
        println!("{}", props.describe());
        if i + 1 < cli.files.len() {
            println!("{}", "-".repeat(30));
        }
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_at_least_one_file() {
        assert!(Cli::try_parse_from(["framemark-props"]).is_err());
        let cli = Cli::try_parse_from(["framemark-props", "a.mp4", "b.avi"]).unwrap();
        assert_eq!(cli.files.len(), 2);
    }
}
