use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "framemark", about = "Burn frame numbers into a video")]
pub struct Cli {
    /// Play the video while converting; press q in the window to stop early.
    #[arg(long)]
    pub watch: bool,

    /// TrueType font for the frame counter (default: first system monospace font).
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Do not print the progress line.
    #[arg(long)]
    pub no_progress: bool,

    /// Path to the input video file.
    pub input: PathBuf,

    /// Path to write the annotated video to.
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_watch_and_paths() {
        let cli = Cli::try_parse_from(["framemark", "--watch", "in.mp4", "out.mp4"]).unwrap();
        assert!(cli.watch);
        assert_eq!(cli.input, PathBuf::from("in.mp4"));
        assert_eq!(cli.output, PathBuf::from("out.mp4"));
    }

    #[test]
    fn watch_defaults_off() {
        let cli = Cli::try_parse_from(["framemark", "in.mp4", "out.mp4"]).unwrap();
        assert!(!cli.watch);
        assert!(!cli.no_progress);
    }

    #[test]
    fn input_named_props_is_a_plain_path() {
        let cli = Cli::try_parse_from(["framemark", "props", "out.mp4"]).unwrap();
        assert_eq!(cli.input, PathBuf::from("props"));
    }

    #[test]
    fn output_is_required() {
        assert!(Cli::try_parse_from(["framemark", "in.mp4"]).is_err());
    }
}
