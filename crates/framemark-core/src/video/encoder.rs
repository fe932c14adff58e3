use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use anyhow::{bail, Context, Result};
use tracing::{debug, error, info, warn};

use super::fourcc::FourCc;
use super::frame::Frame;
use super::probe::VideoProperties;
use super::stderr;

/// Anything the pipeline can push annotated frames into.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and finalize the output. Calling it again is a no-op.
    fn release(&mut self) -> Result<()>;
}

/// Encoding parameters for the output stream, all taken from the input.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFormat {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub fourcc: Option<FourCc>,
    pub codec_name: Option<String>,
}

impl OutputFormat {
    pub fn from_properties(props: &VideoProperties) -> Self {
        Self {
            width: props.width,
            height: props.height,
            fps: props.fps,
            fourcc: props.fourcc,
            codec_name: props.codec_name.clone(),
        }
    }

    /// ffmpeg arguments that read raw RGB24 from stdin and encode to `path`.
    fn ffmpeg_args(&self, path: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-v".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-s".into(),
            format!("{}x{}", self.width, self.height),
        ];
        if self.fps > 0.0 {
            args.push("-r".into());
            args.push(self.fps.to_string());
        }
        args.extend(["-i", "pipe:0", "-an"].map(String::from));
        if let Some(codec) = &self.codec_name {
            args.push("-c:v".into());
            args.push(codec.clone());
            if let Some(tag) = self.fourcc {
                args.push("-tag:v".into());
                args.push(tag.to_string());
            }
        }
        args.push(path.to_string_lossy().into_owned());
        args
    }
}

/// Encodes frames by piping raw RGB24 data into the ffmpeg CLI.
pub struct VideoEncoder {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
    path: PathBuf,
    format: OutputFormat,
    frames_written: u64,
}

impl VideoEncoder {
    pub fn open(path: &Path, format: &OutputFormat) -> Result<Self> {
        if format.fps <= 0.0 {
            warn!(fps = format.fps, "input fps unknown, encoder will use its default rate");
        }

        let args = format.ffmpeg_args(path);
        info!(?path, ?args, "spawning ffmpeg encoder process");

        let mut cmd = Command::new("ffmpeg");
        cmd.args(&args);
        Self::spawn(cmd, path, format)
    }

    /// Start `cmd`, which must read raw RGB24 frames of `format`'s size from stdin.
    fn spawn(mut cmd: Command, path: &Path, format: &OutputFormat) -> Result<Self> {
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to spawn ffmpeg, is ffmpeg installed?")?;

        let stdin = child.stdin.take().context("ffmpeg stdin not available")?;
        let stderr = stderr::drain(&mut child);

        info!(
            width = format.width,
            height = format.height,
            fps = format.fps,
            fourcc = ?format.fourcc.map(|t| t.to_string()),
            "video encoder opened"
        );

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            stderr,
            path: path.to_path_buf(),
            format: format.clone(),
            frames_written: 0,
        })
    }
}

impl FrameSink for VideoEncoder {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let (w, h) = frame.image.dimensions();
        if (w, h) != (self.format.width, self.format.height) {
            bail!(
                "frame {} is {w}x{h}, encoder expects {}x{}",
                frame.frame_number,
                self.format.width,
                self.format.height,
            );
        }

        let stdin = self.stdin.as_mut().context("encoder already released")?;
        stdin
            .write_all(frame.image.as_raw())
            .context("failed to write frame to ffmpeg pipe")?;
        self.frames_written += 1;

        debug!(frame_number = frame.frame_number, "encoded frame");
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        // Closing stdin signals end of input so ffmpeg can write the trailer.
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        info!(path = ?self.path, frames = self.frames_written, "closing video encoder");
        let status = child.wait().context("failed to wait for ffmpeg encoder")?;
        let stderr = stderr::collect(self.stderr.take());

        if !status.success() {
            error!(stderr = %stderr.trim(), path = ?self.path, "ffmpeg encoder failed");
            bail!("ffmpeg encoder exited with {status}: {}", stderr.trim());
        }
        Ok(())
    }
}

impl Drop for VideoEncoder {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "encoder release failed during drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(codec: Option<&str>, fourcc: Option<&str>, fps: f64) -> OutputFormat {
        OutputFormat {
            width: 640,
            height: 360,
            fps,
            fourcc: fourcc.map(|t| t.parse().unwrap()),
            codec_name: codec.map(str::to_string),
        }
    }

    fn raw_format(width: u32, height: u32) -> OutputFormat {
        OutputFormat {
            width,
            height,
            fps: 25.0,
            fourcc: None,
            codec_name: None,
        }
    }

    fn black_frame(width: u32, height: u32) -> Frame {
        Frame {
            image: image::RgbImage::new(width, height),
            frame_number: 0,
        }
    }

    #[cfg(unix)]
    #[test]
    fn noisy_encoder_does_not_block_writes() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "head -c 200000 /dev/zero >&2; cat > /dev/null"]);
        let mut encoder = VideoEncoder::spawn(cmd, Path::new("out.raw"), &raw_format(4, 4)).unwrap();

        for _ in 0..3 {
            encoder.write_frame(&black_frame(4, 4)).unwrap();
        }
        encoder.release().unwrap();
        // Second release is a no-op.
        encoder.release().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn failed_encoder_reports_its_stderr() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "cat > /dev/null; echo 'muxer said no' >&2; exit 3"]);
        let mut encoder = VideoEncoder::spawn(cmd, Path::new("out.raw"), &raw_format(4, 4)).unwrap();

        encoder.write_frame(&black_frame(4, 4)).unwrap();
        let err = encoder.release().unwrap_err();
        assert!(err.to_string().contains("muxer said no"));
    }

    #[test]
    fn rejects_frames_of_the_wrong_size() {
        let mut encoder = VideoEncoder {
            child: None,
            stdin: None,
            stderr: None,
            path: PathBuf::from("out.raw"),
            format: raw_format(4, 4),
            frames_written: 0,
        };
        let err = encoder.write_frame(&black_frame(8, 8)).unwrap_err();
        assert!(err.to_string().contains("encoder expects 4x4"));
    }

    #[test]
    fn args_carry_input_geometry_rate_and_codec() {
        let args = format(Some("mpeg4"), Some("XVID"), 25.0).ffmpeg_args(Path::new("out.avi"));
        let joined = args.join(" ");
        assert!(joined.contains("-s 640x360"));
        assert!(joined.contains("-r 25"));
        assert!(joined.contains("-c:v mpeg4 -tag:v XVID"));
        assert_eq!(args.last().map(String::as_str), Some("out.avi"));
    }

    #[test]
    fn args_skip_unknown_rate_and_codec() {
        let args = format(None, None, 0.0).ffmpeg_args(Path::new("out.mkv"));
        assert!(!args.iter().any(|a| a == "-r"));
        assert!(!args.iter().any(|a| a == "-c:v"));
    }

    #[test]
    fn format_mirrors_properties() {
        let props = VideoProperties {
            width: 1920,
            height: 1080,
            fps: 59.94,
            frame_count: Some(10),
            fourcc: Some("avc1".parse().unwrap()),
            codec_name: Some("h264".into()),
        };
        let f = OutputFormat::from_properties(&props);
        assert_eq!((f.width, f.height), (1920, 1080));
        assert_eq!(f.fps, 59.94);
        assert_eq!(f.fourcc, props.fourcc);
        assert_eq!(f.codec_name.as_deref(), Some("h264"));
    }
}
