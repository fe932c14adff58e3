use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

use anyhow::{anyhow, bail, Context, Result};
use image::RgbImage;
use tracing::{debug, error, info};

use super::frame::{Frame, ReadOutcome};
use super::probe::{self, VideoProperties};
use super::stderr;

/// Anything the pipeline can pull frames from.
pub trait FrameSource {
    fn properties(&self) -> &VideoProperties;

    fn read_frame(&mut self) -> ReadOutcome;

    /// Stop producing frames and free the underlying resources.
    fn release(&mut self);
}

/// Decodes video frames by piping raw RGB24 data from the ffmpeg CLI.
pub struct VideoDecoder {
    child: Option<Child>,
    stderr: Option<JoinHandle<String>>,
    props: VideoProperties,
    frame_count: u64,
    frame_bytes: usize,
}

impl VideoDecoder {
    /// Open a video file for decoding.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("video file does not exist: {}", path.display());
        }

        let props = probe::probe(path)?;

        info!(?path, "spawning ffmpeg decoder process");

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-nostdin", "-i"])
            .arg(path)
            .args([
                "-map", "0:v:0",
                "-f", "rawvideo",
                "-pix_fmt", "rgb24",
                "-v", "error",
                "pipe:1",
            ]);
        Self::spawn(cmd, props)
    }

    /// Start `cmd`, which must write raw RGB24 frames of `props`' size to stdout.
    fn spawn(mut cmd: Command, props: VideoProperties) -> Result<Self> {
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to spawn ffmpeg, is ffmpeg installed?")?;
        let stderr = stderr::drain(&mut child);

        let frame_bytes = (props.width as usize) * (props.height as usize) * 3;

        info!(
            width = props.width,
            height = props.height,
            fps = props.fps,
            frame_bytes,
            "video decoder opened"
        );

        Ok(Self {
            child: Some(child),
            stderr,
            props,
            frame_count: 0,
            frame_bytes,
        })
    }

    fn read_raw(&mut self) -> Result<Option<Vec<u8>>> {
        let stdout = self
            .child
            .as_mut()
            .and_then(|child| child.stdout.as_mut())
            .context("ffmpeg stdout not available")?;

        let mut buf = vec![0u8; self.frame_bytes];
        let mut read = 0;

        while read < self.frame_bytes {
            match stdout.read(&mut buf[read..]) {
                Ok(0) => {
                    if read == 0 {
                        info!(total_frames = self.frame_count, "video stream ended");
                        return Ok(None);
                    }
                    error!(
                        read_bytes = read,
                        expected_bytes = self.frame_bytes,
                        frame = self.frame_count,
                        "ffmpeg stream ended mid-frame"
                    );
                    bail!(
                        "ffmpeg stream ended mid-frame (read {read}/{} bytes)",
                        self.frame_bytes,
                    );
                }
                Ok(n) => read += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    error!(frame = self.frame_count, %e, "failed to read from ffmpeg pipe");
                    return Err(e).context("failed to read from ffmpeg pipe");
                }
            }
        }

        Ok(Some(buf))
    }
}

impl FrameSource for VideoDecoder {
    fn properties(&self) -> &VideoProperties {
        &self.props
    }

    fn read_frame(&mut self) -> ReadOutcome {
        if self.frame_bytes == 0 {
            return ReadOutcome::ReadError(anyhow!("cannot decode frames of zero size"));
        }

        let buf = match self.read_raw() {
            Ok(Some(buf)) => buf,
            Ok(None) => return ReadOutcome::EndOfStream,
            Err(e) => return ReadOutcome::ReadError(e),
        };

        let Some(image) = RgbImage::from_raw(self.props.width, self.props.height, buf) else {
            return ReadOutcome::ReadError(anyhow!("failed to create RgbImage from raw frame data"));
        };

        let frame_number = self.frame_count;
        self.frame_count += 1;

        debug!(frame_number, "decoded frame");

        ReadOutcome::Frame(Frame {
            image,
            frame_number,
        })
    }

    fn release(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        info!(total_frames = self.frame_count, "closing video decoder");
        let _ = child.kill();
        let _ = child.wait();

        let stderr = stderr::collect(self.stderr.take());
        if !stderr.trim().is_empty() {
            debug!(stderr = %stderr.trim(), "ffmpeg decoder diagnostics");
        }
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_file_fails_before_probing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.mp4");
        let err = VideoDecoder::open(&missing).err().unwrap();
        assert!(err.to_string().contains("does not exist"));
    }

    fn props(width: u32, height: u32) -> VideoProperties {
        VideoProperties {
            width,
            height,
            fps: 25.0,
            frame_count: Some(1),
            fourcc: None,
            codec_name: None,
        }
    }

    #[cfg(unix)]
    #[test]
    fn noisy_stderr_does_not_stall_frames() {
        // 200 KB of diagnostics, more than a pipe buffer holds, then one 4x4 frame.
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "head -c 200000 /dev/zero >&2; head -c 48 /dev/zero"]);
        let mut decoder = VideoDecoder::spawn(cmd, props(4, 4)).unwrap();

        let ReadOutcome::Frame(frame) = decoder.read_frame() else {
            panic!("expected a frame");
        };
        assert_eq!(frame.image.dimensions(), (4, 4));
        assert_eq!(frame.frame_number, 0);
        assert!(matches!(decoder.read_frame(), ReadOutcome::EndOfStream));
        decoder.release();
    }

    #[cfg(unix)]
    #[test]
    fn truncated_frame_is_a_read_error() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "head -c 20 /dev/zero"]);
        let mut decoder = VideoDecoder::spawn(cmd, props(4, 4)).unwrap();

        assert!(matches!(decoder.read_frame(), ReadOutcome::ReadError(_)));
    }
}
