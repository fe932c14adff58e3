use std::io::{ErrorKind, Write};
use std::process::{Child, ChildStdin, Command, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::frame::Frame;

pub const WINDOW_TITLE: &str = "video";

/// What the viewer asked for after a frame was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewEvent {
    Continue,
    /// The user pressed `q` (or otherwise closed the window).
    Quit,
}

pub trait FramePreview {
    fn show(&mut self, frame: &Frame) -> PreviewEvent;
}

/// Live preview backed by an `ffplay` window fed raw RGB24 on stdin.
///
/// ffplay exits when the user presses `q` or `Esc`, so quit detection is a
/// non-blocking `try_wait` on the child after every frame.
pub struct PreviewWindow {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl PreviewWindow {
    pub fn open(width: u32, height: u32, fps: f64) -> Result<Self> {
        let mut cmd = Command::new("ffplay");
        cmd.args(["-v", "error", "-autoexit", "-window_title", WINDOW_TITLE])
            .args(["-f", "rawvideo", "-pixel_format", "rgb24"])
            .arg("-video_size")
            .arg(format!("{width}x{height}"));
        if fps > 0.0 {
            cmd.arg("-framerate").arg(fps.to_string());
        }
        cmd.arg("-i").arg("pipe:0");

        info!(width, height, fps, "spawning ffplay preview");

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to spawn ffplay, is ffmpeg installed?")?;
        let stdin = child.stdin.take().context("ffplay stdin not available")?;

        Ok(Self {
            child,
            stdin: Some(stdin),
        })
    }
}

impl FramePreview for PreviewWindow {
    fn show(&mut self, frame: &Frame) -> PreviewEvent {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                info!(%status, "preview window closed");
                return PreviewEvent::Quit;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to poll preview process"),
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return PreviewEvent::Quit;
        };
        match stdin.write_all(frame.image.as_raw()) {
            Ok(()) => PreviewEvent::Continue,
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!(frame_number = frame.frame_number, "preview pipe closed");
                PreviewEvent::Quit
            }
            Err(e) => {
                warn!(error = %e, "failed to write frame to preview, closing it");
                PreviewEvent::Quit
            }
        }
    }
}

impl Drop for PreviewWindow {
    fn drop(&mut self) {
        drop(self.stdin.take());
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
