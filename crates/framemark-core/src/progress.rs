use std::io::Write;
use std::time::{Duration, Instant};

/// Format seconds as `H:MM:SS.mmm`, e.g. `100.5` -> `0:01:40.500`.
///
/// Milliseconds are truncated, not rounded. Negative input formats as zero.
pub fn format_time(decimal_seconds: f64) -> String {
    // Work in whole milliseconds; the nudge absorbs binary error in inputs like 3661.999.
    let total_ms = (decimal_seconds.max(0.0) * 1000.0 + 1e-6).floor() as u64;
    let millis = total_ms % 1000;
    let whole = total_ms / 1000;
    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    let seconds = whole % 60;
    format!("{hours}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Per-run progress readout, rewritten in place on a single console line.
pub struct Progress {
    total: Option<u64>,
    start: Instant,
    index: u64,
}

impl Progress {
    pub fn start(total: Option<u64>) -> Self {
        Self {
            total,
            start: Instant::now(),
            index: 0,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    /// Count one more processed frame and return the refreshed line.
    pub fn advance(&mut self) -> String {
        self.index += 1;
        self.line(self.start.elapsed())
    }

    /// Render the progress line for the current index after `elapsed`.
    pub fn line(&self, elapsed: Duration) -> String {
        let elapsed = elapsed.as_secs_f64();
        match self.total {
            Some(total) if total > 0 && self.index > 0 => {
                let remaining = elapsed * (total as f64 - self.index as f64) / self.index as f64;
                let percent = 100.0 * self.index as f64 / total as f64;
                format!(
                    "{}/{} {:.2}% {}",
                    self.index,
                    total,
                    percent,
                    format_time(remaining)
                )
            }
            _ => format!("{}/? {}", self.index, format_time(elapsed)),
        }
    }

    /// Advance and print the line to `out`, returning the cursor to column 0.
    pub fn report<W: Write + ?Sized>(&mut self, out: &mut W) -> std::io::Result<()> {
        let line = self.advance();
        write!(out, "{line}\r")?;
        out.flush()
    }
}
