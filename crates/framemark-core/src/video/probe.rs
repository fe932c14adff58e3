use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use tracing::{debug, error, info, warn};

use super::fourcc::FourCc;

/// Properties reported for the first video stream of a file.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoProperties {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Total frames, when the container reports or allows estimating it.
    pub frame_count: Option<u64>,
    /// Codec tag, `None` when the container stores none.
    pub fourcc: Option<FourCc>,
    /// ffmpeg's codec name (e.g. `h264`), used to pick a matching encoder.
    pub codec_name: Option<String>,
}

impl VideoProperties {
    /// Human-readable property listing, one `Name: value` per line.
    pub fn describe(&self) -> String {
        let fourcc = self.fourcc.map_or_else(|| "-".to_string(), |t| t.to_string());
        let frame_count = self
            .frame_count
            .map_or_else(|| "unknown".to_string(), |n| n.to_string());
        format!(
            "FPS: {:.3}\nFourCC: {fourcc}\nFrame Count: {frame_count}\nFrame Width: {}\nFrame Height: {}",
            self.fps, self.width, self.height,
        )
    }
}

/// Query stream properties with ffprobe.
pub fn probe(path: &Path) -> Result<VideoProperties> {
    info!(?path, "probing video metadata with ffprobe");

    let output = Command::new("ffprobe")
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries",
            "stream=codec_name,codec_tag,width,height,r_frame_rate,nb_frames:format=duration",
            "-of", "default=noprint_wrappers=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .context("failed to run ffprobe, is ffmpeg installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(%stderr, ?path, "ffprobe failed");
        bail!("ffprobe failed: {}", stderr.trim());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let props = parse_probe_output(&stdout)?;

    info!(
        width = props.width,
        height = props.height,
        fps = props.fps,
        frame_count = ?props.frame_count,
        fourcc = ?props.fourcc.map(|t| t.to_string()),
        "probe completed"
    );
    Ok(props)
}

/// Parse `key=value` lines as printed by `ffprobe -of default=noprint_wrappers=1`.
pub fn parse_probe_output(stdout: &str) -> Result<VideoProperties> {
    let fields: HashMap<&str, &str> = stdout
        .lines()
        .filter_map(|line| line.trim().split_once('='))
        .collect();

    let Some(width) = fields.get("width") else {
        bail!("no video stream found in ffprobe output");
    };
    let width: u32 = width.parse().context("failed to parse width")?;
    let height: u32 = fields
        .get("height")
        .context("ffprobe output has no height")?
        .parse()
        .context("failed to parse height")?;

    let fps = match fields.get("r_frame_rate") {
        Some(rate) => parse_rate(rate)?,
        None => 0.0,
    };
    if fps <= 0.0 {
        warn!(fps, "video has non-positive fps, frame count cannot be estimated");
    }

    let nb_frames = fields.get("nb_frames").and_then(|v| v.parse::<u64>().ok());
    let duration = fields.get("duration").and_then(|v| v.parse::<f64>().ok());
    let frame_count = nb_frames.or_else(|| estimate_frame_count(duration, fps));
    if nb_frames.is_none() {
        debug!(?duration, fps, ?frame_count, "nb_frames not reported, estimated from duration");
    }

    let fourcc = match fields.get("codec_tag") {
        Some(tag) => Some(parse_codec_tag(tag)?).filter(|t| !t.is_empty()),
        None => None,
    };

    let codec_name = fields
        .get("codec_name")
        .filter(|name| !name.is_empty() && **name != "N/A")
        .map(|name| name.to_string());

    Ok(VideoProperties {
        width,
        height,
        fps,
        frame_count,
        fourcc,
        codec_name,
    })
}

/// Parse a rational (`num/den`) or decimal frame rate. A zero denominator yields 0.
fn parse_rate(rate: &str) -> Result<f64> {
    if let Some((num, den)) = rate.split_once('/') {
        let num: f64 = num.parse().context("failed to parse fps numerator")?;
        let den: f64 = den.parse().context("failed to parse fps denominator")?;
        Ok(if den > 0.0 { num / den } else { 0.0 })
    } else {
        rate.parse().context("failed to parse fps")
    }
}

fn parse_codec_tag(tag: &str) -> Result<FourCc> {
    let hex = tag.trim_start_matches("0x").trim_start_matches("0X");
    let value = u32::from_str_radix(hex, 16)
        .with_context(|| format!("failed to parse codec tag {tag:?}"))?;
    Ok(FourCc::from_u32(value))
}

fn estimate_frame_count(duration: Option<f64>, fps: f64) -> Option<u64> {
    let duration = duration?;
    if duration <= 0.0 || fps <= 0.0 {
        return None;
    }
    Some((duration * fps).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MP4_OUTPUT: &str = "\
codec_name=h264
codec_tag=0x31637661
width=1280
height=720
r_frame_rate=30000/1001
nb_frames=300
duration=10.010000
";

    #[test]
    fn parses_mp4_stream() {
        let props = parse_probe_output(MP4_OUTPUT).unwrap();
        assert_eq!(props.width, 1280);
        assert_eq!(props.height, 720);
        assert!((props.fps - 29.97).abs() < 0.01);
        assert_eq!(props.frame_count, Some(300));
        assert_eq!(props.fourcc.map(|t| t.to_string()).as_deref(), Some("avc1"));
        assert_eq!(props.codec_name.as_deref(), Some("h264"));
    }

    #[test]
    fn estimates_frame_count_from_duration() {
        let out = "codec_name=vp9\ncodec_tag=0x0000\nwidth=640\nheight=360\n\
                   r_frame_rate=25/1\nnb_frames=N/A\nduration=4.000000\n";
        let props = parse_probe_output(out).unwrap();
        assert_eq!(props.frame_count, Some(100));
        assert_eq!(props.fourcc, None);
    }

    #[test]
    fn unknown_frame_count_without_duration() {
        let out = "width=640\nheight=360\nr_frame_rate=0/0\nnb_frames=N/A\nduration=N/A\n";
        let props = parse_probe_output(out).unwrap();
        assert_eq!(props.fps, 0.0);
        assert_eq!(props.frame_count, None);
        assert_eq!(props.codec_name, None);
    }

    #[test]
    fn zero_geometry_is_passed_through() {
        let out = "width=0\nheight=0\nr_frame_rate=30/1\n";
        let props = parse_probe_output(out).unwrap();
        assert_eq!((props.width, props.height), (0, 0));
    }

    #[test]
    fn missing_stream_is_an_error() {
        let err = parse_probe_output("duration=3.0\n").unwrap_err();
        assert!(err.to_string().contains("no video stream"));
    }

    #[test]
    fn describe_lists_properties() {
        let props = parse_probe_output(MP4_OUTPUT).unwrap();
        assert_eq!(
            props.describe(),
            "FPS: 29.970\nFourCC: avc1\nFrame Count: 300\nFrame Width: 1280\nFrame Height: 720"
        );
    }

    #[test]
    fn describe_marks_unknown_values() {
        let props = parse_probe_output("width=2\nheight=2\n").unwrap();
        let text = props.describe();
        assert!(text.contains("FourCC: -"));
        assert!(text.contains("Frame Count: unknown"));
    }

    #[test]
    fn decimal_rate() {
        assert_eq!(parse_rate("24").unwrap(), 24.0);
        assert!(parse_rate("abc").is_err());
    }
}
