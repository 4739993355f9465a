//! FFprobe-based source probing.

use super::{SourceInfo, DEFAULT_FPS};
use crate::command::ToolCommand;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

/// Probe a source file with ffprobe at `ffprobe`.
pub async fn probe_with_ffprobe(ffprobe: &Path, source: &Path, timeout: Duration) -> Result<SourceInfo> {
    let output = ToolCommand::new(ffprobe.to_path_buf())
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(source.to_string_lossy())
        .timeout(timeout)
        .execute()
        .await?;

    parse_ffprobe_output(&output.stdout)
}

/// Parse the JSON ffprobe prints for a source.
///
/// The first video stream supplies the frame size, codec and rate. Stream
/// duration is preferred; the container duration is the fallback.
pub fn parse_ffprobe_output(json: &str) -> Result<SourceInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)?;

    let stream = output
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref().unwrap_or("video") == "video")
        .ok_or_else(|| Error::parse_error("ffprobe", "no video stream"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(Error::parse_error("ffprobe", "video stream has no frame size")),
    };

    let duration = stream
        .duration
        .as_deref()
        .and_then(parse_seconds)
        .or_else(|| {
            output
                .format
                .and_then(|f| f.duration)
                .as_deref()
                .and_then(parse_seconds)
        })
        .ok_or_else(|| Error::parse_error("ffprobe", "no duration reported"))?;

    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .unwrap_or(DEFAULT_FPS);

    Ok(SourceInfo {
        width,
        height,
        fps,
        codec: stream.codec_name.unwrap_or_default(),
        duration,
    })
}

fn parse_seconds(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|d| d.is_finite() && *d > 0.0)
}

fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    let rate = match rate_str.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate_str.parse().ok()?,
    };
    Some(rate).filter(|r| r.is_finite() && *r > 0.0)
}
