//! FFprobe-based probing.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::ProbeInfo;
use crate::command::ToolCommand;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: String,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    bit_rate: Option<String>,
    duration: Option<String>,
}

/// Probe `path` with the ffprobe binary at `ffprobe`.
pub async fn probe_with_ffprobe(
    ffprobe: &Path,
    path: &Path,
    timeout: Duration,
) -> Result<ProbeInfo> {
    let output = ToolCommand::new(ffprobe.to_path_buf())
        .args([
            "-v",
            "error",
            "-show_format",
            "-show_streams",
            "-print_format",
            "json",
        ])
        .path_arg(path)
        .timeout(timeout)
        .execute()
        .await
        .map_err(|e| unreadable_as_no_audio(path, e))?;

    parse_ffprobe_json(path, &output.stdout)
}

/// ffprobe's stderr when the input is not a container it can demux.
const INVALID_DATA: &str = "Invalid data found when processing input";

/// Input ffprobe cannot read at all has no audio stream either.
fn unreadable_as_no_audio(path: &Path, err: Error) -> Error {
    match err {
        Error::ToolFailed { ref message, .. } if message.contains(INVALID_DATA) => {
            Error::no_audio_stream(path)
        }
        other => other,
    }
}

/// Interpret ffprobe's JSON output.
///
/// Fails with [`Error::NoAudioStream`] when no stream has codec type `audio`.
pub fn parse_ffprobe_json(path: &Path, json: &str) -> Result<ProbeInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::parse_error("ffprobe", e.to_string()))?;

    let format = output
        .format
        .ok_or_else(|| Error::parse_error("ffprobe", "missing format section"))?;

    let audio = output
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .ok_or_else(|| Error::no_audio_stream(path))?;

    let duration = audio
        .duration
        .as_deref()
        .or(format.duration.as_deref())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(Duration::from_secs_f64);

    let bitrate = audio
        .bit_rate
        .as_deref()
        .and_then(|s| s.parse().ok())
        .or_else(|| format.bit_rate.as_deref().and_then(|s| s.parse().ok()));

    Ok(ProbeInfo {
        container: format.format_name,
        codec: audio.codec_name.unwrap_or_default(),
        duration,
        bitrate,
        sample_rate: audio.sample_rate.and_then(|s| s.parse().ok()),
        channels: audio.channels,
    })
}
