//! Source inspection with ffprobe.

use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tokio::process::Command;

/// What the renderer needs to know about a source before building ffmpeg args.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    /// Container duration in seconds, when ffprobe reports one.
    pub duration: Option<f64>,
    pub has_audio: bool,
}

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
}

pub async fn inspect_source(ffprobe_path: &str, source: &str) -> Result<SourceInfo> {
    let output = Command::new(ffprobe_path)
        .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(source)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("Failed to start {}", ffprobe_path))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "ffprobe exited with {}: {}",
            output.status,
            stderr.trim().lines().last().unwrap_or_default()
        ));
    }

    parse_ffprobe_json(&output.stdout)
}

fn parse_ffprobe_json(json: &[u8]) -> Result<SourceInfo> {
    let output: FfprobeOutput = serde_json::from_slice(json).context("Unreadable ffprobe output")?;

    let duration = output
        .format
        .and_then(|format| format.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    let has_audio = output
        .streams
        .iter()
        .any(|stream| stream.codec_type.as_deref() == Some("audio"));

    Ok(SourceInfo { duration, has_audio })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_duration_and_audio_presence() {
        let json = br#"{
            "streams": [
                { "index": 0, "codec_type": "video", "codec_name": "h264" },
                { "index": 1, "codec_type": "audio", "codec_name": "aac" }
            ],
            "format": { "filename": "tape.mp4", "duration": "3605.120000" }
        }"#;

        let info = parse_ffprobe_json(json).unwrap();
        assert_eq!(info.duration, Some(3605.12));
        assert!(info.has_audio);
    }

    #[test]
    fn silent_capture_has_no_audio() {
        let json = br#"{
            "streams": [{ "index": 0, "codec_type": "video" }],
            "format": { "duration": "N/A" }
        }"#;

        let info = parse_ffprobe_json(json).unwrap();
        assert_eq!(info.duration, None);
        assert!(!info.has_audio);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_ffprobe_json(b"Invalid data found when processing input").is_err());
    }
}
