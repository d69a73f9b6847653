//! Video and audio probing through `ffprobe`

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use vpdb_core::models::{AudioMetadata, VideoMetadata};

use crate::error::ExtractError;

const DANGEROUS_CHARS: [char; 11] = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];

/// Reject paths containing shell metacharacters or traversal sequences.
pub(crate) fn validate_path(path: &str) -> Result<(), String> {
    if path.chars().any(|c| DANGEROUS_CHARS.contains(&c)) {
        return Err(format!("Path contains dangerous characters: {}", path));
    }
    if path.contains("..") {
        return Err(format!("Path contains directory traversal: {}", path));
    }
    Ok(())
}

pub(crate) fn validate_and_canonicalize(path: &Path) -> Result<PathBuf, String> {
    validate_path(&path.to_string_lossy())?;
    path.canonicalize()
        .map_err(|e| format!("Failed to canonicalize path: {}", e))
}

/// Validate a configured binary path (`ffprobe`, `ffmpeg`).
pub(crate) fn validate_binary(path: &str, name: &str) -> Result<(), String> {
    validate_path(path).map_err(|e| format!("Invalid {} path: {}", name, e))?;
    if !path
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '/' | '-' | '_' | '.' | '\\'))
    {
        return Err(format!("Invalid {} path: contains unsafe characters", name));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
}

fn parse_framerate(rate: &str) -> Option<f32> {
    let (num, den) = rate.split_once('/')?;
    let num: f32 = num.parse().ok()?;
    let den: f32 = den.parse().ok()?;
    if den == 0.0 {
        None
    } else {
        Some(num / den)
    }
}

/// Interpret `ffprobe -print_format json` output for a video.
pub fn parse_video_probe(mime_type: &str, json: &[u8]) -> Result<VideoMetadata, ExtractError> {
    let output: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| ExtractError::probe(mime_type, format!("unreadable ffprobe output: {e}")))?;

    let stream = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ExtractError::corrupt(mime_type, "no video stream found"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(ExtractError::corrupt(mime_type, "video stream has no dimensions")),
    };

    let format = output.format.as_ref();
    let duration = format
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| ExtractError::corrupt(mime_type, "could not parse duration"))?;

    Ok(VideoMetadata {
        width,
        height,
        duration,
        codec: stream
            .codec_name
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        bitrate: format
            .and_then(|f| f.bit_rate.as_deref())
            .and_then(|b| b.parse().ok()),
        framerate: stream.r_frame_rate.as_deref().and_then(parse_framerate),
    })
}

/// Interpret `ffprobe -print_format json` output for audio.
pub fn parse_audio_probe(mime_type: &str, json: &[u8]) -> Result<AudioMetadata, ExtractError> {
    let output: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| ExtractError::probe(mime_type, format!("unreadable ffprobe output: {e}")))?;

    let stream = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .ok_or_else(|| ExtractError::corrupt(mime_type, "no audio stream found"))?;

    let format = output.format.as_ref();
    Ok(AudioMetadata {
        duration: format
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse().ok()),
        bitrate: format
            .and_then(|f| f.bit_rate.as_deref())
            .and_then(|b| b.parse().ok()),
        sample_rate: stream.sample_rate.as_deref().and_then(|s| s.parse().ok()),
        channels: stream.channels,
        codec: stream.codec_name.clone(),
    })
}

/// Runs `ffprobe` against stored files
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: String,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: impl Into<String>) -> Result<Self, String> {
        let ffprobe_path = ffprobe_path.into();
        validate_binary(&ffprobe_path, "ffprobe")?;
        Ok(Self { ffprobe_path })
    }

    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path,
        ffmpeg.operation = "probe"
    ))]
    async fn run(&self, mime_type: &str, path: &Path) -> Result<Vec<u8>, ExtractError> {
        let start = std::time::Instant::now();
        let path = validate_and_canonicalize(path).map_err(|e| ExtractError::probe(mime_type, e))?;

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(&path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExtractError::probe(mime_type, format!("failed to execute ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(ExtractError::corrupt(
                mime_type,
                format!("ffprobe failed: {}", String::from_utf8_lossy(&output.stderr).trim()),
            ));
        }

        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            "ffprobe completed"
        );
        Ok(output.stdout)
    }

    pub async fn probe_video(&self, mime_type: &str, path: &Path) -> Result<VideoMetadata, ExtractError> {
        let json = self.run(mime_type, path).await?;
        let metadata = parse_video_probe(mime_type, &json)?;
        tracing::info!(
            width = metadata.width,
            height = metadata.height,
            video_duration = metadata.duration,
            codec = %metadata.codec,
            "Video probe completed"
        );
        Ok(metadata)
    }

    pub async fn probe_audio(&self, mime_type: &str, path: &Path) -> Result<AudioMetadata, ExtractError> {
        let json = self.run(mime_type, path).await?;
        parse_audio_probe(mime_type, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO_PROBE: &str = r#"{
        "streams": [
            {"codec_type": "audio", "codec_name": "aac", "sample_rate": "44100", "channels": 2},
            {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "r_frame_rate": "30000/1001"}
        ],
        "format": {"duration": "12.500000", "bit_rate": "5000000"}
    }"#;

    #[test]
    fn parses_video_stream() {
        let meta = parse_video_probe("video/mp4", VIDEO_PROBE.as_bytes()).unwrap();
        assert_eq!((meta.width, meta.height), (1920, 1080));
        assert_eq!(meta.codec, "h264");
        assert_eq!(meta.bitrate, Some(5_000_000));
        assert!((meta.duration - 12.5).abs() < f64::EPSILON);
        assert!((meta.framerate.unwrap() - 29.97).abs() < 0.01);
    }

    #[test]
    fn parses_audio_stream() {
        let meta = parse_audio_probe("audio/mpeg", VIDEO_PROBE.as_bytes()).unwrap();
        assert_eq!(meta.codec.as_deref(), Some("aac"));
        assert_eq!(meta.sample_rate, Some(44100));
        assert_eq!(meta.channels, Some(2));
    }

    #[test]
    fn video_without_stream_is_corrupt() {
        let err = parse_video_probe("video/mp4", br#"{"streams": [], "format": {}}"#).unwrap_err();
        assert!(matches!(err, ExtractError::Corrupt { .. }));
        assert_eq!(err.mime_type(), "video/mp4");
    }

    #[test]
    fn garbage_output_is_a_probe_error() {
        let err = parse_audio_probe("audio/mpeg", b"not json").unwrap_err();
        assert!(matches!(err, ExtractError::Probe { .. }));
    }

    #[test]
    fn rejects_shell_metacharacters() {
        assert!(validate_path("/tmp/a;rm -rf").is_err());
        assert!(validate_path("/tmp/../etc/passwd").is_err());
        assert!(validate_path("/tmp/video.mp4").is_ok());
        assert!(FfprobeProber::new("ffprobe $(id)").is_err());
        assert!(FfprobeProber::new("/usr/bin/ffprobe").is_ok());
    }

    #[test]
    fn framerate_handles_zero_denominator() {
        assert_eq!(parse_framerate("25/0"), None);
        assert_eq!(parse_framerate("25/1"), Some(25.0));
        assert_eq!(parse_framerate("25"), None);
    }
}
