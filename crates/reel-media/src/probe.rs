//! FFprobe stream introspection.

use async_trait::async_trait;
use reel_models::MediaAsset;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::MediaToolConfig;

/// Reports the stream topology of a media file.
///
/// Probing never fails: an unreadable file yields an asset with no streams
/// and zero duration, and the caller decides whether that is fatal.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaAsset;
}

/// Prober backed by the ffprobe CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_bin: PathBuf,
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new(&MediaToolConfig::default())
    }
}

impl FfprobeProber {
    pub fn new(tools: &MediaToolConfig) -> Self {
        Self {
            ffprobe_bin: tools.ffprobe_bin.clone(),
        }
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> MediaAsset {
        let path = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf());

        let ffprobe = match which::which(&self.ffprobe_bin) {
            Ok(bin) => bin,
            Err(_) => {
                warn!("ffprobe not found at {}", self.ffprobe_bin.display());
                return MediaAsset::unreadable(&path);
            }
        };

        let output = Command::new(&ffprobe)
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
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match output {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                debug!(
                    "ffprobe failed for {}: {}",
                    path.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                return MediaAsset::unreadable(&path);
            }
            Err(e) => {
                warn!("Failed to spawn ffprobe: {}", e);
                return MediaAsset::unreadable(&path);
            }
        };

        parse_probe_output(&path, &output.stdout).unwrap_or_else(|| MediaAsset::unreadable(&path))
    }
}

/// FFprobe JSON output format.
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
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    disposition: Option<FfprobeDisposition>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

impl FfprobeStream {
    /// Embedded cover art is reported as a one-frame video stream.
    fn is_attached_picture(&self) -> bool {
        self.disposition.as_ref().is_some_and(|d| d.attached_pic != 0)
    }
}

/// Build an asset from ffprobe JSON; `None` when the JSON is unparseable.
pub fn parse_probe_output(path: &Path, stdout: &[u8]) -> Option<MediaAsset> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout).ok()?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video") && !s.is_attached_picture());
    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let container_duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_seconds);
    let duration_sec = container_duration
        .or_else(|| {
            probe
                .streams
                .iter()
                .filter_map(|s| s.duration.as_deref().and_then(parse_seconds))
                .reduce(f64::max)
        })
        .unwrap_or(0.0);

    let fps = video
        .and_then(|v| {
            v.avg_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .or_else(|| v.r_frame_rate.as_deref().and_then(parse_frame_rate))
        })
        .unwrap_or(0.0);

    Some(MediaAsset {
        path: path.to_path_buf(),
        has_video: video.is_some(),
        has_audio,
        duration_sec,
        width: video.and_then(|v| v.width).unwrap_or(0),
        height: video.and_then(|v| v.height).unwrap_or(0),
        fps,
    })
}

fn parse_seconds(s: &str) -> Option<f64> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        num / den
    } else {
        s.trim().parse().ok()?
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("N/A"), None);
    }

    #[test]
    fn test_parse_probe_video_and_audio() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "width": 1080, "height": 1920,
                 "avg_frame_rate": "30/1", "r_frame_rate": "30/1"},
                {"codec_type": "audio", "sample_rate": "48000"}
            ],
            "format": {"duration": "12.480000"}
        }"#;
        let asset = parse_probe_output(Path::new("/media/in.mp4"), json).unwrap();
        assert!(asset.has_both_streams());
        assert_eq!(asset.resolution(), Some((1080, 1920)));
        assert!((asset.duration_sec - 12.48).abs() < 1e-9);
        assert!((asset.fps - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_audio_only() {
        let json = br#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3.5"}}"#;
        let asset = parse_probe_output(Path::new("a.m4a"), json).unwrap();
        assert!(!asset.has_video);
        assert!(asset.has_audio);
        assert_eq!(asset.resolution(), None);
        assert_eq!(asset.fps, 0.0);
    }

    #[test]
    fn test_parse_probe_missing_container_duration_uses_streams() {
        let json = br#"{"streams": [
            {"codec_type": "video", "duration": "4.0",
             "avg_frame_rate": "0/0", "r_frame_rate": "25/1"},
            {"codec_type": "audio", "duration": "4.2"}
        ], "format": {"duration": "N/A"}}"#;
        let asset = parse_probe_output(Path::new("b.mp4"), json).unwrap();
        assert!((asset.duration_sec - 4.2).abs() < 1e-9);
        assert!((asset.fps - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_cover_art_is_not_video() {
        let json = br#"{
            "format": {"duration": "182.4"},
            "streams": [
                {"codec_type": "audio", "duration": "182.4"},
                {"codec_type": "video", "width": 600, "height": 600,
                 "avg_frame_rate": "0/0", "r_frame_rate": "90000/1",
                 "disposition": {"default": 0, "attached_pic": 1}}
            ]
        }"#;
        let asset = parse_probe_output(Path::new("/music/song.mp3"), json).unwrap();

        assert!(!asset.has_video);
        assert!(asset.has_audio);
        assert_eq!((asset.width, asset.height), (0, 0));
        assert_eq!(asset.fps, 0.0);
    }

    #[test]
    fn test_parse_probe_garbage() {
        assert!(parse_probe_output(Path::new("c.mp4"), b"<html>").is_none());
        let empty = parse_probe_output(Path::new("d.mp4"), b"{}").unwrap();
        assert!(empty.has_no_streams());
    }

    #[tokio::test]
    async fn test_probe_missing_tool_never_fails() {
        let prober = FfprobeProber::new(&MediaToolConfig::new("ffmpeg", "/nonexistent/ffprobe"));
        let asset = prober.probe(Path::new("/nonexistent/file.mp4")).await;
        assert!(asset.has_no_streams());
        assert_eq!(asset.duration_sec, 0.0);
    }
}
