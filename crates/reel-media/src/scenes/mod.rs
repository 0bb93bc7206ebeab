//! Histogram-based scene segmentation.

mod histogram;

pub use histogram::{correlation, hs_histogram, CutDetector};

use reel_models::{MediaAsset, SceneSegment, SceneStats};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::command::MediaToolConfig;
use crate::error::{MediaError, MediaResult};

/// Analysis frame size; histograms are insensitive to the downscale.
const THUMB_WIDTH: u32 = 160;
const THUMB_HEIGHT: u32 = 90;

/// Scene cut detection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmenterConfig {
    /// Buckets per histogram channel
    pub hist_bins: usize,
    /// Minimum `1 - correlation` that counts as a cut
    pub diff_threshold: f64,
    /// Frames that must pass between two cuts
    pub min_gap_frames: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            hist_bins: 32,
            diff_threshold: 0.45,
            min_gap_frames: 10,
        }
    }
}

/// Splits a video into visual scenes.
#[derive(Debug, Clone)]
pub struct SceneSegmenter {
    ffmpeg_bin: PathBuf,
    config: SegmenterConfig,
}

impl SceneSegmenter {
    pub fn new(tools: &MediaToolConfig, config: SegmenterConfig) -> Self {
        Self {
            ffmpeg_bin: tools.ffmpeg_bin.clone(),
            config,
        }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Decode every frame, detect cuts and convert them to timed segments.
    pub async fn segment(&self, asset: &MediaAsset) -> MediaResult<Vec<SceneSegment>> {
        if !asset.has_video {
            return Err(MediaError::NoStreams(asset.path.clone()));
        }
        let ffmpeg = which::which(&self.ffmpeg_bin)
            .map_err(|_| MediaError::FfmpegNotFound(self.ffmpeg_bin.clone()))?;

        let mut child = Command::new(&ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(&asset.path)
            .args([
                "-map",
                "0:v:0",
                "-vf",
                &format!("scale={}:{}", THUMB_WIDTH, THUMB_HEIGHT),
                "-pix_fmt",
                "rgb24",
                "-f",
                "rawvideo",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stdout was not captured"))?;
        let mut reader = BufReader::new(stdout);
        let mut frame = vec![0u8; (THUMB_WIDTH * THUMB_HEIGHT * 3) as usize];
        let mut detector = CutDetector::new(self.config.diff_threshold, self.config.min_gap_frames);

        loop {
            match reader.read_exact(&mut frame).await {
                Ok(_) => {
                    let histogram = hs_histogram(&frame, self.config.hist_bins);
                    if let Some(index) = detector.push(histogram) {
                        debug!("Scene cut at frame {}", index);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            warn!("Frame decoder exited with status {:?}", status.code());
        }

        let frames = detector.frames_seen();
        let boundaries = detector.finish();
        let segments = boundaries_to_segments(&boundaries, frames, asset.fps, asset.duration_sec);
        info!(
            "Segmented {} into {} scenes from {} frames",
            asset.path.display(),
            segments.len(),
            frames
        );
        Ok(segments)
    }

    /// Summary statistics over segment durations.
    pub fn stats(segments: &[SceneSegment]) -> SceneStats {
        SceneStats::from_segments(segments)
    }
}

/// Convert frame boundaries into contiguous timed segments.
///
/// With a known duration the final segment ends exactly at it; a single
/// decoded frame yields one segment over the whole asset.
pub fn boundaries_to_segments(
    boundaries: &[usize],
    frames: usize,
    fps: f64,
    duration_sec: f64,
) -> Vec<SceneSegment> {
    let fps_known = fps.is_finite() && fps > 0.0;
    let to_secs = |frame: usize| {
        if fps_known {
            round_millis(frame as f64 / fps)
        } else {
            0.0
        }
    };

    if boundaries.len() < 2 {
        if frames > 0 && fps_known && duration_sec > 0.0 {
            return vec![SceneSegment::new(0.0, round_millis(duration_sec))];
        }
        return Vec::new();
    }

    let mut segments: Vec<SceneSegment> = boundaries
        .windows(2)
        .map(|pair| SceneSegment::new(to_secs(pair[0]), to_secs(pair[1])))
        .collect();

    if fps_known && duration_sec > 0.0 {
        if let Some(last) = segments.last_mut() {
            let end = round_millis(duration_sec).max(last.start_sec);
            *last = SceneSegment::new(last.start_sec, end);
        }
    }
    segments
}

/// A list where every duration is zero carries no timing information.
pub fn segments_available(segments: &[SceneSegment]) -> bool {
    segments.iter().any(|s| s.duration_sec > 0.0)
}

fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}
