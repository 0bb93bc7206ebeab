//! Scene segment models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Tolerance applied when checking a segment end against a probed duration.
pub const SEGMENT_END_TOLERANCE_SECS: f64 = 0.05;

/// A time range of the source asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneSegment {
    /// Start time in seconds
    pub start_sec: f64,
    /// End time in seconds
    pub end_sec: f64,
    /// `end_sec - start_sec`
    pub duration_sec: f64,
    /// Spoken text covering the segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Free-form rationale, e.g. from a highlight selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SceneSegment {
    /// Create a segment; the duration is derived from the bounds.
    pub fn new(start_sec: f64, end_sec: f64) -> Self {
        Self {
            start_sec,
            end_sec,
            duration_sec: end_sec - start_sec,
            text: None,
            reason: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Check that the segment is usable as a cut of an asset of `asset_duration` seconds.
    pub fn validate_within(&self, asset_duration: f64) -> ModelResult<()> {
        if !self.start_sec.is_finite() || !self.end_sec.is_finite() {
            return Err(ModelError::invalid_segment(
                self.start_sec,
                self.end_sec,
                "bounds must be finite",
            ));
        }
        if self.start_sec < 0.0 {
            return Err(ModelError::invalid_segment(
                self.start_sec,
                self.end_sec,
                "start is negative",
            ));
        }
        if self.start_sec >= self.end_sec {
            return Err(ModelError::invalid_segment(
                self.start_sec,
                self.end_sec,
                "start must be before end",
            ));
        }
        if asset_duration > 0.0 && self.end_sec > asset_duration + SEGMENT_END_TOLERANCE_SECS {
            return Err(ModelError::invalid_segment(
                self.start_sec,
                self.end_sec,
                format!("end exceeds asset duration {:.3}s", asset_duration),
            ));
        }
        Ok(())
    }
}

/// Summary statistics over segment durations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub p90: f64,
    pub shortest: f64,
    pub longest: f64,
}

impl SceneStats {
    /// Compute statistics over the durations of `segments`.
    ///
    /// Percentiles use linear interpolation between closest ranks.
    /// An empty list yields all zeros.
    pub fn from_segments(segments: &[SceneSegment]) -> Self {
        let mut durations: Vec<f64> = segments
            .iter()
            .map(|s| s.duration_sec)
            .filter(|d| d.is_finite())
            .collect();

        if durations.is_empty() {
            return Self::default();
        }

        durations.sort_by(|a, b| a.total_cmp(b));
        let sum: f64 = durations.iter().sum();

        Self {
            count: segments.len(),
            mean: sum / durations.len() as f64,
            median: percentile(&durations, 50.0),
            p90: percentile(&durations, 90.0),
            shortest: durations[0],
            longest: durations[durations.len() - 1],
        }
    }
}

/// Linear-interpolated percentile over sorted values.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (pct / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}
