//! Caption engine: regrouping and caption track serialization.

mod overlay;
mod plain;
mod regroup;

pub use overlay::{ass_timestamp, escape_overlay_text, render_overlay, OverlayStyle};
pub use plain::{render_plain, srt_timestamp};
pub use regroup::{regroup, wrap_lines};

use reel_models::{CaptionCue, MediaAsset};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::MediaResult;

/// Default character budget per caption line.
pub const DEFAULT_MAX_CHARS: usize = 36;
/// Default maximum cue duration in seconds.
pub const DEFAULT_MAX_DURATION_SECS: f64 = 2.8;
/// Default maximum lines per cue.
pub const DEFAULT_MAX_LINES: usize = 2;

/// Limits applied when regrouping transcript fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionConfig {
    pub max_chars: usize,
    pub max_duration_secs: f64,
    pub max_lines: usize,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

/// Caption track files written for one render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptionTracks {
    /// Styled overlay track for burn-in
    pub overlay: Option<PathBuf>,
    /// Plain track for a soft subtitle stream
    pub plain: Option<PathBuf>,
    /// Number of cues that were serialized
    pub cue_count: usize,
}

impl CaptionTracks {
    /// No caption files.
    pub fn none() -> Self {
        Self::default()
    }

    /// Write both tracks into `dir`, styled for the asset's resolution.
    ///
    /// Returns no tracks when no cue survives validation.
    pub async fn write(dir: &Path, cues: &[CaptionCue], asset: &MediaAsset) -> MediaResult<Self> {
        let cue_count = cues
            .iter()
            .filter(|c| c.is_well_formed() && !c.text.trim().is_empty())
            .count();
        if cue_count == 0 {
            return Ok(Self::none());
        }

        let plain_path = dir.join("captions.srt");
        let overlay_path = dir.join("captions.ass");
        let style = OverlayStyle::for_resolution(asset.resolution());

        tokio::fs::write(&plain_path, render_plain(cues)).await?;
        tokio::fs::write(&overlay_path, render_overlay(cues, &style)).await?;
        debug!(
            "Wrote {} caption cues to {} (font size {})",
            cue_count,
            dir.display(),
            style.font_size
        );

        Ok(Self {
            overlay: Some(overlay_path),
            plain: Some(plain_path),
            cue_count,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.cue_count == 0
    }
}
