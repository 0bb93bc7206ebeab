//! Render options and render jobs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::caption::CaptionCue;
use crate::encoding::EncodingConfig;
use crate::error::{ModelError, ModelResult};
use crate::job::JobId;
use crate::scene::SceneSegment;

/// Default linear gain applied to background music
pub const DEFAULT_MUSIC_GAIN: f64 = 0.35;
/// Default sidechain threshold (linear)
pub const DEFAULT_DUCK_THRESHOLD: f64 = 0.05;
/// Default sidechain compression ratio
pub const DEFAULT_DUCK_RATIO: f64 = 12.0;
/// Default sidechain attack in milliseconds
pub const DEFAULT_DUCK_ATTACK_MS: f64 = 5.0;
/// Default sidechain release in milliseconds
pub const DEFAULT_DUCK_RELEASE_MS: f64 = 250.0;

/// Options controlling a composed render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RenderOptions {
    /// Composite captions into the frame instead of attaching a subtitle stream
    pub burn_in: bool,
    /// Mirror the frame horizontally
    pub flip: bool,
    /// Drop the source audio track
    pub remove_original_audio: bool,
    /// Background music file
    pub music_path: Option<PathBuf>,
    /// Linear gain applied to the music
    pub music_gain: f64,
    /// Loop music that is shorter than the video
    pub loop_music: bool,
    /// Sidechain threshold (linear amplitude)
    pub duck_threshold: f64,
    /// Sidechain compression ratio
    pub duck_ratio: f64,
    /// Sidechain attack in milliseconds
    pub duck_attack_ms: f64,
    /// Sidechain release in milliseconds
    pub duck_release_ms: f64,
    /// Video/audio encoding settings
    pub encoding: EncodingConfig,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            burn_in: true,
            flip: false,
            remove_original_audio: false,
            music_path: None,
            music_gain: DEFAULT_MUSIC_GAIN,
            loop_music: true,
            duck_threshold: DEFAULT_DUCK_THRESHOLD,
            duck_ratio: DEFAULT_DUCK_RATIO,
            duck_attack_ms: DEFAULT_DUCK_ATTACK_MS,
            duck_release_ms: DEFAULT_DUCK_RELEASE_MS,
            encoding: EncodingConfig::default(),
        }
    }
}

impl RenderOptions {
    pub fn with_music(mut self, path: impl Into<PathBuf>) -> Self {
        self.music_path = Some(path.into());
        self
    }

    pub fn with_flip(mut self, flip: bool) -> Self {
        self.flip = flip;
        self
    }

    pub fn with_burn_in(mut self, burn_in: bool) -> Self {
        self.burn_in = burn_in;
        self
    }

    pub fn with_original_audio_removed(mut self, remove: bool) -> Self {
        self.remove_original_audio = remove;
        self
    }

    /// Check the numeric invariants.
    pub fn validate(&self) -> ModelResult<()> {
        check_non_negative("music_gain", self.music_gain)?;
        check_non_negative("duck_threshold", self.duck_threshold)?;
        check_non_negative("duck_attack_ms", self.duck_attack_ms)?;
        check_non_negative("duck_release_ms", self.duck_release_ms)?;
        if !self.duck_ratio.is_finite() || self.duck_ratio < 1.0 {
            return Err(ModelError::invalid_option(
                "duck_ratio",
                format!("must be >= 1, got {}", self.duck_ratio),
            ));
        }
        if self.encoding.crf > 51 {
            return Err(ModelError::invalid_option(
                "encoding.crf",
                format!("must be in 0..=51, got {}", self.encoding.crf),
            ));
        }
        Ok(())
    }
}

fn check_non_negative(field: &'static str, value: f64) -> ModelResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ModelError::invalid_option(
            field,
            format!("must be a finite value >= 0, got {}", value),
        ))
    }
}

/// What to do when the remix stage of a job fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RemixFallback {
    /// Fail the whole job
    #[default]
    Fail,
    /// Continue composing from the unremixed source
    UseOriginal,
}

/// Which render pipeline a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Caption/music compose on the whole source
    Compose,
    /// Cut to the kept scenes first, then compose
    Remix,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Compose => "compose",
            RenderMode::Remix => "remix",
        }
    }
}

/// A unit of work for the render executor.
///
/// Consumed once; the terminal status is recorded and the job discarded.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderJob {
    #[serde(default)]
    pub job_id: JobId,
    pub input_path: PathBuf,
    /// Final output path; may be left empty for the worker to fill in
    #[serde(default)]
    pub output_path: PathBuf,
    #[serde(default)]
    pub options: RenderOptions,
    /// Pre-computed captions; transcription is used when absent
    #[serde(default)]
    pub captions: Option<Vec<CaptionCue>>,
    /// Scenes to keep, in output order
    #[serde(default)]
    pub scenes: Option<Vec<SceneSegment>>,
    /// Language hint for transcription
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub remix_fallback: RemixFallback,
}

impl RenderJob {
    /// Create a compose job with default options.
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            job_id: JobId::new(),
            input_path: input_path.into(),
            output_path: output_path.into(),
            options: RenderOptions::default(),
            captions: None,
            scenes: None,
            language: None,
            remix_fallback: RemixFallback::default(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_captions(mut self, captions: Vec<CaptionCue>) -> Self {
        self.captions = Some(captions);
        self
    }

    pub fn with_scenes(mut self, scenes: Vec<SceneSegment>) -> Self {
        self.scenes = Some(scenes);
        self
    }

    pub fn with_remix_fallback(mut self, fallback: RemixFallback) -> Self {
        self.remix_fallback = fallback;
        self
    }

    /// Pipeline selected by the presence of a keep list.
    pub fn mode(&self) -> RenderMode {
        if self.scenes.is_some() {
            RenderMode::Remix
        } else {
            RenderMode::Compose
        }
    }
}
