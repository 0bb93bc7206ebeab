//! Caption cues and transcript fragments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single timed caption.
///
/// Cues are 1-indexed, contiguous in index, time-ordered and
/// non-overlapping when produced by the caption engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionCue {
    /// 1-based position in the cue list
    pub index: u32,
    /// Start time in seconds
    pub start_sec: f64,
    /// End time in seconds
    pub end_sec: f64,
    /// Caption text, at most two lines separated by `\n`
    pub text: String,
}

impl CaptionCue {
    /// Create a new cue.
    pub fn new(index: u32, start_sec: f64, end_sec: f64, text: impl Into<String>) -> Self {
        Self {
            index,
            start_sec,
            end_sec,
            text: text.into(),
        }
    }

    /// Finite, non-negative and strictly increasing time span.
    pub fn is_well_formed(&self) -> bool {
        self.start_sec.is_finite()
            && self.end_sec.is_finite()
            && self.start_sec >= 0.0
            && self.start_sec < self.end_sec
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end_sec - self.start_sec
    }
}

/// Word-level timing inside a transcript fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WordTiming {
    pub start_sec: f64,
    pub end_sec: f64,
    pub word: String,
}

impl WordTiming {
    pub fn new(start_sec: f64, end_sec: f64, word: impl Into<String>) -> Self {
        Self {
            start_sec,
            end_sec,
            word: word.into(),
        }
    }
}

/// A timed text span as returned by a transcription service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptFragment {
    pub start_sec: f64,
    pub end_sec: f64,
    pub text: String,
    /// Per-word timing; empty when the service did not provide it
    #[serde(default)]
    pub words: Vec<WordTiming>,
}

impl TranscriptFragment {
    /// Fragment without word timing.
    pub fn new(start_sec: f64, end_sec: f64, text: impl Into<String>) -> Self {
        Self {
            start_sec,
            end_sec,
            text: text.into(),
            words: Vec::new(),
        }
    }

    /// Attach word-level timing.
    pub fn with_words(mut self, words: Vec<WordTiming>) -> Self {
        self.words = words;
        self
    }
}
