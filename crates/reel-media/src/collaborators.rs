//! External collaborators consulted by the pipeline.

use async_trait::async_trait;
use reel_models::{CaptionCue, MediaAsset, SceneSegment, TranscriptFragment};

use crate::error::MediaResult;

/// Speech-to-text service.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Ordered timed fragments, optionally with word timing.
    async fn transcribe(
        &self,
        asset: &MediaAsset,
        language: Option<&str>,
    ) -> MediaResult<Vec<TranscriptFragment>>;
}

/// Picks highlight segments from a transcript.
#[async_trait]
pub trait HighlightSelector: Send + Sync {
    async fn select(&self, transcript: &[CaptionCue]) -> MediaResult<Vec<SceneSegment>>;
}
