//! File-backed collaborators.
//!
//! Transcripts and highlight picks produced by external services are
//! handed to the worker as JSON files.

use async_trait::async_trait;
use reel_media::{HighlightSelector, MediaError, MediaResult, Transcriber};
use reel_models::{CaptionCue, MediaAsset, SceneSegment, TranscriptFragment};
use std::path::{Path, PathBuf};
use tracing::debug;

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> MediaResult<T> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        MediaError::invalid_input(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Transcript stored as a JSON array of fragments.
#[derive(Debug, Clone)]
pub struct TranscriptFile {
    path: PathBuf,
}

impl TranscriptFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Transcriber for TranscriptFile {
    async fn transcribe(
        &self,
        asset: &MediaAsset,
        _language: Option<&str>,
    ) -> MediaResult<Vec<TranscriptFragment>> {
        debug!(
            "Loading transcript for {} from {}",
            asset.path.display(),
            self.path.display()
        );
        read_json(&self.path).await
    }
}

/// Highlight picks stored as a JSON array of segments.
#[derive(Debug, Clone)]
pub struct HighlightFile {
    path: PathBuf,
}

impl HighlightFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl HighlightSelector for HighlightFile {
    async fn select(&self, _transcript: &[CaptionCue]) -> MediaResult<Vec<SceneSegment>> {
        read_json(&self.path).await
    }
}
