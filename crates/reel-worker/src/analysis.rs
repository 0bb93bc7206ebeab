//! Source analysis: visual scenes, transcript segments and highlight picks.
//!
//! Each part degrades independently. A failed transcription yields an
//! empty transcript section; the report is still written.

use chrono::{DateTime, Utc};
use reel_media::repair::check_media_file;
use reel_media::{
    segments_available, HighlightSelector, MediaError, MediaProber, SceneSegmenter, Transcriber,
};
use reel_models::{CaptionCue, MediaAsset, SceneSegment, SceneStats, TranscriptFragment};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::WorkerResult;

/// Transcript spans shorter than this are dropped.
pub const MIN_TRANSCRIPT_SPAN_SECS: f64 = 0.1;

/// A list of segments with its summary statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub segments: Vec<SceneSegment>,
    pub stats: SceneStats,
    /// At least one segment has a positive duration
    pub available: bool,
}

impl SegmentSummary {
    pub fn from_segments(segments: Vec<SceneSegment>) -> Self {
        Self {
            stats: SceneStats::from_segments(&segments),
            available: segments_available(&segments),
            segments,
        }
    }
}

/// Persisted analysis of one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub source: MediaAsset,
    pub scenes: SegmentSummary,
    pub transcript: SegmentSummary,
    pub highlights: SegmentSummary,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisReport {
    /// Write the report as pretty-printed JSON.
    pub async fn write(&self, path: &Path) -> WorkerResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub async fn read(path: &Path) -> WorkerResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Builds [`AnalysisReport`]s.
pub struct SourceAnalyzer {
    prober: Arc<dyn MediaProber>,
    segmenter: Option<SceneSegmenter>,
    transcriber: Option<Arc<dyn Transcriber>>,
    highlights: Option<Arc<dyn HighlightSelector>>,
}

impl SourceAnalyzer {
    pub fn new(prober: Arc<dyn MediaProber>) -> Self {
        Self {
            prober,
            segmenter: None,
            transcriber: None,
            highlights: None,
        }
    }

    pub fn with_segmenter(mut self, segmenter: SceneSegmenter) -> Self {
        self.segmenter = Some(segmenter);
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_highlights(mut self, highlights: Arc<dyn HighlightSelector>) -> Self {
        self.highlights = Some(highlights);
        self
    }

    pub async fn analyze(
        &self,
        path: &Path,
        language: Option<&str>,
    ) -> WorkerResult<AnalysisReport> {
        check_media_file(path).await?;
        let source = self.prober.probe(path).await;
        if source.has_no_streams() {
            return Err(MediaError::NoStreams(path.to_path_buf()).into());
        }

        let scenes = self.scenes(&source).await;
        let fragments = self.fragments(&source, language).await;
        let transcript = transcript_segments(&fragments);
        let highlights = self.highlights(&fragments).await;

        info!(
            source = %path.display(),
            scenes = scenes.len(),
            transcript_segments = transcript.len(),
            highlights = highlights.len(),
            "Analysis complete"
        );

        Ok(AnalysisReport {
            source,
            scenes: SegmentSummary::from_segments(scenes),
            transcript: SegmentSummary::from_segments(transcript),
            highlights: SegmentSummary::from_segments(highlights),
            generated_at: Utc::now(),
        })
    }

    async fn scenes(&self, source: &MediaAsset) -> Vec<SceneSegment> {
        let Some(segmenter) = &self.segmenter else {
            return Vec::new();
        };
        if !source.has_video {
            return Vec::new();
        }
        match segmenter.segment(source).await {
            Ok(segments) => segments,
            Err(e) => {
                warn!("Scene segmentation failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn fragments(
        &self,
        source: &MediaAsset,
        language: Option<&str>,
    ) -> Vec<TranscriptFragment> {
        let Some(transcriber) = &self.transcriber else {
            return Vec::new();
        };
        match transcriber.transcribe(source, language).await {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!("Transcription failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn highlights(&self, fragments: &[TranscriptFragment]) -> Vec<SceneSegment> {
        let Some(selector) = &self.highlights else {
            return Vec::new();
        };
        let cues = transcript_cues(fragments);
        match selector.select(&cues).await {
            Ok(picks) => picks
                .into_iter()
                .filter(|s| {
                    s.start_sec.is_finite() && s.end_sec.is_finite() && s.start_sec < s.end_sec
                })
                .map(|s| SceneSegment {
                    duration_sec: s.end_sec - s.start_sec,
                    ..s
                })
                .collect(),
            Err(e) => {
                warn!("Highlight selection failed: {}", e);
                Vec::new()
            }
        }
    }
}

fn keep_fragment(fragment: &TranscriptFragment) -> bool {
    let text = fragment.text.trim();
    !text.is_empty()
        && fragment.start_sec.is_finite()
        && fragment.end_sec.is_finite()
        && fragment.end_sec - fragment.start_sec >= MIN_TRANSCRIPT_SPAN_SECS
}

/// Fragments as text-carrying segments, dropping spans under 0.1 s.
pub fn transcript_segments(fragments: &[TranscriptFragment]) -> Vec<SceneSegment> {
    fragments
        .iter()
        .filter(|f| keep_fragment(f))
        .map(|f| SceneSegment::new(f.start_sec, f.end_sec).with_text(f.text.trim()))
        .collect()
}

/// Fragment-level cues handed to the highlight selector.
fn transcript_cues(fragments: &[TranscriptFragment]) -> Vec<CaptionCue> {
    fragments
        .iter()
        .filter(|f| keep_fragment(f))
        .enumerate()
        .map(|(i, f)| CaptionCue::new(i as u32 + 1, f.start_sec, f.end_sec, f.text.trim()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_segments_drop_short_and_blank_spans() {
        let fragments = vec![
            TranscriptFragment::new(0.0, 1.5, " first line "),
            TranscriptFragment::new(1.5, 1.55, "uh"),
            TranscriptFragment::new(1.6, 2.4, "   "),
            TranscriptFragment::new(2.4, 4.0, "second line"),
        ];
        let segments = transcript_segments(&fragments);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text.as_deref(), Some("first line"));
        assert!((segments[1].duration_sec - 1.6).abs() < 1e-9);
    }

    #[test]
    fn test_transcript_cues_are_renumbered() {
        let fragments = vec![
            TranscriptFragment::new(0.0, 0.05, "skip"),
            TranscriptFragment::new(0.1, 1.0, "a"),
            TranscriptFragment::new(1.0, 2.0, "b"),
        ];
        let cues = transcript_cues(&fragments);
        assert_eq!(cues.iter().map(|c| c.index).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_summary_of_empty_list() {
        let summary = SegmentSummary::from_segments(Vec::new());
        assert!(!summary.available);
        assert_eq!(summary.stats.count, 0);
    }
}
