#![deny(unreachable_patterns)]
//! FFmpeg-driven media transformation pipeline.
//!
//! This crate provides:
//! - Stream probing and repair/synthesis of missing tracks
//! - Caption regrouping and plain/overlay caption tracks
//! - Histogram-based scene segmentation
//! - A typed filter graph with named pins, validated before serialization
//! - Compose (captions, music ducking, flip) and remix (trim + concat) builders
//! - The per-job render executor driving an external render engine

pub mod captions;
pub mod collaborators;
pub mod command;
pub mod compose;
pub mod error;
pub mod executor;
pub mod fs_utils;
pub mod graph;
pub mod metrics;
pub mod probe;
pub mod remix;
pub mod repair;
pub mod scenes;

pub use captions::{
    regroup, render_overlay, render_plain, CaptionConfig, CaptionTracks, OverlayStyle,
};
pub use collaborators::{HighlightSelector, Transcriber};
pub use command::{FfmpegCommand, FfmpegRunner, MediaToolConfig, RenderEngine};
pub use compose::{build_compose_plan, AudioBranch, ComposeInputs, ComposePlan};
pub use error::{MediaError, MediaResult};
pub use executor::{RemixOutcome, RenderExecutor, RenderOutcome};
pub use graph::{Filter, FilterGraph, MediaKind, Pin, Stage, StageKind};
pub use probe::{FfprobeProber, MediaProber};
pub use remix::{build_remix_plan, RemixPlan};
pub use repair::{RepairAction, RepairedAsset, Repairer, SynthesisConfig};
pub use scenes::{segments_available, SceneSegmenter, SegmenterConfig};

#[cfg(test)]
pub(crate) mod testing;
