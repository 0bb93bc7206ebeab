//! Shared data models for the ReelForge media pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Probed media assets
//! - Caption cues and transcript fragments
//! - Scene segments and their summary statistics
//! - Render options, encoding configuration and render jobs
//! - Job identifiers and terminal job status

pub mod asset;
pub mod caption;
pub mod encoding;
pub mod error;
pub mod job;
pub mod render;
pub mod scene;

// Re-export common types
pub use asset::MediaAsset;
pub use caption::{CaptionCue, TranscriptFragment, WordTiming};
pub use encoding::EncodingConfig;
pub use error::{ModelError, ModelResult};
pub use job::{JobId, JobStatus};
pub use render::{RemixFallback, RenderJob, RenderMode, RenderOptions};
pub use scene::{SceneSegment, SceneStats};
