//! Render job worker.
//!
//! This crate provides:
//! - Worker configuration from the environment
//! - A concurrency-safe job status store
//! - The job executor (one task per job, bounded concurrency, timeouts)
//! - Source analysis reports
//! - File-backed transcript and highlight collaborators

pub mod analysis;
pub mod config;
pub mod error;
pub mod executor;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod sidecar;
pub mod status;

pub use analysis::{AnalysisReport, SegmentSummary, SourceAnalyzer};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use jobs::{default_output_path, load_job_file};
pub use logging::{init_tracing, JobLogger};
pub use sidecar::{HighlightFile, TranscriptFile};
pub use status::{JobStatusStore, StatusHandle};
