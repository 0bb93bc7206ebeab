//! Worker error types.

use reel_models::JobId;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Job already submitted: {0}")]
    DuplicateJob(JobId),

    #[error("Unknown job: {0}")]
    JobNotFound(JobId),

    #[error("Invalid job file: {0}")]
    InvalidJobFile(String),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_job_file(msg: impl Into<String>) -> Self {
        Self::InvalidJobFile(msg.into())
    }
}
