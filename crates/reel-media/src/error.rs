//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found: {0}")]
    FfmpegNotFound(PathBuf),

    #[error("FFprobe not found: {0}")]
    FfprobeNotFound(PathBuf),

    /// The input is empty or is not media at all.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No usable stream even after a remux attempt.
    #[error("Input has no detectable streams: {0}")]
    NoStreams(PathBuf),

    #[error("Remix requested with an empty scene list")]
    EmptySceneList,

    #[error("Render engine failed: {message}")]
    RenderEngine {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Render engine timed out after {0} seconds")]
    Timeout(u64),

    #[error("Unsupported option combination: {0}")]
    UnsupportedOptionCombination(String),

    #[error("Invalid render options: {0}")]
    InvalidOptions(String),

    #[error("Invalid scene segment: {0}")]
    InvalidSegment(String),

    #[error("Invalid filter graph: {0}")]
    InvalidGraph(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create a render engine failure error.
    pub fn render_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::RenderEngine {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an invalid graph error.
    pub fn invalid_graph(message: impl Into<String>) -> Self {
        Self::InvalidGraph(message.into())
    }

    /// Create an unsupported option combination error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOptionCombination(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Caller mistakes that no fallback can recover from.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            MediaError::EmptySceneList
                | MediaError::InvalidSegment(_)
                | MediaError::InvalidOptions(_)
                | MediaError::UnsupportedOptionCombination(_)
        )
    }

    /// Human-readable message including the engine diagnostics, if any.
    pub fn detailed_message(&self) -> String {
        match self {
            MediaError::RenderEngine {
                message,
                stderr: Some(stderr),
                exit_code,
            } if !stderr.trim().is_empty() => {
                let code = exit_code.map(|c| c.to_string()).unwrap_or_else(|| "?".into());
                format!("{} (exit code {}): {}", message, code, stderr.trim())
            }
            other => other.to_string(),
        }
    }
}

impl From<reel_models::ModelError> for MediaError {
    fn from(e: reel_models::ModelError) -> Self {
        match e {
            reel_models::ModelError::InvalidOption { .. } => Self::InvalidOptions(e.to_string()),
            reel_models::ModelError::InvalidSegment { .. } => Self::InvalidSegment(e.to_string()),
        }
    }
}
