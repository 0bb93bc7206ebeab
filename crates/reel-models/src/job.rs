//! Job identifiers and terminal job status.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a render job.
///
/// A job moves `processing -> complete` or `processing -> failed`;
/// no other transitions exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Processing {
        started_at: DateTime<Utc>,
    },
    Complete {
        output_path: PathBuf,
        finished_at: DateTime<Utc>,
    },
    Failed {
        error_message: String,
        finished_at: DateTime<Utc>,
    },
}

impl JobStatus {
    pub fn processing() -> Self {
        Self::Processing {
            started_at: Utc::now(),
        }
    }

    pub fn complete(output_path: impl Into<PathBuf>) -> Self {
        Self::Complete {
            output_path: output_path.into(),
            finished_at: Utc::now(),
        }
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        Self::Failed {
            error_message: error_message.into(),
            finished_at: Utc::now(),
        }
    }

    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing { .. } => "processing",
            JobStatus::Complete { .. } => "complete",
            JobStatus::Failed { .. } => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing { .. })
    }

    pub fn output_path(&self) -> Option<&PathBuf> {
        match self {
            JobStatus::Complete { output_path, .. } => Some(output_path),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            JobStatus::Failed { error_message, .. } => Some(error_message),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
