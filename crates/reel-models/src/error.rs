//! Validation errors for model types.

use thiserror::Error;

/// Result type for model validation.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised when a model value violates its invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Invalid render option `{field}`: {message}")]
    InvalidOption { field: &'static str, message: String },

    #[error("Invalid segment [{start:.3}, {end:.3}]: {message}")]
    InvalidSegment { start: f64, end: f64, message: String },
}

impl ModelError {
    /// Create an invalid option error.
    pub fn invalid_option(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            field,
            message: message.into(),
        }
    }

    /// Create an invalid segment error.
    pub fn invalid_segment(start: f64, end: f64, message: impl Into<String>) -> Self {
        Self::InvalidSegment {
            start,
            end,
            message: message.into(),
        }
    }
}
