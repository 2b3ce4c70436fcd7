//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised by the shared helpers
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

impl CommonError {
    /// Create an invalid value error for a named setting
    pub fn invalid_value(
        name: impl Into<String>,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidValue {
            name: name.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}
