//! Persistence errors.

use crate::error::{ConfigError, ConsistencyError, Error};

/// Failure while reading a problem.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// Input is not valid JSON or does not match the schema types.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Input parsed but violates a runtime invariant.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Format version this build cannot read.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),
}

impl From<Error> for ReadError {
    fn from(e: Error) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<ConfigError> for ReadError {
    fn from(e: ConfigError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<ConsistencyError> for ReadError {
    fn from(e: ConsistencyError) -> Self {
        Self::Validation(e.to_string())
    }
}

/// Failure while writing a problem.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
