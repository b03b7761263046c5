//! Blob store error types.

use thiserror::Error;

/// Errors that can occur during blob operations.
///
/// `NotFound` is kept distinct because a missing referenced blob is a
/// data-integrity failure for the fan-out pipeline, not a retryable one.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob not found: {path}")]
    NotFound { path: String },

    #[error("Invalid blob path: {0}")]
    InvalidPath(String),

    #[error("Blob operation failed: {0}")]
    Operation(String),

    #[error("Blob connection failed: {0}")]
    Connection(String),
}

impl From<BlobError> for crate::error::AppError {
    fn from(error: BlobError) -> Self {
        match error {
            BlobError::NotFound { path } => crate::error::AppError::BlobNotFound { path },
            other => crate::error::AppError::Upstream {
                system: "blob",
                source: anyhow::Error::from(other),
            },
        }
    }
}
