//! Cache error types.

use thiserror::Error;

/// Errors that can occur during visibility cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache operation failed: {0}")]
    Operation(String),

    #[error("Cache connection failed: {0}")]
    Connection(String),
}

impl From<CacheError> for crate::error::AppError {
    fn from(error: CacheError) -> Self {
        crate::error::AppError::Upstream {
            system: "cache",
            source: anyhow::Error::from(error),
        }
    }
}
