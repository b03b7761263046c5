//! Bus error types.

use thiserror::Error;

/// Errors that can occur during bus operations.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("Bus operation failed: {0}")]
    Operation(String),

    #[error("Bus connection failed: {0}")]
    Connection(String),

    #[error("Bus payload decode failed: {0}")]
    Decode(String),
}

impl From<BusError> for crate::error::AppError {
    fn from(error: BusError) -> Self {
        crate::error::AppError::Upstream {
            system: "bus",
            source: anyhow::Error::from(error),
        }
    }
}
