use thiserror::Error;

/// Application-wide error type that represents all possible errors in the system.
///
/// Pre-condition failures (`NotFound`, `Conflict`, `Validation`) are reported
/// to the caller immediately and never retried. Connectivity failures toward
/// the store, bus, cache, blob store or mail API surface as `Upstream` (or
/// `Database`/`ConnectionPool` for the primary store) and are the retryable
/// class: the pipelines react to them by withholding the acknowledgement so
/// the broker redelivers.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error with entity, field, and value information
    #[error("Resource not found: {entity} with {field}={value}")]
    NotFound {
        entity: String,
        field: String,
        value: String,
    },

    /// A status-transition guard failed: the record is already terminal or a
    /// concurrent command won the conditional update. The reason string is
    /// specific ("Job is already approved.", "Rejected job cannot be
    /// approved.", ...).
    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    /// Validation error with field-specific details
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Bad request error with descriptive message
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// A blob referenced from a stored record is missing at read time.
    /// Data-integrity failure, not retried.
    #[error("Blob not found: {path}")]
    BlobNotFound { path: String },

    /// Database operation error with operation context
    #[error("Database operation failed: {operation}")]
    Database {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// Bus, cache, blob or mail connectivity failure
    #[error("Upstream unavailable: {system}")]
    Upstream {
        system: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration error with key information
    #[error("Configuration error: {key}")]
    Configuration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Connection pool error
    #[error("Connection pool error")]
    ConnectionPool {
        #[source]
        source: anyhow::Error,
    },

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// Shorthand for the NotFound shape used for job lookups.
    pub fn job_not_found(job_id: i64) -> Self {
        AppError::NotFound {
            entity: "notification".to_string(),
            field: "job_id".to_string(),
            value: job_id.to_string(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        AppError::Conflict {
            reason: reason.into(),
        }
    }

    /// Whether a pipeline should acknowledge the triggering event anyway.
    ///
    /// Poison input and missing blobs are terminal per message; connectivity
    /// failures are not, and rely on broker redelivery.
    pub fn is_terminal_for_message(&self) -> bool {
        matches!(
            self,
            AppError::Validation { .. }
                | AppError::BadRequest { .. }
                | AppError::BlobNotFound { .. }
        )
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => AppError::NotFound {
                entity: "record".to_string(),
                field: "query".to_string(),
                value: String::new(),
            },
            other => AppError::Database {
                operation: "query".to_string(),
                source: anyhow::Error::from(other),
            },
        }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;
