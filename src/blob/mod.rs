//! Blob store: content-addressed-by-path storage for email bodies and
//! attachments.
//!
//! Notifications reference blobs by opaque path; paths are produced by the
//! naming helpers in [`paths`] and scoped by job id and purpose
//! (`email-body`, `attachment`, `admin-message`).
//!
//! # Configuration
//!
//! ```toml
//! [blob]
//! backend = "s3"      # or "memory"
//!
//! [blob.s3]
//! endpoint = "http://127.0.0.1:9000"
//! access_key = "minioadmin"
//! secret_key = "minioadmin"
//! bucket = "jobcast"
//! region = "us-east-1"
//! path_style = true
//! ```

mod error;
mod memory;
pub mod paths;
mod s3;
mod traits;

pub use error::BlobError;
pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;
pub use traits::{BlobStat, BlobStore};
