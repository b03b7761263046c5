//! BlobStore trait definition.

use async_trait::async_trait;

use crate::blob::BlobError;

/// Metadata for a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobStat {
    pub size: u64,
    pub content_type: String,
}

/// Trait for blob storage backends.
///
/// Paths are the opaque `/api/files/...` strings produced by
/// [`crate::blob::paths`]; backends resolve them to object names internally.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), BlobError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, BlobError>;

    async fn stat(&self, path: &str) -> Result<BlobStat, BlobError>;

    /// Bucket backing this store, recorded on outgoing send events.
    fn bucket(&self) -> &str;
}
