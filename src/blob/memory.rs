//! In-memory blob store for local development and tests.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::blob::{BlobError, BlobStat, BlobStore};

/// DashMap-backed blob store keyed by public path.
pub struct MemoryBlobStore {
    objects: DashMap<String, (Vec<u8>, String)>,
    bucket_name: String,
}

impl MemoryBlobStore {
    pub fn new(bucket_name: impl Into<String>) -> Self {
        Self {
            objects: DashMap::new(),
            bucket_name: bucket_name.into(),
        }
    }

    /// Drops a stored blob; used by tests to simulate integrity failures.
    pub fn remove(&self, path: &str) {
        self.objects.remove(path);
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("jobcast")
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), BlobError> {
        self.objects
            .insert(path.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        self.objects
            .get(path)
            .map(|entry| entry.0.clone())
            .ok_or_else(|| BlobError::NotFound {
                path: path.to_string(),
            })
    }

    async fn stat(&self, path: &str) -> Result<BlobStat, BlobError> {
        self.objects
            .get(path)
            .map(|entry| BlobStat {
                size: entry.0.len() as u64,
                content_type: entry.1.clone(),
            })
            .ok_or_else(|| BlobError::NotFound {
                path: path.to_string(),
            })
    }

    fn bucket(&self) -> &str {
        &self.bucket_name
    }
}
