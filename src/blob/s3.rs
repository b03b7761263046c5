//! S3/MinIO blob store implementation using rust-s3.

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::{Bucket, BucketConfiguration};

use crate::blob::paths::object_name_from_api_path;
use crate::blob::{BlobError, BlobStat, BlobStore};
use crate::config::settings::S3BlobConfig;

/// Blob store over one S3-compatible bucket (MinIO in the original
/// deployment). The bucket is created on startup if missing.
pub struct S3BlobStore {
    bucket: Box<Bucket>,
    bucket_name: String,
}

impl S3BlobStore {
    pub async fn new(config: &S3BlobConfig) -> Result<Self, BlobError> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| BlobError::Connection(format!("Invalid credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let mut bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())
            .map_err(|e| BlobError::Connection(format!("Failed to create bucket handle: {}", e)))?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        let store = Self {
            bucket,
            bucket_name: config.bucket.clone(),
        };
        store.ensure_bucket(region, credentials, config).await?;
        Ok(store)
    }

    async fn ensure_bucket(
        &self,
        region: Region,
        credentials: Credentials,
        config: &S3BlobConfig,
    ) -> Result<(), BlobError> {
        match self.bucket.list("".to_string(), Some("/".to_string())).await {
            Ok(_) => Ok(()),
            Err(S3Error::HttpFailWithBody(404, _)) | Err(S3Error::HttpFail) => {
                Bucket::create_with_path_style(
                    &config.bucket,
                    region,
                    credentials,
                    BucketConfiguration::default(),
                )
                .await
                .map_err(|e| {
                    BlobError::Connection(format!("Failed to create bucket: {}", e))
                })?;
                tracing::info!(bucket = %config.bucket, "Blob bucket created");
                Ok(())
            }
            Err(e) => Err(BlobError::Connection(format!(
                "Failed to check bucket: {}",
                e
            ))),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), BlobError> {
        let object_name = object_name_from_api_path(path)?;

        self.bucket
            .put_object_with_content_type(&object_name, &bytes, content_type)
            .await
            .map_err(|e| BlobError::Operation(format!("Failed to upload {}: {}", path, e)))?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        let object_name = object_name_from_api_path(path)?;

        match self.bucket.get_object(&object_name).await {
            Ok(response) => Ok(response.bytes().to_vec()),
            Err(S3Error::HttpFailWithBody(404, _)) => Err(BlobError::NotFound {
                path: path.to_string(),
            }),
            Err(e) => Err(BlobError::Operation(format!(
                "Failed to download {}: {}",
                path, e
            ))),
        }
    }

    async fn stat(&self, path: &str) -> Result<BlobStat, BlobError> {
        let object_name = object_name_from_api_path(path)?;

        match self.bucket.head_object(&object_name).await {
            Ok((head, _)) => Ok(BlobStat {
                size: head.content_length.unwrap_or(0) as u64,
                content_type: head
                    .content_type
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
            }),
            Err(S3Error::HttpFailWithBody(404, _)) | Err(S3Error::HttpFail) => {
                Err(BlobError::NotFound {
                    path: path.to_string(),
                })
            }
            Err(e) => Err(BlobError::Operation(format!(
                "Failed to stat {}: {}",
                path, e
            ))),
        }
    }

    fn bucket(&self) -> &str {
        &self.bucket_name
    }
}
