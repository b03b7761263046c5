//! Configuration settings structures for jobcast.
//!
//! Every backend port (store, cache, bus, blob, email) is selected and tuned
//! here. All fields carry serde defaults so a bare config file is valid; the
//! memory backends need no external services at all.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "jobcast".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_pool_size() -> u32 {
    4
}

fn default_redis_timeout() -> u64 {
    5
}

fn default_key_prefix() -> String {
    "jobcast".to_string()
}

fn default_block_millis() -> u64 {
    1000
}

fn default_intake_topic() -> String {
    "job.notification.pending".to_string()
}

fn default_send_topic() -> String {
    "job.notification.send".to_string()
}

fn default_group() -> String {
    "jobcast".to_string()
}

fn default_s3_endpoint() -> String {
    "http://127.0.0.1:9000".to_string()
}

fn default_bucket() -> String {
    "jobcast".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_zepto_url() -> String {
    "https://api.zeptomail.in/v1.1/email".to_string()
}

fn default_from_email() -> String {
    "noreply@placement.example".to_string()
}

fn default_from_name() -> String {
    "Placement Cell".to_string()
}

fn default_email_timeout() -> u64 {
    30
}

fn default_reconciler_interval() -> u64 {
    60
}

fn default_reconciler_grace() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

// ============================================================================
// Application Configuration
// ============================================================================

/// Application basic information configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Store Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Notification store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "StoreConfig::default_backend")]
    pub backend: StoreBackend,

    /// PostgreSQL connection URL; required for the postgres backend.
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

impl StoreConfig {
    fn default_backend() -> StoreBackend {
        StoreBackend::Postgres
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.backend == StoreBackend::Postgres && self.url.is_empty() {
            return Err(AppError::Configuration {
                key: "store.url".to_string(),
                source: anyhow::anyhow!("store.url is required when store.backend = \"postgres\""),
            });
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Self::default_backend(),
            url: String::new(),
            max_connections: default_max_connections(),
            connection_timeout: default_connection_timeout(),
        }
    }
}

// ============================================================================
// Cache Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

/// Redis connection settings for the visibility cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisCacheConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    #[serde(default = "default_redis_timeout")]
    pub connection_timeout: u64,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_pool_size(),
            connection_timeout: default_redis_timeout(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// Visibility cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    #[serde(default = "CacheConfig::default_backend")]
    pub backend: CacheBackend,

    #[serde(default)]
    pub redis: RedisCacheConfig,
}

impl CacheConfig {
    fn default_backend() -> CacheBackend {
        CacheBackend::Redis
    }
}

impl Default for CacheBackend {
    fn default() -> Self {
        CacheBackend::Redis
    }
}

// ============================================================================
// Bus Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusBackend {
    Redis,
    Memory,
}

/// Redis Streams connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisBusConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    #[serde(default = "default_redis_timeout")]
    pub connection_timeout: u64,

    /// How long one XREADGROUP blocks waiting for new entries.
    #[serde(default = "default_block_millis")]
    pub block_millis: u64,
}

impl Default for RedisBusConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_pool_size(),
            connection_timeout: default_redis_timeout(),
            block_millis: default_block_millis(),
        }
    }
}

/// Event bus configuration, including the two topics the pipelines use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "BusConfig::default_backend")]
    pub backend: BusBackend,

    #[serde(default = "default_intake_topic")]
    pub intake_topic: String,

    #[serde(default = "default_send_topic")]
    pub send_topic: String,

    /// Consumer group shared by all instances of one deployment.
    #[serde(default = "default_group")]
    pub group: String,

    #[serde(default)]
    pub redis: RedisBusConfig,
}

impl BusConfig {
    fn default_backend() -> BusBackend {
        BusBackend::Redis
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backend: Self::default_backend(),
            intake_topic: default_intake_topic(),
            send_topic: default_send_topic(),
            group: default_group(),
            redis: RedisBusConfig::default(),
        }
    }
}

// ============================================================================
// Blob Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    S3,
    Memory,
}

/// S3/MinIO connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3BlobConfig {
    #[serde(default = "default_s3_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub access_key: String,

    #[serde(default)]
    pub secret_key: String,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// MinIO requires path-style addressing.
    #[serde(default = "default_true")]
    pub path_style: bool,
}

impl Default for S3BlobConfig {
    fn default() -> Self {
        Self {
            endpoint: default_s3_endpoint(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: default_bucket(),
            region: default_region(),
            path_style: true,
        }
    }
}

/// Blob store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobConfig {
    #[serde(default = "BlobConfig::default_backend")]
    pub backend: BlobBackend,

    #[serde(default)]
    pub s3: S3BlobConfig,
}

impl BlobConfig {
    fn default_backend() -> BlobBackend {
        BlobBackend::S3
    }
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            backend: Self::default_backend(),
            s3: S3BlobConfig::default(),
        }
    }
}

// ============================================================================
// Email Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    Zepto,
    Recording,
}

/// Email send capability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "EmailConfig::default_provider")]
    pub provider: EmailProvider,

    #[serde(default = "default_zepto_url")]
    pub api_url: String,

    /// API token; required for the zepto provider.
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_from_email")]
    pub from_email: String,

    #[serde(default = "default_from_name")]
    pub from_name: String,

    #[serde(default = "default_email_timeout")]
    pub timeout_seconds: u64,
}

impl EmailConfig {
    fn default_provider() -> EmailProvider {
        EmailProvider::Zepto
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.provider == EmailProvider::Zepto && self.token.is_empty() {
            return Err(AppError::Configuration {
                key: "email.token".to_string(),
                source: anyhow::anyhow!("email.token is required when email.provider = \"zepto\""),
            });
        }
        Ok(())
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider: Self::default_provider(),
            api_url: default_zepto_url(),
            token: String::new(),
            from_email: default_from_email(),
            from_name: default_from_name(),
            timeout_seconds: default_email_timeout(),
        }
    }
}

// ============================================================================
// Reconciler Configuration
// ============================================================================

/// Reconciliation sweep for notifications stuck in APPROVED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_reconciler_interval")]
    pub interval_seconds: u64,

    /// Minimum age of an APPROVED record before the sweep touches it.
    #[serde(default = "default_reconciler_grace")]
    pub grace_seconds: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_reconciler_interval(),
            grace_seconds: default_reconciler_grace(),
        }
    }
}

// ============================================================================
// Logger Configuration
// ============================================================================

/// Logger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of the human format.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============================================================================
// Root settings
// ============================================================================

/// Root settings aggregating every section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub blob: BlobConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    #[serde(default)]
    pub logger: LoggerConfig,
}

impl Settings {
    /// Cross-field validation run before anything connects out.
    pub fn validate(&self) -> Result<(), AppError> {
        self.store.validate()?;
        self.email.validate()?;

        if self.bus.intake_topic == self.bus.send_topic {
            return Err(AppError::Configuration {
                key: "bus.send_topic".to_string(),
                source: anyhow::anyhow!("intake_topic and send_topic must differ"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_self_consistent() {
        let settings = Settings::default();
        assert_eq!(settings.bus.intake_topic, "job.notification.pending");
        assert_eq!(settings.bus.send_topic, "job.notification.send");
        assert_eq!(settings.cache.redis.key_prefix, "jobcast");
        assert!(settings.reconciler.enabled);
    }

    #[test]
    fn postgres_backend_requires_url() {
        let settings = Settings::default();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.store.backend = StoreBackend::Memory;
        settings.email.provider = EmailProvider::Recording;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn matching_topics_are_rejected() {
        let mut settings = Settings::default();
        settings.store.backend = StoreBackend::Memory;
        settings.email.provider = EmailProvider::Recording;
        settings.bus.send_topic = settings.bus.intake_topic.clone();
        assert!(settings.validate().is_err());
    }
}
