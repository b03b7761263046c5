//! Visibility cache: per-student, deadline-expiring index of open jobs.
//!
//! The cache is a derived, rebuildable index over the notification store:
//! entries appear when a job is approved while the student was eligible and
//! logically expire once the score (the application deadline as epoch
//! seconds) falls behind the clock. Expiry is lazy: entries are pruned on
//! the read path, there is no background eviction.
//!
//! # Configuration
//!
//! ```toml
//! [cache]
//! backend = "redis"   # or "memory"
//!
//! [cache.redis]
//! url = "redis://127.0.0.1:6379"
//! pool_size = 4
//! connection_timeout = 5
//! key_prefix = "jobcast"
//! ```

mod error;
mod memory;
mod redis;
mod traits;

pub use error::CacheError;
pub use memory::MemoryVisibilityCache;
pub use redis::RedisVisibilityCache;
pub use traits::VisibilityCache;
