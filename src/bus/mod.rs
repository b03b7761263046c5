//! Event bus: at-least-once publish/consume with manual acknowledgement.
//!
//! Acknowledgement is the sole retry boundary in the system: a delivery that
//! is never acked is redelivered by the broker, so pipeline handlers must be
//! idempotent or duplicate-tolerant. Messages are keyed by job id for
//! partition affinity; ordering is only guaranteed within one key.
//!
//! # Configuration
//!
//! ```toml
//! [bus]
//! backend = "redis"   # or "memory"
//! intake_topic = "job.notification.pending"
//! send_topic = "job.notification.send"
//! group = "jobcast"
//!
//! [bus.redis]
//! url = "redis://127.0.0.1:6379"
//! pool_size = 4
//! connection_timeout = 5
//! block_millis = 1000
//! ```

mod error;
mod memory;
mod redis;
mod traits;

pub use error::BusError;
pub use memory::{MemoryEventBus, MemoryEventConsumer};
pub use redis::{RedisEventConsumer, RedisEventPublisher};
pub use traits::{Delivery, EventConsumer, EventPublisher};
