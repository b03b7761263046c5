//! Event bus trait definitions.

use async_trait::async_trait;

use crate::bus::BusError;

/// One message handed to a consumer. The id is broker-scoped and is what
/// `ack` commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: String,
    pub key: String,
    pub payload: Vec<u8>,
}

/// Producer side of the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Append one message to `topic`. `key` controls partition affinity.
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BusError>;
}

/// Consumer side of the bus. One consumer processes its partition
/// sequentially; `next` and `ack` are the manual offset-commit control.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// Wait briefly for the next delivery. `Ok(None)` means the topic is
    /// currently idle; callers loop.
    async fn next(&self) -> Result<Option<Delivery>, BusError>;

    /// Commit a delivery. Anything never acked is redelivered.
    async fn ack(&self, delivery: &Delivery) -> Result<(), BusError>;
}
