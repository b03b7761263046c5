//! In-memory event bus.
//!
//! Per-topic FIFO queue plus a pending set: `next` moves a delivery from the
//! queue to the pending set, `ack` removes it, and `redeliver_unacked` pushes
//! everything still pending back to the front of the queue: the same
//! redelivery contract a broker gives after a consumer crash or timeout.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::bus::{BusError, Delivery, EventConsumer, EventPublisher};

#[derive(Default)]
struct Topic {
    queue: Mutex<VecDeque<Delivery>>,
    pending: Mutex<HashMap<String, Delivery>>,
    seq: AtomicU64,
}

/// In-process bus shared by publishers and consumers.
#[derive(Clone, Default)]
pub struct MemoryEventBus {
    topics: Arc<DashMap<String, Arc<Topic>>>,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn topic(&self, name: &str) -> Arc<Topic> {
        self.topics
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Binds a consumer to one topic.
    pub fn consumer(&self, topic: &str) -> MemoryEventConsumer {
        MemoryEventConsumer {
            topic: self.topic(topic),
        }
    }

    /// Number of messages neither consumed nor pending ack.
    pub async fn queued_len(&self, topic: &str) -> usize {
        self.topic(topic).queue.lock().await.len()
    }

    /// Number of delivered-but-unacked messages.
    pub async fn pending_len(&self, topic: &str) -> usize {
        self.topic(topic).pending.lock().await.len()
    }

    /// Requeue every unacked delivery, oldest first. This is the broker
    /// redelivery path that tests drive explicitly.
    pub async fn redeliver_unacked(&self, topic: &str) -> usize {
        let topic = self.topic(topic);
        let mut pending = topic.pending.lock().await;
        let mut redelivered: Vec<Delivery> = pending.drain().map(|(_, d)| d).collect();
        drop(pending);

        redelivered.sort_by(|a, b| a.id.cmp(&b.id));
        let count = redelivered.len();

        let mut queue = topic.queue.lock().await;
        for delivery in redelivered.into_iter().rev() {
            queue.push_front(delivery);
        }
        count
    }
}

#[async_trait]
impl EventPublisher for MemoryEventBus {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BusError> {
        let topic = self.topic(topic);
        let id = topic.seq.fetch_add(1, Ordering::Relaxed);

        topic.queue.lock().await.push_back(Delivery {
            id: format!("{:020}", id),
            key: key.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

/// Consumer over one in-memory topic.
pub struct MemoryEventConsumer {
    topic: Arc<Topic>,
}

#[async_trait]
impl EventConsumer for MemoryEventConsumer {
    async fn next(&self) -> Result<Option<Delivery>, BusError> {
        let delivery = self.topic.queue.lock().await.pop_front();
        if let Some(delivery) = delivery {
            self.topic
                .pending
                .lock()
                .await
                .insert(delivery.id.clone(), delivery.clone());
            Ok(Some(delivery))
        } else {
            Ok(None)
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), BusError> {
        self.topic.pending.lock().await.remove(&delivery.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unacked_deliveries_are_redelivered_in_order() {
        let bus = MemoryEventBus::new();
        bus.publish("t", "1", b"a").await.unwrap();
        bus.publish("t", "1", b"b").await.unwrap();

        let consumer = bus.consumer("t");
        let first = consumer.next().await.unwrap().unwrap();
        let second = consumer.next().await.unwrap().unwrap();
        consumer.ack(&second).await.unwrap();

        assert_eq!(bus.redeliver_unacked("t").await, 1);
        let again = consumer.next().await.unwrap().unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.payload, b"a");
    }

    #[tokio::test]
    async fn idle_topic_returns_none() {
        let bus = MemoryEventBus::new();
        let consumer = bus.consumer("empty");
        assert!(consumer.next().await.unwrap().is_none());
    }
}
