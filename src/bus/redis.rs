//! Redis Streams bus implementation using bb8 connection pool.
//!
//! Publishing is XADD with `key`/`payload` fields. Consuming uses one
//! consumer group per deployment: a consumer first drains its own pending
//! backlog (entries delivered before a crash but never XACKed), then blocks
//! on new entries. XACK is the offset commit.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client, RedisError};

use crate::bus::{BusError, Delivery, EventConsumer, EventPublisher};
use crate::config::settings::RedisBusConfig;

type RedisPool = Pool<Client>;

async fn build_pool(config: &RedisBusConfig) -> Result<RedisPool, BusError> {
    let client =
        Client::open(config.url.as_str()).map_err(|e| BusError::Connection(e.to_string()))?;

    Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(std::time::Duration::from_secs(config.connection_timeout))
        .build(client)
        .await
        .map_err(|e| BusError::Connection(e.to_string()))
}

/// Redis Streams publisher.
pub struct RedisEventPublisher {
    pool: RedisPool,
}

impl RedisEventPublisher {
    pub async fn new(config: &RedisBusConfig) -> Result<Self, BusError> {
        Ok(Self {
            pool: build_pool(config).await?,
        })
    }

    async fn get_conn(&self) -> Result<PooledConnection<'_, Client>, BusError> {
        self.pool
            .get()
            .await
            .map_err(|e| BusError::Connection(e.to_string()))
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BusError> {
        let mut conn = self.get_conn().await?;

        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref
            .xadd::<_, _, _, _, ()>(topic, "*", &[("key", key.as_bytes()), ("payload", payload)])
            .await
            .map_err(|e: RedisError| BusError::Operation(e.to_string()))
    }
}

/// Redis Streams consumer bound to one stream and consumer group.
pub struct RedisEventConsumer {
    pool: RedisPool,
    stream: String,
    group: String,
    consumer: String,
    block_millis: u64,
    backlog_drained: AtomicBool,
}

impl RedisEventConsumer {
    /// Creates the consumer and ensures the group exists on the stream.
    pub async fn new(
        config: &RedisBusConfig,
        stream: &str,
        group: &str,
        consumer: &str,
    ) -> Result<Self, BusError> {
        let pool = build_pool(config).await?;

        {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| BusError::Connection(e.to_string()))?;
            let conn_ref: &mut MultiplexedConnection = &mut conn;
            let created: Result<(), RedisError> = conn_ref
                .xgroup_create_mkstream(stream, group, "0")
                .await;
            if let Err(e) = created {
                // BUSYGROUP means the group already exists, which is fine.
                if !e.to_string().contains("BUSYGROUP") {
                    return Err(BusError::Connection(e.to_string()));
                }
            }
        }

        Ok(Self {
            pool,
            stream: stream.to_string(),
            group: group.to_string(),
            consumer: consumer.to_string(),
            block_millis: config.block_millis,
            backlog_drained: AtomicBool::new(false),
        })
    }

    async fn get_conn(&self) -> Result<PooledConnection<'_, Client>, BusError> {
        self.pool
            .get()
            .await
            .map_err(|e| BusError::Connection(e.to_string()))
    }

    async fn read_one(&self, start_id: &str, block: bool) -> Result<Option<Delivery>, BusError> {
        let mut conn = self.get_conn().await?;

        let mut options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(1);
        if block {
            options = options.block(self.block_millis as usize);
        }

        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let reply: StreamReadReply = conn_ref
            .xread_options(&[self.stream.as_str()], &[start_id], &options)
            .await
            .map_err(|e: RedisError| BusError::Operation(e.to_string()))?;

        for stream_key in reply.keys {
            for entry in stream_key.ids {
                return delivery_from_entry(entry.id, entry.map).map(Some);
            }
        }

        Ok(None)
    }
}

/// Decodes one stream entry into a delivery. `from_redis_value` consumes its
/// argument, so the fields are taken out of the map by value.
fn delivery_from_entry(
    id: String,
    mut fields: std::collections::HashMap<String, redis::Value>,
) -> Result<Delivery, BusError> {
    let key: String = fields
        .remove("key")
        .and_then(|v| redis::from_redis_value(v).ok())
        .unwrap_or_default();
    let payload: Vec<u8> = fields
        .remove("payload")
        .and_then(|v| redis::from_redis_value(v).ok())
        .ok_or_else(|| BusError::Decode(format!("entry {} has no payload field", id)))?;

    Ok(Delivery { id, key, payload })
}

#[async_trait]
impl EventConsumer for RedisEventConsumer {
    async fn next(&self) -> Result<Option<Delivery>, BusError> {
        // Drain this consumer's pending backlog before asking for new
        // entries; those are deliveries from a previous run that were never
        // acked.
        if !self.backlog_drained.load(Ordering::Acquire) {
            if let Some(delivery) = self.read_one("0", false).await? {
                return Ok(Some(delivery));
            }
            self.backlog_drained.store(true, Ordering::Release);
        }

        self.read_one(">", true).await
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), BusError> {
        let mut conn = self.get_conn().await?;

        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref
            .xack::<_, _, _, ()>(&self.stream, &self.group, &[delivery.id.as_str()])
            .await
            .map_err(|e: RedisError| BusError::Operation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::Value;
    use std::collections::HashMap;

    fn entry(fields: &[(&str, &[u8])]) -> HashMap<String, Value> {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), Value::BulkString(v.to_vec())))
            .collect()
    }

    #[test]
    fn entry_fields_decode_into_a_delivery() {
        let fields = entry(&[
            ("key", b"101".as_slice()),
            ("payload", b"{\"jobId\":101}".as_slice()),
        ]);
        let delivery = delivery_from_entry("1-0".to_string(), fields).unwrap();

        assert_eq!(delivery.id, "1-0");
        assert_eq!(delivery.key, "101");
        assert_eq!(delivery.payload, b"{\"jobId\":101}");
    }

    #[test]
    fn entry_without_payload_is_a_decode_error() {
        let err = delivery_from_entry("1-0".to_string(), entry(&[("key", b"101".as_slice())]))
            .unwrap_err();
        assert!(matches!(err, BusError::Decode(_)));
    }

    #[test]
    fn missing_key_field_defaults_to_empty() {
        let delivery =
            delivery_from_entry("2-0".to_string(), entry(&[("payload", b"x".as_slice())]))
                .unwrap();
        assert_eq!(delivery.key, "");
    }
}
