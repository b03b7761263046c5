//! Redis visibility cache implementation using bb8 connection pool.
//!
//! One sorted set per student (`{prefix}:student:{id}:jobs`), member = job id,
//! score = application deadline in epoch seconds. Reads prune expired members
//! with ZREMRANGEBYSCORE before the ZRANGEBYSCORE.

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError};

use crate::cache::{CacheError, VisibilityCache};
use crate::config::settings::RedisCacheConfig;

type RedisPool = Pool<Client>;

/// Redis-based visibility cache with bb8 connection pool.
pub struct RedisVisibilityCache {
    pool: RedisPool,
    key_prefix: String,
}

impl RedisVisibilityCache {
    pub async fn new(config: &RedisCacheConfig) -> Result<Self, CacheError> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| CacheError::Connection(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(std::time::Duration::from_secs(config.connection_timeout))
            .build(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn student_key(&self, student_id: &str) -> String {
        format!("{}:student:{}:jobs", self.key_prefix, student_id)
    }

    async fn get_conn(&self) -> Result<PooledConnection<'_, Client>, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

#[async_trait]
impl VisibilityCache for RedisVisibilityCache {
    async fn add_job(
        &self,
        student_id: &str,
        job_id: i64,
        expires_at: i64,
    ) -> Result<(), CacheError> {
        let mut conn = self.get_conn().await?;
        let key = self.student_key(student_id);

        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref
            .zadd::<_, _, _, ()>(&key, job_id.to_string(), expires_at)
            .await
            .map_err(|e: RedisError| CacheError::Operation(e.to_string()))
    }

    async fn active_jobs(&self, student_id: &str, now: i64) -> Result<Vec<i64>, CacheError> {
        let mut conn = self.get_conn().await?;
        let key = self.student_key(student_id);

        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref
            .zrembyscore::<_, _, _, ()>(&key, "-inf", now - 1)
            .await
            .map_err(|e: RedisError| CacheError::Operation(e.to_string()))?;

        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let members: Vec<String> = conn_ref
            .zrangebyscore(&key, now, "+inf")
            .await
            .map_err(|e: RedisError| CacheError::Operation(e.to_string()))?;

        Ok(members
            .into_iter()
            .filter_map(|m| m.parse::<i64>().ok())
            .collect())
    }
}
