//! In-memory visibility cache.
//!
//! Same pruning semantics as the Redis backend, over a per-student map of
//! job id to expiry score.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::cache::{CacheError, VisibilityCache};

/// DashMap-backed visibility cache keyed by student id.
#[derive(Default)]
pub struct MemoryVisibilityCache {
    entries: DashMap<String, HashMap<i64, i64>>,
}

impl MemoryVisibilityCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VisibilityCache for MemoryVisibilityCache {
    async fn add_job(
        &self,
        student_id: &str,
        job_id: i64,
        expires_at: i64,
    ) -> Result<(), CacheError> {
        self.entries
            .entry(student_id.to_string())
            .or_default()
            .insert(job_id, expires_at);
        Ok(())
    }

    async fn active_jobs(&self, student_id: &str, now: i64) -> Result<Vec<i64>, CacheError> {
        let Some(mut entry) = self.entries.get_mut(student_id) else {
            return Ok(Vec::new());
        };

        entry.retain(|_, score| *score >= now);

        let mut jobs: Vec<(i64, i64)> = entry.iter().map(|(id, score)| (*id, *score)).collect();
        // Stable order for callers: soonest deadline first.
        jobs.sort_by_key(|(id, score)| (*score, *id));
        Ok(jobs.into_iter().map(|(id, _)| id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prunes_expired_pairs_on_read() {
        let cache = MemoryVisibilityCache::new();
        cache.add_job("S1", 1, 100).await.unwrap();
        cache.add_job("S1", 2, 200).await.unwrap();

        assert_eq!(cache.active_jobs("S1", 150).await.unwrap(), vec![2]);
        // Pruning is permanent; winding the clock back does not resurrect.
        assert_eq!(cache.active_jobs("S1", 50).await.unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn unknown_student_yields_empty() {
        let cache = MemoryVisibilityCache::new();
        assert!(cache.active_jobs("nobody", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn re_adding_refreshes_score() {
        let cache = MemoryVisibilityCache::new();
        cache.add_job("S1", 1, 100).await.unwrap();
        cache.add_job("S1", 1, 300).await.unwrap();
        assert_eq!(cache.active_jobs("S1", 200).await.unwrap(), vec![1]);
    }
}
