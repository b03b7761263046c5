//! VisibilityCache trait definition.

use async_trait::async_trait;

use crate::cache::CacheError;

/// Trait for the per-student visibility index.
///
/// All cache backends must implement this trait to provide a unified
/// interface. Scores are application deadlines as epoch seconds.
#[async_trait]
pub trait VisibilityCache: Send + Sync {
    /// Record that `job_id` is open for `student_id` until `expires_at`
    /// (epoch seconds). Re-adding an existing pair just refreshes the score.
    async fn add_job(
        &self,
        student_id: &str,
        job_id: i64,
        expires_at: i64,
    ) -> Result<(), CacheError>;

    /// Prune every pair whose score is strictly before `now`, then return
    /// the surviving job ids. Unknown students yield an empty list.
    async fn active_jobs(&self, student_id: &str, now: i64) -> Result<Vec<i64>, CacheError>;
}
