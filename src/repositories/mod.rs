//! Repository layer for the durable notification store.
//!
//! `NotificationStore` is the single write/read port over the one-row-per-job
//! record. The conditional `transition` is the concurrency guard for the
//! whole system: it performs exactly one filtered update keyed on the current
//! status, so of any number of concurrent approve/reject commands exactly one
//! observes a match.

mod memory;
mod notification_repo;

pub use memory::MemoryNotificationStore;
pub use notification_repo::PgNotificationStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::models::{
    NewNotification, Notification, NotificationStatus, NotificationSummary, TransitionChangeset,
};

/// Durable record store, one notification per job identifier.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert-if-absent keyed on `job_id`. A duplicate delivery of an
    /// already-known job is a silent no-op; the stored record is returned
    /// either way. This is what makes intake redelivery safe.
    async fn upsert_pending(&self, new: NewNotification) -> AppResult<Notification>;

    async fn find_by_job_id(&self, job_id: i64) -> AppResult<Option<Notification>>;

    /// All notification summaries, newest first.
    async fn list_summaries(&self) -> AppResult<Vec<NotificationSummary>>;

    /// Summaries for the given jobs, sorted by ascending deadline.
    async fn find_summaries_by_ids(&self, job_ids: &[i64])
    -> AppResult<Vec<NotificationSummary>>;

    /// The conditional status transition: one update filtered on
    /// `job_id AND status = from`, applying `changes` and the new status
    /// atomically. Returns `None` when the filter matched nothing, i.e. the
    /// record is missing or a concurrent command already moved it on.
    async fn transition(
        &self,
        job_id: i64,
        from: NotificationStatus,
        to: NotificationStatus,
        changes: TransitionChangeset,
    ) -> AppResult<Option<Notification>>;

    /// `APPROVED` records whose approval is older than `cutoff`; these never
    /// reached `SENT` and are candidates for the reconciler sweep.
    async fn find_approved_older_than(&self, cutoff: DateTime<Utc>)
    -> AppResult<Vec<Notification>>;
}

/// Rejects edges not present in the transition table before any store work.
pub(crate) fn ensure_transition_allowed(
    from: NotificationStatus,
    to: NotificationStatus,
) -> AppResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(AppError::Internal {
            source: anyhow::anyhow!("illegal status transition {} -> {}", from, to),
        })
    }
}
