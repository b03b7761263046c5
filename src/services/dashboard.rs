//! Dashboard service for the student read path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::VisibilityCache;
use crate::error::AppResult;
use crate::models::NotificationSummary;
use crate::repositories::NotificationStore;

/// What one student sees: the open jobs still inside their deadline,
/// resolved against the durable store.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub student_id: String,
    pub as_of: DateTime<Utc>,
    pub active_job_ids: Vec<i64>,
    /// Summaries in ascending deadline order, soonest first.
    pub jobs: Vec<NotificationSummary>,
}

/// Dashboard service answering "which jobs are open for this student".
#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn NotificationStore>,
    cache: Arc<dyn VisibilityCache>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn NotificationStore>, cache: Arc<dyn VisibilityCache>) -> Self {
        Self { store, cache }
    }

    /// Prunes the student's expired cache entries, then resolves the
    /// surviving job ids to summaries. A job present in the cache but
    /// missing from the store is dropped silently; the cache is advisory.
    pub async fn snapshot(&self, student_id: &str) -> AppResult<DashboardSnapshot> {
        let as_of = Utc::now();
        let active_job_ids = self.cache.active_jobs(student_id, as_of.timestamp()).await?;

        let jobs = if active_job_ids.is_empty() {
            Vec::new()
        } else {
            self.store.find_summaries_by_ids(&active_job_ids).await?
        };

        Ok(DashboardSnapshot {
            student_id: student_id.to_string(),
            as_of,
            active_job_ids,
            jobs,
        })
    }
}
