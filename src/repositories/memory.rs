//! In-memory notification store.
//!
//! Backs local development and the integration tests. The conditional
//! transition mutates under the map's shard lock, which gives it the same
//! exactly-one-winner semantics as the filtered UPDATE in the Postgres
//! backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::AppResult;
use crate::models::{
    NewNotification, Notification, NotificationStatus, NotificationSummary, TransitionChangeset,
};
use crate::repositories::{NotificationStore, ensure_transition_allowed};

/// DashMap-backed notification store keyed by job id.
#[derive(Default)]
pub struct MemoryNotificationStore {
    records: DashMap<i64, Notification>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn materialize(new: NewNotification) -> Notification {
    Notification {
        job_id: new.job_id,
        company_name: new.company_name,
        criteria: new.criteria,
        eligible_students: new.eligible_students,
        eligible_count: new.eligible_count,
        application_deadline: new.application_deadline,
        status: new.status,
        admin_message: None,
        admin_message_text_file: None,
        attachments: None,
        created_at: new.created_at,
        approved_at: None,
        rejected_at: None,
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn upsert_pending(&self, new: NewNotification) -> AppResult<Notification> {
        let record = self
            .records
            .entry(new.job_id)
            .or_insert_with(|| materialize(new))
            .clone();
        Ok(record)
    }

    async fn find_by_job_id(&self, job_id: i64) -> AppResult<Option<Notification>> {
        Ok(self.records.get(&job_id).map(|r| r.clone()))
    }

    async fn list_summaries(&self) -> AppResult<Vec<NotificationSummary>> {
        let mut summaries: Vec<NotificationSummary> = self
            .records
            .iter()
            .map(|entry| NotificationSummary::from(entry.value()))
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn find_summaries_by_ids(
        &self,
        job_ids: &[i64],
    ) -> AppResult<Vec<NotificationSummary>> {
        let mut summaries: Vec<NotificationSummary> = job_ids
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(|entry| NotificationSummary::from(entry.value()))
            .collect();
        summaries.sort_by(|a, b| a.application_deadline.cmp(&b.application_deadline));
        Ok(summaries)
    }

    async fn transition(
        &self,
        job_id: i64,
        from: NotificationStatus,
        to: NotificationStatus,
        changes: TransitionChangeset,
    ) -> AppResult<Option<Notification>> {
        ensure_transition_allowed(from, to)?;

        // get_mut holds the shard lock for the compare + mutate.
        let Some(mut entry) = self.records.get_mut(&job_id) else {
            return Ok(None);
        };
        if entry.status != from {
            return Ok(None);
        }

        entry.status = to;
        if let Some(message) = changes.admin_message {
            entry.admin_message = Some(message);
        }
        if let Some(path) = changes.admin_message_text_file {
            entry.admin_message_text_file = Some(path);
        }
        if let Some(paths) = changes.attachments {
            entry.attachments = Some(paths);
        }
        if let Some(at) = changes.approved_at {
            entry.approved_at = Some(at);
        }
        if let Some(at) = changes.rejected_at {
            entry.rejected_at = Some(at);
        }

        Ok(Some(entry.clone()))
    }

    async fn find_approved_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>> {
        let mut stuck: Vec<Notification> = self
            .records
            .iter()
            .filter(|entry| {
                entry.status == NotificationStatus::Approved
                    && entry.approved_at.is_some_and(|at| at <= cutoff)
            })
            .map(|entry| entry.clone())
            .collect();
        stuck.sort_by_key(|n| n.approved_at);
        Ok(stuck)
    }
}
