//! Notification store backed by PostgreSQL via diesel-async.
//!
//! The conditional transition is a single filtered UPDATE with RETURNING, so
//! compare-and-swap semantics come from the database row lock rather than a
//! read-then-write sequence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::models::{
    NewNotification, Notification, NotificationStatus, NotificationSummary, TransitionChangeset,
};
use crate::repositories::{NotificationStore, ensure_transition_allowed};

/// PostgreSQL-backed notification store.
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: AsyncDbPool,
}

impl PgNotificationStore {
    /// Creates a new store with the given connection pool.
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    async fn conn(
        &self,
    ) -> AppResult<
        diesel_async::pooled_connection::bb8::PooledConnection<
            '_,
            diesel_async::AsyncPgConnection,
        >,
    > {
        self.pool.get().await.map_err(|e| AppError::ConnectionPool {
            source: anyhow::Error::from(e),
        })
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn upsert_pending(&self, new: NewNotification) -> AppResult<Notification> {
        use crate::schema::notifications::dsl::*;
        let mut conn = self.conn().await?;

        diesel::insert_into(notifications)
            .values(&new)
            .on_conflict(job_id)
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(AppError::from)?;

        notifications
            .filter(job_id.eq(new.job_id))
            .select(Notification::as_select())
            .first(&mut conn)
            .await
            .map_err(AppError::from)
    }

    async fn find_by_job_id(&self, jid: i64) -> AppResult<Option<Notification>> {
        use crate::schema::notifications::dsl::*;
        let mut conn = self.conn().await?;

        notifications
            .filter(job_id.eq(jid))
            .select(Notification::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(AppError::from)
    }

    async fn list_summaries(&self) -> AppResult<Vec<NotificationSummary>> {
        use crate::schema::notifications::dsl::*;
        let mut conn = self.conn().await?;

        notifications
            .order(created_at.desc())
            .select(NotificationSummary::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }

    async fn find_summaries_by_ids(
        &self,
        job_ids: &[i64],
    ) -> AppResult<Vec<NotificationSummary>> {
        use crate::schema::notifications::dsl::*;

        if job_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn().await?;
        notifications
            .filter(job_id.eq_any(job_ids))
            .order(application_deadline.asc())
            .select(NotificationSummary::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }

    async fn transition(
        &self,
        jid: i64,
        from: NotificationStatus,
        to: NotificationStatus,
        changes: TransitionChangeset,
    ) -> AppResult<Option<Notification>> {
        use crate::schema::notifications::dsl::*;

        ensure_transition_allowed(from, to)?;
        let mut conn = self.conn().await?;

        diesel::update(notifications.filter(job_id.eq(jid)).filter(status.eq(from)))
            .set((status.eq(to), changes))
            .returning(Notification::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(AppError::from)
    }

    async fn find_approved_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>> {
        use crate::schema::notifications::dsl::*;
        let mut conn = self.conn().await?;

        notifications
            .filter(status.eq(NotificationStatus::Approved))
            .filter(approved_at.le(cutoff))
            .order(approved_at.asc())
            .select(Notification::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }
}
