//! Approval service for the admin decision flow.
//!
//! Owns the PENDING_APPROVAL -> APPROVED/REJECTED transitions and the
//! approval side effects: blob uploads, visibility-cache population and the
//! per-student send fan-out. The store's conditional transition is the only
//! concurrency guard, so two racing decisions resolve to exactly one winner.

use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use tracing::{info, warn};

use crate::blob::{self, BlobStore};
use crate::bus::EventPublisher;
use crate::cache::VisibilityCache;
use crate::error::{AppError, AppResult};
use crate::models::{
    AttachmentPaths, Notification, NotificationStatus, NotificationSummary, SendEmailEvent,
    TransitionChangeset,
};
use crate::repositories::NotificationStore;

/// One attachment file handed in with an approval.
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Result of a successful approve.
#[derive(Debug)]
pub struct ApprovalOutcome {
    pub notification: Notification,
    pub emails_enqueued: usize,
    pub attachments_uploaded: usize,
}

/// Approval service for handling admin decision business logic.
#[derive(Clone)]
pub struct ApprovalService {
    store: Arc<dyn NotificationStore>,
    cache: Arc<dyn VisibilityCache>,
    publisher: Arc<dyn EventPublisher>,
    blobs: Arc<dyn BlobStore>,
    send_topic: String,
}

impl ApprovalService {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        cache: Arc<dyn VisibilityCache>,
        publisher: Arc<dyn EventPublisher>,
        blobs: Arc<dyn BlobStore>,
        send_topic: String,
    ) -> Self {
        Self {
            store,
            cache,
            publisher,
            blobs,
            send_topic,
        }
    }

    /// Approves a pending notification.
    ///
    /// Uploads the admin message and attachments, applies the conditional
    /// PENDING_APPROVAL -> APPROVED transition, populates the visibility
    /// cache and enqueues one send event per eligible student. When every
    /// send event is enqueued the record is advanced to SENT; otherwise it
    /// stays APPROVED for the reconciler to finish.
    pub async fn approve(
        &self,
        job_id: i64,
        admin_message: &str,
        attachments: Vec<AttachmentUpload>,
    ) -> AppResult<ApprovalOutcome> {
        let current = self
            .store
            .find_by_job_id(job_id)
            .await?
            .ok_or_else(|| AppError::job_not_found(job_id))?;

        match current.status {
            NotificationStatus::PendingApproval => {}
            NotificationStatus::Approved | NotificationStatus::Sent => {
                return Err(AppError::conflict("Job is already approved."));
            }
            NotificationStatus::Rejected => {
                return Err(AppError::conflict("Rejected job cannot be approved."));
            }
        }

        let message = admin_message.trim();

        // Blob uploads happen before the transition so a stored record never
        // references a path that does not exist yet.
        let body_path = if message.is_empty() {
            let path = blob::paths::email_body_path(job_id);
            let body = default_email_body(&current.company_name);
            self.blobs
                .put(&path, body.into_bytes(), "text/plain")
                .await?;
            path
        } else {
            let path = blob::paths::admin_message_path(job_id, "approve");
            self.blobs
                .put(&path, message.as_bytes().to_vec(), "text/plain")
                .await?;
            path
        };

        let attachment_paths = self.upload_attachments(job_id, attachments).await?;

        let changes = TransitionChangeset {
            admin_message: (!message.is_empty()).then(|| message.to_string()),
            admin_message_text_file: (!message.is_empty()).then(|| body_path.clone()),
            attachments: (!attachment_paths.is_empty())
                .then(|| AttachmentPaths(attachment_paths.clone())),
            approved_at: Some(Utc::now()),
            rejected_at: None,
        };

        let approved = self
            .store
            .transition(
                job_id,
                NotificationStatus::PendingApproval,
                NotificationStatus::Approved,
                changes,
            )
            .await?
            .ok_or_else(|| {
                AppError::conflict("Notification is no longer pending approval. Refresh and retry.")
            })?;

        self.populate_cache(&approved).await;

        let enqueued = self
            .publish_send_events(&approved, &body_path, &attachment_paths)
            .await;

        let all_enqueued = enqueued == approved.eligible_students.0.len();
        info!(
            job_id,
            students = approved.eligible_students.0.len(),
            enqueued,
            "notification approved"
        );

        let attachments_uploaded = attachment_paths.len();

        if !all_enqueued {
            // Leave the record APPROVED; the reconciler re-publishes the
            // whole fan-out later.
            return Ok(ApprovalOutcome {
                notification: approved,
                emails_enqueued: enqueued,
                attachments_uploaded,
            });
        }

        let sent = self
            .store
            .transition(
                job_id,
                NotificationStatus::Approved,
                NotificationStatus::Sent,
                TransitionChangeset::default(),
            )
            .await?;

        Ok(ApprovalOutcome {
            notification: sent.unwrap_or(approved),
            emails_enqueued: enqueued,
            attachments_uploaded,
        })
    }

    /// Rejects a pending notification, optionally archiving the admin's
    /// reasoning as a text blob.
    pub async fn reject(&self, job_id: i64, admin_message: &str) -> AppResult<Notification> {
        let current = self
            .store
            .find_by_job_id(job_id)
            .await?
            .ok_or_else(|| AppError::job_not_found(job_id))?;

        match current.status {
            NotificationStatus::PendingApproval => {}
            NotificationStatus::Rejected => {
                return Err(AppError::conflict("Job is already rejected."));
            }
            NotificationStatus::Approved | NotificationStatus::Sent => {
                return Err(AppError::conflict("Approved job cannot be rejected."));
            }
        }

        let message = admin_message.trim();

        let message_path = if message.is_empty() {
            None
        } else {
            let path = blob::paths::admin_message_path(job_id, "reject");
            self.blobs
                .put(&path, message.as_bytes().to_vec(), "text/plain")
                .await?;
            Some(path)
        };

        let changes = TransitionChangeset {
            admin_message: (!message.is_empty()).then(|| message.to_string()),
            admin_message_text_file: message_path,
            attachments: None,
            approved_at: None,
            rejected_at: Some(Utc::now()),
        };

        let rejected = self
            .store
            .transition(
                job_id,
                NotificationStatus::PendingApproval,
                NotificationStatus::Rejected,
                changes,
            )
            .await?
            .ok_or_else(|| {
                AppError::conflict("Notification is no longer pending approval. Refresh and retry.")
            })?;

        info!(job_id, "notification rejected");

        Ok(rejected)
    }

    /// Gets one notification by job id.
    pub async fn get_by_job_id(&self, job_id: i64) -> AppResult<Notification> {
        self.store
            .find_by_job_id(job_id)
            .await?
            .ok_or_else(|| AppError::job_not_found(job_id))
    }

    /// Lists all notification summaries, newest first.
    pub async fn list_summaries(&self) -> AppResult<Vec<NotificationSummary>> {
        self.store.list_summaries().await
    }

    /// APPROVED records older than `grace` whose fan-out never completed.
    pub async fn find_stuck_approved(
        &self,
        grace: chrono::Duration,
    ) -> AppResult<Vec<Notification>> {
        self.store.find_approved_older_than(Utc::now() - grace).await
    }

    /// Re-runs the fan-out for a record stuck in APPROVED and advances it to
    /// SENT once every event is enqueued. Used by the reconciler sweep.
    pub async fn republish(&self, notification: &Notification) -> AppResult<bool> {
        let body_path = match notification.admin_message_text_file {
            Some(ref path) => path.clone(),
            None => {
                // The original body blob is unrecoverable without the record
                // pointing at it; write a fresh default body.
                let path = blob::paths::email_body_path(notification.job_id);
                let body = default_email_body(&notification.company_name);
                self.blobs
                    .put(&path, body.into_bytes(), "text/plain")
                    .await?;
                path
            }
        };
        let attachment_paths = notification
            .attachments
            .as_ref()
            .map(|a| a.0.clone())
            .unwrap_or_default();

        let enqueued = self
            .publish_send_events(notification, &body_path, &attachment_paths)
            .await;
        if enqueued < notification.eligible_students.0.len() {
            return Ok(false);
        }

        let sent = self
            .store
            .transition(
                notification.job_id,
                NotificationStatus::Approved,
                NotificationStatus::Sent,
                TransitionChangeset::default(),
            )
            .await?;

        Ok(sent.is_some())
    }

    async fn upload_attachments(
        &self,
        job_id: i64,
        attachments: Vec<AttachmentUpload>,
    ) -> AppResult<Vec<String>> {
        let uploads = attachments.into_iter().map(|attachment| {
            let path = blob::paths::attachment_path(job_id, &attachment.file_name);
            async move {
                self.blobs
                    .put(&path, attachment.bytes, &attachment.content_type)
                    .await?;
                Ok::<String, AppError>(path)
            }
        });

        try_join_all(uploads).await
    }

    /// Cache writes are advisory; a failed write only delays dashboard
    /// visibility and never blocks the approval.
    async fn populate_cache(&self, notification: &Notification) {
        let expires_at = notification.deadline_epoch_seconds();
        for student in &notification.eligible_students.0 {
            if let Err(e) = self
                .cache
                .add_job(&student.student_id, notification.job_id, expires_at)
                .await
            {
                warn!(
                    job_id = notification.job_id,
                    student_id = %student.student_id,
                    error = %e,
                    "failed to populate visibility cache"
                );
            }
        }
    }

    /// Publishes one send event per eligible student, keyed by job id.
    /// Returns how many were enqueued; failures are logged and skipped.
    async fn publish_send_events(
        &self,
        notification: &Notification,
        body_path: &str,
        attachment_paths: &[String],
    ) -> usize {
        let key = notification.job_id.to_string();
        let mut enqueued = 0;

        for student in &notification.eligible_students.0 {
            let event = SendEmailEvent {
                job_id: notification.job_id,
                company_name: notification.company_name.clone(),
                student_name: student.full_name.clone(),
                student_email: student.email.clone(),
                email_body_path: body_path.to_string(),
                email_body_bucket: self.blobs.bucket().to_string(),
                attachments: attachment_paths.to_vec(),
            };

            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(job_id = notification.job_id, error = %e, "failed to encode send event");
                    continue;
                }
            };

            match self.publisher.publish(&self.send_topic, &key, &payload).await {
                Ok(()) => enqueued += 1,
                Err(e) => {
                    warn!(
                        job_id = notification.job_id,
                        student_id = %student.student_id,
                        error = %e,
                        "failed to enqueue send event"
                    );
                }
            }
        }

        enqueued
    }
}

fn default_email_body(company_name: &str) -> String {
    format!(
        "A new placement opportunity from {} is open for applications. \
         Please check the placement portal for details and apply before the deadline.",
        company_name
    )
}
