//! Fan-out pipeline: one send event in, one delivered email out.
//!
//! The ack is withheld until the provider accepts the mail, so a crash or a
//! provider outage results in redelivery of the affected students only.
//! There is no delivery ledger; a redelivered event produces a duplicate
//! email, which is the accepted cost of at-least-once.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::blob::{self, BlobStore};
use crate::bus::{Delivery, EventConsumer};
use crate::email::{EmailAttachment, EmailSender, OutboundEmail};
use crate::error::{AppError, AppResult};
use crate::models::SendEmailEvent;

const READ_ERROR_BACKOFF: std::time::Duration = std::time::Duration::from_secs(1);

/// Pause after an empty read; the in-memory consumer does not block.
const IDLE_BACKOFF: std::time::Duration = std::time::Duration::from_millis(50);

pub struct FanoutPipeline {
    consumer: Arc<dyn EventConsumer>,
    blobs: Arc<dyn BlobStore>,
    sender: Arc<dyn EmailSender>,
}

impl FanoutPipeline {
    pub fn new(
        consumer: Arc<dyn EventConsumer>,
        blobs: Arc<dyn BlobStore>,
        sender: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            consumer,
            blobs,
            sender,
        }
    }

    /// Runs until the token is cancelled.
    pub async fn run(self, token: CancellationToken) {
        info!(provider = self.sender.name(), "fan-out pipeline started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                next = self.consumer.next() => match next {
                    Ok(Some(delivery)) => self.handle_delivery(&delivery).await,
                    Ok(None) => {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = tokio::time::sleep(IDLE_BACKOFF) => {}
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "fan-out read failed");
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = tokio::time::sleep(READ_ERROR_BACKOFF) => {}
                        }
                    }
                }
            }
        }

        info!("fan-out pipeline stopped");
    }

    /// Processes one delivery, acking on success and on terminal failures.
    pub async fn handle_delivery(&self, delivery: &Delivery) {
        let event: SendEmailEvent = match serde_json::from_slice(&delivery.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(delivery_id = %delivery.id, error = %e, "dropping malformed send event");
                self.ack(delivery).await;
                return;
            }
        };

        match self.send_one(&event).await {
            Ok(()) => {
                info!(
                    job_id = event.job_id,
                    recipient = %event.student_email,
                    "notification email sent"
                );
                self.ack(delivery).await;
            }
            Err(e) if e.is_terminal_for_message() => {
                // A missing body blob cannot be fixed by retrying.
                warn!(
                    job_id = event.job_id,
                    recipient = %event.student_email,
                    error = %e,
                    "dropping unsendable send event"
                );
                self.ack(delivery).await;
            }
            Err(e) => {
                warn!(
                    job_id = event.job_id,
                    recipient = %event.student_email,
                    error = %e,
                    "email send failed; delivery will be retried"
                );
            }
        }
    }

    async fn send_one(&self, event: &SendEmailEvent) -> AppResult<()> {
        let body_bytes = self.blobs.get(&event.email_body_path).await?;
        let body = String::from_utf8_lossy(&body_bytes).into_owned();

        let mut attachments = Vec::with_capacity(event.attachments.len());
        for path in &event.attachments {
            attachments.push(self.fetch_attachment(path).await?);
        }

        let email = OutboundEmail {
            to: event.student_email.clone(),
            to_name: event.student_name.clone(),
            subject: event.subject(),
            body,
            attachments,
        };

        self.sender.send(&email).await
    }

    async fn fetch_attachment(&self, path: &str) -> Result<EmailAttachment, AppError> {
        let content = self.blobs.get(path).await?;
        let stat = self.blobs.stat(path).await?;
        let file_name = blob::paths::attachment_file_name(path)?;

        Ok(EmailAttachment {
            file_name,
            content_type: stat.content_type,
            content,
        })
    }

    async fn ack(&self, delivery: &Delivery) {
        if let Err(e) = self.consumer.ack(delivery).await {
            warn!(delivery_id = %delivery.id, error = %e, "ack failed");
        }
    }
}
