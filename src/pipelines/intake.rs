//! Intake pipeline: pending events from upstream into the durable store.
//!
//! Every decoded event lands via the insert-if-absent upsert, and the
//! delivery is only acked after the store confirms the write. Malformed
//! payloads are acked immediately and dropped; retrying them cannot help.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::{Delivery, EventConsumer};
use crate::models::parse_pending_event;
use crate::repositories::NotificationStore;

/// How long to back off after a broker read error.
const READ_ERROR_BACKOFF: std::time::Duration = std::time::Duration::from_secs(1);

/// How long to wait after an empty read. The Redis consumer already blocks
/// server-side, but the in-memory consumer returns immediately; without this
/// pause an idle topic spins the loop hot.
const IDLE_BACKOFF: std::time::Duration = std::time::Duration::from_millis(50);

pub struct IntakePipeline {
    consumer: Arc<dyn EventConsumer>,
    store: Arc<dyn NotificationStore>,
}

impl IntakePipeline {
    pub fn new(consumer: Arc<dyn EventConsumer>, store: Arc<dyn NotificationStore>) -> Self {
        Self { consumer, store }
    }

    /// Runs until the token is cancelled.
    pub async fn run(self, token: CancellationToken) {
        info!("intake pipeline started");

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
                        warn!(error = %e, "intake read failed");
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = tokio::time::sleep(READ_ERROR_BACKOFF) => {}
                        }
                    }
                }
            }
        }

        info!("intake pipeline stopped");
    }

    /// Processes one delivery. Never returns an error; the ack decision is
    /// the only outcome that matters.
    pub async fn handle_delivery(&self, delivery: &Delivery) {
        let event = match parse_pending_event(&delivery.payload) {
            Ok(event) => event,
            Err(reasons) => {
                // Poison message; ack so it never comes back.
                warn!(
                    delivery_id = %delivery.id,
                    reasons = ?reasons,
                    "dropping malformed pending event"
                );
                self.ack(delivery).await;
                return;
            }
        };

        let job_id = event.job_id;

        match self
            .store
            .upsert_pending(event.into_new_notification(Utc::now()))
            .await
        {
            Ok(notification) => {
                debug!(
                    job_id,
                    status = %notification.status,
                    "pending notification stored"
                );
                self.ack(delivery).await;
            }
            Err(e) if e.is_terminal_for_message() => {
                warn!(job_id, error = %e, "dropping unstorable pending event");
                self.ack(delivery).await;
            }
            Err(e) => {
                // Withhold the ack; the broker redelivers and the upsert is
                // idempotent on replay.
                error!(job_id, error = %e, "failed to store pending notification");
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) {
        if let Err(e) = self.consumer.ack(delivery).await {
            warn!(delivery_id = %delivery.id, error = %e, "ack failed");
        }
    }
}
