//! Reconciler: periodic sweep for notifications stuck in APPROVED.
//!
//! An approval that crashed between the status transition and the fan-out
//! leaves a record APPROVED with no send events on the wire. The sweep
//! re-runs the fan-out for any APPROVED record older than the grace window
//! and advances it to SENT. Students already emailed may be emailed again;
//! the pipeline is at-least-once end to end.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::settings::ReconcilerConfig;
use crate::services::ApprovalService;

pub struct Reconciler {
    approval: ApprovalService,
    interval: Duration,
    grace: chrono::Duration,
}

impl Reconciler {
    pub fn new(approval: ApprovalService, config: &ReconcilerConfig) -> Self {
        Self {
            approval,
            interval: Duration::from_secs(config.interval_seconds),
            grace: chrono::Duration::seconds(config.grace_seconds as i64),
        }
    }

    /// Runs until the token is cancelled.
    pub async fn run(self, token: CancellationToken) {
        info!(
            interval_seconds = self.interval.as_secs(),
            grace_seconds = self.grace.num_seconds(),
            "reconciler started"
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => self.sweep_once().await,
            }
        }

        info!("reconciler stopped");
    }

    /// One sweep over records stuck in APPROVED past the grace window.
    pub async fn sweep_once(&self) {
        let stuck = match self.approval.find_stuck_approved(self.grace).await {
            Ok(stuck) => stuck,
            Err(e) => {
                warn!(error = %e, "reconciler sweep query failed");
                return;
            }
        };

        if stuck.is_empty() {
            return;
        }

        info!(count = stuck.len(), "reconciling stuck approvals");

        for notification in &stuck {
            match self.approval.republish(notification).await {
                Ok(true) => {
                    info!(job_id = notification.job_id, "stuck approval reconciled");
                }
                Ok(false) => {
                    warn!(
                        job_id = notification.job_id,
                        "stuck approval left for next sweep"
                    );
                }
                Err(e) => {
                    warn!(job_id = notification.job_id, error = %e, "reconcile failed");
                }
            }
        }
    }
}
