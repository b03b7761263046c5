//! Recording email sender.
//!
//! Captures every send instead of talking to a mail API. Tests use the
//! failure injection to exercise the at-least-once retry path.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::email::{EmailSender, OutboundEmail};
use crate::error::{AppError, AppResult};

/// Sender that records emails in memory.
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<OutboundEmail>>,
    failing_recipients: Mutex<HashSet<String>>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every email sent so far, in order.
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("sender lock poisoned").clone()
    }

    /// Makes sends to `recipient` fail until cleared.
    pub fn fail_for(&self, recipient: &str) {
        self.failing_recipients
            .lock()
            .expect("sender lock poisoned")
            .insert(recipient.to_string());
    }

    /// Clears an injected failure.
    pub fn recover(&self, recipient: &str) {
        self.failing_recipients
            .lock()
            .expect("sender lock poisoned")
            .remove(recipient);
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, email: &OutboundEmail) -> AppResult<()> {
        let failing = self
            .failing_recipients
            .lock()
            .expect("sender lock poisoned")
            .contains(&email.to);
        if failing {
            return Err(AppError::Upstream {
                system: "email",
                source: anyhow::anyhow!("injected send failure for {}", email.to),
            });
        }

        self.sent
            .lock()
            .expect("sender lock poisoned")
            .push(email.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
