//! Email send capability.
//!
//! The fan-out pipeline treats mail as a single `send` capability; the
//! production backend talks to the ZeptoMail transactional-mail HTTP API,
//! the recording backend captures sends for tests and dry runs.

mod recording;
mod zepto;

pub use recording::RecordingEmailSender;
pub use zepto::ZeptoEmailSender;

use async_trait::async_trait;

use crate::error::AppResult;

/// One attachment, already fetched from the blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// One outbound email to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub to_name: String,
    pub subject: String,
    /// Plain text; providers that need HTML wrap it themselves.
    pub body: String,
    pub attachments: Vec<EmailAttachment>,
}

/// Trait for email senders. A send failure propagates to the fan-out
/// pipeline, which withholds the ack so the event is redelivered; the sender
/// is therefore on the hot path of at-least-once retry.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> AppResult<()>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}
