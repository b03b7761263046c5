//! ZeptoMail email sender implementation.
//!
//! Posts one JSON request per email to the transactional-mail API, with
//! attachments base64-encoded inline, matching the payload shape the
//! original consumer sent.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;

use crate::config::settings::EmailConfig;
use crate::email::{EmailSender, OutboundEmail};
use crate::error::{AppError, AppResult};

/// ZeptoMail HTTP API sender.
pub struct ZeptoEmailSender {
    client: reqwest::Client,
    api_url: String,
    token: String,
    from_email: String,
    from_name: String,
}

impl ZeptoEmailSender {
    pub fn new(config: &EmailConfig) -> AppResult<Self> {
        if config.token.is_empty() {
            return Err(AppError::Configuration {
                key: "email.token".to_string(),
                source: anyhow::anyhow!("email.token must be set for the zepto provider"),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            token: config.token.clone(),
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
        })
    }

    fn build_payload(&self, email: &OutboundEmail) -> serde_json::Value {
        let html_body = format!("<div>{}</div>", email.body.replace('\n', "<br>"));

        let mut payload = json!({
            "from": {
                "address": self.from_email,
                "name": self.from_name,
            },
            "to": [{
                "email_address": {
                    "address": email.to,
                    "name": email.to_name,
                }
            }],
            "subject": email.subject,
            "htmlbody": html_body,
        });

        if !email.attachments.is_empty() {
            payload["attachments"] = email
                .attachments
                .iter()
                .map(|att| {
                    json!({
                        "content": BASE64.encode(&att.content),
                        "mime_type": att.content_type,
                        "name": att.file_name,
                    })
                })
                .collect();
        }

        payload
    }
}

#[async_trait]
impl EmailSender for ZeptoEmailSender {
    async fn send(&self, email: &OutboundEmail) -> AppResult<()> {
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", &self.token)
            .json(&self.build_payload(email))
            .send()
            .await
            .map_err(|e| AppError::Upstream {
                system: "email",
                source: anyhow::Error::from(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                system: "email",
                source: anyhow::anyhow!("mail API returned {}: {}", status, body),
            });
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "zepto"
    }
}
