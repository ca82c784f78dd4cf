//! Mailer adapters for the core `Mailer` port.

use async_trait::async_trait;

use formsmith_core::error::FormsmithError;
use formsmith_core::ports::{Mailer, Result};

/// POSTs mail as JSON to a configured webhook (transactional mail
/// bridges and test harnesses alike accept this shape).
pub struct WebhookMailer {
    client: reqwest::Client,
    url: String,
}

impl WebhookMailer {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "to": to,
                "subject": subject,
                "body": body,
            }))
            .send()
            .await
            .map_err(|e| FormsmithError::Internal(anyhow::anyhow!("mail webhook failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(FormsmithError::Internal(anyhow::anyhow!(
                "mail webhook returned {}",
                resp.status()
            )));
        }
        tracing::debug!(%to, %subject, "mail delivered via webhook");
        Ok(())
    }
}

/// Fallback for deployments without a webhook: log-only delivery.
/// The body (which carries the OTP) is logged at debug level, which is
/// what makes local development of the reset flow possible at all.
pub struct TracingMailer;

#[async_trait]
impl Mailer for TracingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        tracing::info!(%to, %subject, "mail delivery skipped (no webhook configured)");
        tracing::debug!(%body, "undelivered mail body");
        Ok(())
    }
}
