use crate::Mailer;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.resend.com";
const ERROR_BODY_LIMIT: usize = 1024;

/// Sends email through the Resend HTTPS API: a single bearer-authenticated
/// JSON POST per message.
pub struct ResendClient {
    client: reqwest::Client,
    base_url: String,
}

impl ResendClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for ResendClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for ResendClient {
    async fn send(
        &self,
        api_key: &str,
        from: &str,
        to: &[String],
        subject: &str,
        html: &str,
    ) -> Result<()> {
        let payload = serde_json::json!({
            "from": from,
            "to": to,
            "subject": subject,
            "html": html,
        });

        let resp = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(api_key)
            .json(&payload)
            .timeout(Duration::from_secs(15))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            // Keep the first KiB of the body for diagnostics. Truncate on
            // bytes, not chars: the boundary may split a multi-byte char.
            let bytes = resp.bytes().await.unwrap_or_default();
            let body = String::from_utf8_lossy(&bytes[..bytes.len().min(ERROR_BODY_LIMIT)]);
            anyhow::bail!("resend API error {}: {}", status.as_u16(), body);
        }
        Ok(())
    }
}
