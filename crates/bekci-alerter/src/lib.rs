//! Alert dispatch: cooldown, recipient fan-out, re-alerts, and the email
//! transport.

pub mod dispatcher;
pub mod resend;
pub mod templates;

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;

pub use dispatcher::AlertDispatcher;
pub use resend::ResendClient;

/// Outbound email transport. The production implementation posts to the
/// Resend API; tests record sends instead.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        api_key: &str,
        from: &str,
        to: &[String],
        subject: &str,
        html: &str,
    ) -> Result<()>;
}
