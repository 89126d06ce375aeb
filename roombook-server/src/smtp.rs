//! SMTP implementation of the notification boundary.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use roombook_core::config::SmtpConfig;
use roombook_core::error::{SyncError, SyncResult};
use roombook_core::notify::NotificationSender;
use tracing::debug;

pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        SmtpNotifier { config }
    }

    fn transport(&self) -> SyncResult<SmtpTransport> {
        let transport = SmtpTransport::starttls_relay(&self.config.host)
            .map_err(|e| SyncError::DeliveryFailed(e.to_string()))?
            .port(self.config.port)
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .build();
        Ok(transport)
    }
}

fn parse_mailbox(address: &str, label: &str) -> SyncResult<Mailbox> {
    address
        .parse()
        .map_err(|e| SyncError::DeliveryFailed(format!("invalid {label} address '{address}': {e}")))
}

#[async_trait]
impl NotificationSender for SmtpNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> SyncResult<()> {
        let message = Message::builder()
            .from(parse_mailbox(&self.config.from, "from")?)
            .to(parse_mailbox(to, "recipient")?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| SyncError::DeliveryFailed(e.to_string()))?;

        let transport = self.transport()?;

        // The transport is blocking; keep it off the async workers.
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| SyncError::DeliveryFailed(format!("send task failed: {e}")))?
            .map_err(|e| SyncError::DeliveryFailed(e.to_string()))?;

        debug!(%to, "confirmation email sent");
        Ok(())
    }

    /// Connection test only; no mail leaves the building.
    async fn healthcheck(&self) -> SyncResult<()> {
        let transport = self.transport()?;

        let reachable = tokio::task::spawn_blocking(move || transport.test_connection())
            .await
            .map_err(|e| SyncError::DeliveryFailed(format!("healthcheck task failed: {e}")))?
            .map_err(|e| SyncError::DeliveryFailed(e.to_string()))?;

        if reachable {
            Ok(())
        } else {
            Err(SyncError::DeliveryFailed(
                "smtp server rejected the connection test".to_string(),
            ))
        }
    }
}
