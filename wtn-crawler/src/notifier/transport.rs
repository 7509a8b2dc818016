//! Notification transports
//!
//! Physical delivery is deliberately thin: the dispatcher only needs
//! `send(recipient, subject, body)`.

use crate::error::TransportError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Delivers one message to one recipient
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), TransportError>;
}

/// Dry-run transport: logs the message, delivers nothing
#[derive(Debug, Default, Clone)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), TransportError> {
        tracing::info!(
            recipient,
            subject,
            body_len = body.len(),
            "Notification (dry run, not sent)"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Sends mail through an HTTP relay accepting `{from, to, subject, text}`
pub struct HttpMailTransport {
    http_client: reqwest::Client,
    endpoint: String,
    sender: String,
    token: String,
}

impl HttpMailTransport {
    pub fn new(
        endpoint: impl Into<String>,
        sender: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::NotConfigured(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            sender: sender.into(),
            token: token.into(),
        })
    }
}

#[async_trait]
impl NotificationTransport for HttpMailTransport {
    fn name(&self) -> &'static str {
        "http-mail"
    }

    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), TransportError> {
        let request = MailRequest {
            from: &self.sender,
            to: recipient,
            subject,
            text: body,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(recipient, subject, "Mail accepted by relay");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_transport_always_succeeds() {
        let transport = LogTransport;
        assert!(transport.send("a@example.com", "s", "b").await.is_ok());
        assert_eq!(transport.name(), "log");
    }

    #[test]
    fn test_mail_request_shape() {
        let request = MailRequest {
            from: "bot@example.com",
            to: "a@example.com",
            subject: "s",
            text: "b",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"from": "bot@example.com", "to": "a@example.com", "subject": "s", "text": "b"})
        );
    }

    #[test]
    fn test_http_transport_creation() {
        let transport = HttpMailTransport::new(
            "https://relay.test/send",
            "bot@example.com",
            "token",
            Duration::from_secs(10),
        )
        .unwrap();
        assert_eq!(transport.name(), "http-mail");
    }
}
