//! A channel that posts notifications to an HTTP webhook.

use crate::config::ChannelSettings;
use crate::core::{Channel, Message};
use crate::formatting::{PlainTextFormatter, TextFormatter};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info, instrument};

/// The body shape sent to the webhook.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookFormat {
    /// The message itself as a JSON object.
    #[default]
    Json,
    /// `{"text": "..."}`, as accepted by Slack-style incoming webhooks.
    Text,
}

/// Configuration for the webhook channel.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// The URL to POST notifications to.
    pub url: String,
    #[serde(default)]
    pub format: WebhookFormat,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    10
}

impl ChannelSettings for WebhookConfig {
    fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("url must not be empty".to_string());
        }
        if self.timeout_seconds == 0 {
            return Err("timeout_seconds must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// A client for posting messages to a webhook.
pub struct WebhookChannel {
    url: String,
    format: WebhookFormat,
    client: reqwest::Client,
}

impl WebhookChannel {
    /// Creates a new `WebhookChannel`. Fails only if the HTTP client cannot be built.
    pub fn new(config: WebhookConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            url: config.url,
            format: config.format,
            client,
        })
    }

    fn payload(&self, message: &Message) -> Result<serde_json::Value> {
        Ok(match self.format {
            WebhookFormat::Json => serde_json::to_value(message)?,
            WebhookFormat::Text => json!({ "text": PlainTextFormatter.format(message) }),
        })
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    #[instrument(skip_all, fields(url = %self.url))]
    async fn send(&self, message: &Message) -> Result<()> {
        let payload = self.payload(message)?;
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .inspect_err(|e| error!(error = %e, "HTTP request to webhook failed"))?;

        let status = response.status();
        if status.is_success() {
            info!("Successfully sent notification to webhook.");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        error!(status = %status, body = %text, "Failed to send webhook notification");
        anyhow::bail!(
            "Failed to send webhook notification: status {}, body: {}",
            status,
            text
        );
    }

    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod webhook_tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn channel(server: &MockServer, format: WebhookFormat, timeout_seconds: u64) -> WebhookChannel {
        WebhookChannel::new(WebhookConfig {
            url: format!("{}/hook", server.uri()),
            format,
            timeout_seconds,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_webhook_posts_json_message() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(json!({ "status": "stopping bot" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let channel = channel(&server, WebhookFormat::Json, 5);

        // Act
        let result = channel.send(&Message::status("stopping bot")).await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_webhook_posts_text_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(json!({ "text": "state: running\nstatus: ok" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let channel = channel(&server, WebhookFormat::Text, 5);

        let message = Message::from([("status", "ok"), ("state", "running")]);
        assert!(channel.send(&message).await.is_ok());
    }

    #[tokio::test]
    async fn test_webhook_handles_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500).set_body_string("nope"))
            .mount(&server)
            .await;
        let channel = channel(&server, WebhookFormat::Json, 5);

        let err = channel.send(&Message::status("x")).await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_webhook_handles_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;
        let channel = channel(&server, WebhookFormat::Json, 1);

        let err = channel.send(&Message::status("x")).await.unwrap_err();
        let is_timeout = err
            .chain()
            .any(|cause| cause.downcast_ref::<reqwest::Error>().is_some_and(|e| e.is_timeout()));
        assert!(is_timeout, "Error should be a timeout error, but was: {}", err);
    }

    #[test]
    fn test_validate_rejects_empty_url() {
        let config = WebhookConfig {
            url: " ".to_string(),
            format: WebhookFormat::Json,
            timeout_seconds: 10,
        };
        assert!(config.validate().is_err());
    }
}
