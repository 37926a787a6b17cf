//! A channel that writes every notification to the application log.

use crate::config::ChannelSettings;
use crate::core::{Channel, Message};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// The level notifications are logged at.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
}

/// Configuration for the log channel.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
}

impl ChannelSettings for LogConfig {}

pub struct LogChannel {
    level: LogLevel,
}

impl LogChannel {
    pub fn new(config: LogConfig) -> Self {
        Self {
            level: config.level,
        }
    }
}

#[async_trait]
impl Channel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &Message) -> Result<()> {
        match self.level {
            LogLevel::Debug => debug!(notification = %message, "Notification"),
            LogLevel::Info => info!(notification = %message, "Notification"),
            LogLevel::Warn => warn!(notification = %message, "Notification"),
        }
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_log_channel_emits_message() {
        let channel = LogChannel::new(LogConfig {
            level: LogLevel::Warn,
        });

        channel.send(&Message::status("stopping bot")).await.unwrap();

        assert!(logs_contain("Notification"));
        assert!(logs_contain("stopping bot"));
        assert!(logs_contain("WARN"));
    }
}
