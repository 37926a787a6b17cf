//! Core domain types and service traits for relaybot
//!
//! This module defines the notification message, the known channel kinds and
//! the trait contracts shared by the manager, the channels and the host.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A single notification event: string keys mapped to string values.
///
/// Keys are kept sorted so every channel renders the same message identically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct Message(BTreeMap<String, String>);

impl Message {
    /// Creates an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the common `{"status": <text>}` message.
    pub fn status(text: impl Into<String>) -> Self {
        Self::new().with("status", text)
    }

    /// Adds a key/value pair, replacing any previous value for the key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Message
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Message {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value:?}")?;
        }
        f.write_str("}")
    }
}

/// The channel kinds this crate knows how to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Telegram,
    ApiServer,
    Webhook,
    Log,
}

impl ChannelKind {
    /// Construction order. Registry order always follows this list.
    pub const PRIORITY: [ChannelKind; 4] = [
        ChannelKind::Telegram,
        ChannelKind::ApiServer,
        ChannelKind::Webhook,
        ChannelKind::Log,
    ];

    /// The configuration key for this kind.
    pub fn key(&self) -> &'static str {
        match self {
            ChannelKind::Telegram => "telegram",
            ChannelKind::ApiServer => "api_server",
            ChannelKind::Webhook => "webhook",
            ChannelKind::Log => "log",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ChannelKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ChannelKind::PRIORITY
            .into_iter()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown channel kind '{}'", s))
    }
}

/// Lifecycle state reported by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotState {
    Running,
    Stopped,
    ReloadConf,
}

impl fmt::Display for BotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BotState::Running => "running",
            BotState::Stopped => "stopped",
            BotState::ReloadConf => "reload_conf",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// An output integration the notification manager can deliver messages to.
#[async_trait]
pub trait Channel: Send + Sync {
    /// A stable, descriptive name for the channel (e.g. "telegram").
    /// Used for logging and metrics only.
    fn name(&self) -> &str;

    /// Delivers a message to the channel's destination.
    ///
    /// # Arguments
    /// * `message` - The message to deliver. Channels must not assume they
    ///   are the only reader.
    ///
    /// # Returns
    /// * `Ok(())` if the message was handed off successfully
    /// * `Err` if delivery failed (network error, rejected request, etc.)
    async fn send(&self, message: &Message) -> Result<()>;

    /// Releases everything the channel holds: background tasks, sockets,
    /// HTTP clients. Called exactly once by the manager.
    async fn cleanup(&self) -> Result<()>;
}

/// The host handle channels use to issue commands back to the application.
pub trait BotControl: Send + Sync {
    /// Returns the current state of the host.
    fn state(&self) -> BotState;

    /// Moves the host to `state`, returning the previous state.
    fn set_state(&self, state: BotState) -> BotState;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_display_is_sorted_by_key() {
        let message = Message::from([("status", "stopping bot"), ("pair", "ETH/BTC")]);
        assert_eq!(message.to_string(), r#"{pair: "ETH/BTC", status: "stopping bot"}"#);
    }

    #[test]
    fn test_message_serializes_as_plain_map() {
        let message = Message::status("running");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "running" }));
    }

    #[test]
    fn test_channel_kind_round_trips_through_key() {
        for kind in ChannelKind::PRIORITY {
            assert_eq!(kind.key().parse::<ChannelKind>().unwrap(), kind);
        }
        assert!("slack".parse::<ChannelKind>().is_err());
    }
}
