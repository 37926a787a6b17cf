/// relaybot - broadcasts bot status notifications to configurable channels
///
/// This library provides the notification manager, the built-in channels
/// (Telegram, HTTP control API, webhook, log) and the configuration layer
/// that decides which of them are active.
pub mod notification;

pub mod app;
pub mod channels;
pub mod cli;
pub mod config;
pub mod control;
pub mod core;
pub mod formatting;
pub mod task_manager;

// Re-export core types for convenience
pub use crate::core::*;
pub use notification::{NotificationManager, NotifyError};
