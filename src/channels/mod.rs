//! Built-in notification channels.
//!
//! Each submodule provides one `Channel` implementation together with its
//! settings type. They are only constructed through the factories registered
//! in [`crate::notification::ChannelFactories`].

pub mod api_server;
pub mod log;
pub mod telegram;
pub mod webhook;

pub use api_server::{ApiServer, ApiServerConfig};
pub use log::{LogChannel, LogConfig};
pub use telegram::{Telegram, TelegramConfig};
pub use webhook::{WebhookChannel, WebhookConfig};
