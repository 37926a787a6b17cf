//! A Telegram bot channel.
//!
//! Notifications are posted to a single chat through the Bot API
//! `sendMessage` method. When command polling is enabled, a background task
//! long-polls `getUpdates` and answers control commands (`/start`, `/stop`,
//! `/status`, ...) coming from that same chat. Messages from any other chat
//! are ignored.

use crate::config::ChannelSettings;
use crate::control::ControlCommand;
use crate::core::{BotControl, Channel, Message};
use crate::formatting::{MarkdownFormatter, TextFormatter};
use crate::task_manager::BackgroundTask;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use teloxide::{
    prelude::*,
    types::{AllowedUpdate, ParseMode, Recipient, Update, UpdateKind},
    RequestError,
};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// A Telegram chat, either numeric or `@channelusername`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Id(i64),
    Username(String),
}

impl ChatId {
    fn matches(&self, id: i64) -> bool {
        match self {
            ChatId::Id(own) => *own == id,
            ChatId::Username(name) => name.trim().parse::<i64>() == Ok(id),
        }
    }

    fn recipient(&self) -> Recipient {
        match self {
            ChatId::Id(id) => Recipient::Id(teloxide::types::ChatId(*id)),
            ChatId::Username(name) => match name.trim().parse::<i64>() {
                Ok(id) => Recipient::Id(teloxide::types::ChatId(id)),
                Err(_) => Recipient::ChannelUsername(name.trim().to_string()),
            },
        }
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatId::Id(id) => write!(f, "{id}"),
            ChatId::Username(name) => f.write_str(name),
        }
    }
}

/// Configuration for the Telegram channel.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub token: String,
    /// The chat notifications go to and commands are accepted from.
    pub chat_id: ChatId,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_poll_commands")]
    pub poll_commands: bool,
    /// Long-polling timeout passed to `getUpdates`.
    #[serde(default = "default_poll_timeout_seconds")]
    pub poll_timeout_seconds: u32,
    /// Pause between polls that returned nothing or failed.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_commands() -> bool {
    true
}

fn default_poll_timeout_seconds() -> u32 {
    30
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_seconds() -> u64 {
    10
}

impl ChannelSettings for TelegramConfig {
    fn validate(&self) -> Result<(), String> {
        if self.token.trim().is_empty() {
            return Err("token must not be empty".to_string());
        }
        if let ChatId::Username(name) = &self.chat_id {
            if name.trim().is_empty() {
                return Err("chat_id must not be empty".to_string());
            }
        }
        if reqwest::Url::parse(&self.api_url).is_err() {
            return Err(format!("api_url '{}' is not a valid URL", self.api_url));
        }
        if self.request_timeout_seconds == 0 {
            return Err("request_timeout_seconds must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Posts `message` to `chat` as legacy Telegram Markdown.
#[allow(deprecated)]
async fn send_markdown(bot: &Bot, chat: Recipient, message: &Message) -> Result<(), RequestError> {
    bot.send_message(chat, MarkdownFormatter.format(message))
        .parse_mode(ParseMode::Markdown)
        .await?;
    Ok(())
}

/// The Telegram notification channel.
pub struct Telegram {
    bot: Bot,
    chat: Recipient,
    poller: Option<BackgroundTask>,
}

impl Telegram {
    /// Verifies the bot token and, if enabled, starts command polling.
    pub async fn new(config: TelegramConfig, host: Arc<dyn BotControl>) -> Result<Self> {
        let api_url = reqwest::Url::parse(&config.api_url)
            .with_context(|| format!("invalid Telegram api_url '{}'", config.api_url))?;
        // The server holds a long poll open for up to `poll_timeout_seconds`.
        let client = teloxide::net::default_reqwest_settings()
            .timeout(Duration::from_secs(
                config.request_timeout_seconds + u64::from(config.poll_timeout_seconds),
            ))
            .build()?;
        let bot = Bot::with_client(config.token.clone(), client).set_api_url(api_url);

        let me = bot
            .get_me()
            .await
            .context("Telegram bot token verification failed")?;
        info!(username = ?me.username, chat_id = %config.chat_id, "Telegram bot connected.");

        let poller = config.poll_commands.then(|| {
            let poller = CommandPoller {
                bot: bot.clone(),
                chat_id: config.chat_id.clone(),
                host,
                poll_timeout: config.poll_timeout_seconds,
                poll_interval: Duration::from_millis(config.poll_interval_ms),
            };
            BackgroundTask::spawn("TelegramPoller", move |shutdown_rx| poller.run(shutdown_rx))
        });

        Ok(Self {
            bot,
            chat: config.chat_id.recipient(),
            poller,
        })
    }
}

/// Long-polls `getUpdates` and executes control commands from the configured chat.
struct CommandPoller {
    bot: Bot,
    chat_id: ChatId,
    host: Arc<dyn BotControl>,
    poll_timeout: u32,
    poll_interval: Duration,
}

impl CommandPoller {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Telegram command polling started.");
        // `offset` is one past the last handled update. `confirmed` is the
        // offset Telegram last acknowledged through a successful getUpdates.
        let mut offset: i32 = 0;
        let mut confirmed: i32 = 0;

        loop {
            let result = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                result = self.fetch(offset, self.poll_timeout) => result,
            };

            match result {
                Ok(updates) => {
                    confirmed = offset;
                    if !updates.is_empty() {
                        debug!(count = updates.len(), "Received Telegram updates.");
                        for update in updates {
                            offset = offset.max(update.id.as_offset());
                            self.handle(update).await;
                        }
                        continue;
                    }
                }
                Err(e) => warn!(error = %e, "Failed to fetch Telegram updates."),
            }

            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        // Handled updates stay pending on Telegram's side until a getUpdates
        // call carries a higher offset; the next poller would replay them.
        if offset > confirmed {
            match self.fetch(offset, 0).await {
                Ok(_) => debug!(offset, "Confirmed handled Telegram updates."),
                Err(e) => warn!(error = %e, offset, "Failed to confirm handled Telegram updates."),
            }
        }
        info!("Telegram command polling stopped.");
    }

    async fn fetch(&self, offset: i32, timeout: u32) -> Result<Vec<Update>, RequestError> {
        self.bot
            .get_updates()
            .offset(offset)
            .timeout(timeout)
            .allowed_updates(vec![AllowedUpdate::Message])
            .await
    }

    async fn handle(&self, update: Update) {
        let UpdateKind::Message(message) = update.kind else {
            return;
        };
        if !self.chat_id.matches(message.chat.id.0) {
            warn!(chat_id = message.chat.id.0, "Ignoring Telegram message from unauthorized chat.");
            return;
        }
        let Some(text) = message.text() else {
            return;
        };

        let host = self.host.as_ref();
        let reply = match text.parse::<ControlCommand>() {
            Ok(command) => {
                info!(?command, "Executing Telegram command.");
                command.execute(host)
            }
            Err(e) => {
                debug!(error = %e, "Unrecognized Telegram command.");
                ControlCommand::Help.execute(host)
            }
        };

        if let Err(e) = send_markdown(&self.bot, self.chat_id.recipient(), &reply).await {
            warn!(error = %e, "Failed to answer Telegram command.");
        }
    }
}

#[async_trait]
impl Channel for Telegram {
    fn name(&self) -> &str {
        "telegram"
    }

    #[instrument(skip_all)]
    async fn send(&self, message: &Message) -> Result<()> {
        send_markdown(&self.bot, self.chat.clone(), message).await?;
        debug!("Sent notification to Telegram.");
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        match &self.poller {
            Some(poller) => poller.stop().await,
            None => Ok(()),
        }
    }
}
