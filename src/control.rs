//! Remote control of the host application.
//!
//! Interactive channels (the Telegram bot, the API server) let an operator
//! start, stop or reload the host. The commands are parsed and executed here
//! so every channel behaves the same.

use crate::core::{BotControl, BotState, Message};
use anyhow::Result;
use std::str::FromStr;
use tokio::sync::watch;
use tracing::info;

/// A command an operator can issue through an interactive channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    ReloadConf,
    Status,
    Ping,
    Help,
}

impl ControlCommand {
    pub const HELP: &'static str = "/start /stop /reload_conf /status /ping /help";

    /// Runs the command against the host and returns the reply.
    pub fn execute(self, host: &dyn BotControl) -> Message {
        match self {
            ControlCommand::Start => {
                if host.state() == BotState::Running {
                    Message::status("already running")
                } else {
                    host.set_state(BotState::Running);
                    info!("Start requested by remote command.");
                    Message::status("starting trader ...")
                }
            }
            ControlCommand::Stop => {
                if host.state() == BotState::Running {
                    host.set_state(BotState::Stopped);
                    info!("Stop requested by remote command.");
                    Message::status("stopping trader ...")
                } else {
                    Message::status("already stopped")
                }
            }
            ControlCommand::ReloadConf => {
                host.set_state(BotState::ReloadConf);
                info!("Config reload requested by remote command.");
                Message::status("reloading config ...")
            }
            ControlCommand::Status => Message::new().with("state", host.state().to_string()),
            ControlCommand::Ping => Message::status("pong"),
            ControlCommand::Help => Message::new().with("commands", Self::HELP),
        }
    }
}

impl FromStr for ControlCommand {
    type Err = anyhow::Error;

    /// Accepts `start`, `/start` and the group form `/start@some_bot`.
    fn from_str(s: &str) -> Result<Self> {
        let word = s.split_whitespace().next().unwrap_or_default();
        let word = word.strip_prefix('/').unwrap_or(word);
        let word = word.split('@').next().unwrap_or_default();
        match word.to_ascii_lowercase().as_str() {
            "start" => Ok(ControlCommand::Start),
            "stop" => Ok(ControlCommand::Stop),
            "reload_conf" => Ok(ControlCommand::ReloadConf),
            "status" => Ok(ControlCommand::Status),
            "ping" => Ok(ControlCommand::Ping),
            "help" => Ok(ControlCommand::Help),
            _ => anyhow::bail!("unknown command '{}'", s.trim()),
        }
    }
}

/// An in-memory [`BotControl`] the host can observe for state changes.
#[derive(Debug, Clone)]
pub struct SharedBotControl {
    state_tx: watch::Sender<BotState>,
}

impl SharedBotControl {
    pub fn new(initial: BotState) -> Self {
        let (state_tx, _) = watch::channel(initial);
        Self { state_tx }
    }

    /// Returns a receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<BotState> {
        self.state_tx.subscribe()
    }
}

impl BotControl for SharedBotControl {
    fn state(&self) -> BotState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: BotState) -> BotState {
        self.state_tx.send_replace(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("/start".parse::<ControlCommand>().unwrap(), ControlCommand::Start);
        assert_eq!("stop".parse::<ControlCommand>().unwrap(), ControlCommand::Stop);
        assert_eq!(
            "/reload_conf@relay_bot".parse::<ControlCommand>().unwrap(),
            ControlCommand::ReloadConf
        );
        assert_eq!("/STATUS now".parse::<ControlCommand>().unwrap(), ControlCommand::Status);
        assert!("/balance".parse::<ControlCommand>().is_err());
        assert!("".parse::<ControlCommand>().is_err());
    }

    #[test]
    fn test_start_and_stop_transitions() {
        let host = SharedBotControl::new(BotState::Stopped);

        let reply = ControlCommand::Start.execute(&host);
        assert_eq!(reply.get("status"), Some("starting trader ..."));
        assert_eq!(host.state(), BotState::Running);

        let reply = ControlCommand::Start.execute(&host);
        assert_eq!(reply.get("status"), Some("already running"));

        let reply = ControlCommand::Stop.execute(&host);
        assert_eq!(reply.get("status"), Some("stopping trader ..."));
        assert_eq!(host.state(), BotState::Stopped);

        let reply = ControlCommand::Stop.execute(&host);
        assert_eq!(reply.get("status"), Some("already stopped"));
    }

    #[test]
    fn test_reload_and_status() {
        let host = SharedBotControl::new(BotState::Running);
        ControlCommand::ReloadConf.execute(&host);
        assert_eq!(host.state(), BotState::ReloadConf);

        let reply = ControlCommand::Status.execute(&host);
        assert_eq!(reply.get("state"), Some("reload_conf"));
    }

    #[tokio::test]
    async fn test_subscribers_see_state_changes() {
        let host = SharedBotControl::new(BotState::Running);
        let mut rx = host.subscribe();

        let previous = host.set_state(BotState::Stopped);

        assert_eq!(previous, BotState::Running);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), BotState::Stopped);
    }
}
