#![allow(dead_code)]
pub mod log_capture;
pub mod recording_channel;

use relaybot::{control::SharedBotControl, core::BotState};
use std::sync::Arc;

/// A host that reports itself as running.
pub fn running_host() -> Arc<SharedBotControl> {
    Arc::new(SharedBotControl::new(BotState::Running))
}
