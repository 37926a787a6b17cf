#![allow(dead_code)]
//! Fake channels that record every call in a shared journal.

use anyhow::Result;
use async_trait::async_trait;
use relaybot::{
    core::{Channel, ChannelKind, Message},
    notification::{ChannelFactories, ChannelFuture, NotifyError},
};
use std::sync::{Arc, Mutex};

/// Something that happened to a recording channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Sent { channel: String, message: Message },
    CleanedUp { channel: String },
}

/// A shared, ordered log of channel events.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Event>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    /// Names of the channels that received a message, in delivery order.
    pub fn deliveries(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Sent { channel, .. } => Some(channel),
                _ => None,
            })
            .collect()
    }

    /// Names of the channels that were cleaned up, in cleanup order.
    pub fn cleanups(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::CleanedUp { channel } => Some(channel),
                _ => None,
            })
            .collect()
    }
}

/// How a recording channel should misbehave.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    pub fail_send: bool,
    pub fail_cleanup: bool,
}

/// A channel that records calls and optionally fails them.
pub struct RecordingChannel {
    name: String,
    journal: Journal,
    faults: Faults,
}

impl RecordingChannel {
    pub fn new(name: &str, journal: Journal, faults: Faults) -> Self {
        Self {
            name: name.to_string(),
            journal,
            faults,
        }
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &Message) -> Result<()> {
        if self.faults.fail_send {
            anyhow::bail!("{} is unreachable", self.name);
        }
        self.journal.push(Event::Sent {
            channel: self.name.clone(),
            message: message.clone(),
        });
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        // Recorded even when failing: the call happened.
        self.journal.push(Event::CleanedUp {
            channel: self.name.clone(),
        });
        if self.faults.fail_cleanup {
            anyhow::bail!("{} refused to shut down", self.name);
        }
        Ok(())
    }
}

/// Factories that build a healthy recording channel for every known kind.
pub fn recording_factories(journal: &Journal) -> ChannelFactories {
    let mut factories = ChannelFactories::empty();
    for kind in ChannelKind::PRIORITY {
        register_recording(&mut factories, kind, journal, Faults::default());
    }
    factories
}

/// Registers a recording channel named after `kind`.
pub fn register_recording(
    factories: &mut ChannelFactories,
    kind: ChannelKind,
    journal: &Journal,
    faults: Faults,
) {
    let journal = journal.clone();
    factories.register(kind, move |_config, _host| -> ChannelFuture {
        let channel = RecordingChannel::new(kind.key(), journal.clone(), faults);
        Box::pin(async move { Ok(Box::new(channel) as Box<dyn Channel>) })
    });
}

/// Registers a factory for `kind` whose construction always fails.
pub fn register_broken(factories: &mut ChannelFactories, kind: ChannelKind) {
    factories.register(kind, move |_config, _host| -> ChannelFuture {
        Box::pin(async move {
            Err(NotifyError::construction(
                kind,
                anyhow::anyhow!("optional dependency unavailable"),
            ))
        })
    });
}
