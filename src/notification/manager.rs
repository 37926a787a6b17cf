//! The notification manager owns every active channel and fans messages out
//! to them.
//!
//! Channels are constructed once, in [`ChannelKind::PRIORITY`] order, and kept
//! until [`NotificationManager::cleanup`] tears them down in reverse order.
//! Delivery is sequential and in registry order. A channel that fails to
//! deliver is logged and skipped; the remaining channels still receive the
//! message.

use crate::config::Config;
use crate::core::{BotControl, Channel, ChannelKind, Message};
use crate::notification::{ChannelFactories, NotifyError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, warn, Dispatch};

/// Lifecycle of a [`NotificationManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// Constructed; `send` delivers to the registry.
    Active,
    /// `cleanup` has run; the registry is empty and `send` does nothing.
    Stopped,
}

/// The `NotificationManager`.
pub struct NotificationManager {
    registry: RwLock<Vec<Box<dyn Channel>>>,
    stopped: AtomicBool,
    dispatch: Dispatch,
}

/// Builder for [`NotificationManager`], used to swap the channel factories or
/// the tracing dispatcher (mostly in tests).
pub struct NotificationManagerBuilder<'a> {
    config: &'a Config,
    host: Arc<dyn BotControl>,
    factories: ChannelFactories,
    dispatch: Option<Dispatch>,
}

impl<'a> NotificationManagerBuilder<'a> {
    /// Replaces the built-in channel factories.
    pub fn factories(mut self, factories: ChannelFactories) -> Self {
        self.factories = factories;
        self
    }

    /// Routes the manager's logs to `dispatch` instead of the default subscriber.
    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Constructs every enabled channel.
    ///
    /// If any enabled channel fails to construct, the channels built so far
    /// are cleaned up and the error is returned.
    pub async fn build(self) -> Result<NotificationManager, NotifyError> {
        let dispatch = self
            .dispatch
            .unwrap_or_else(|| tracing::dispatcher::get_default(Dispatch::clone));

        let channels = construct_channels(self.config, self.host, &self.factories)
            .with_subscriber(dispatch.clone())
            .await?;
        metrics::gauge!("channels_active").set(channels.len() as f64);

        Ok(NotificationManager {
            registry: RwLock::new(channels),
            stopped: AtomicBool::new(false),
            dispatch,
        })
    }
}

impl NotificationManager {
    /// Builds a manager with the built-in channels.
    pub async fn new(config: &Config, host: Arc<dyn BotControl>) -> Result<Self, NotifyError> {
        Self::builder(config, host).build().await
    }

    /// Creates a new `NotificationManagerBuilder`.
    pub fn builder(config: &Config, host: Arc<dyn BotControl>) -> NotificationManagerBuilder<'_> {
        NotificationManagerBuilder {
            config,
            host,
            factories: ChannelFactories::builtin(),
            dispatch: None,
        }
    }

    /// Delivers `message` to every registered channel, in registry order.
    ///
    /// Failures are logged per channel and never reach the caller.
    pub async fn send(&self, message: &Message) {
        self.deliver(message)
            .with_subscriber(self.dispatch.clone())
            .await
    }

    async fn deliver(&self, message: &Message) {
        let registry = self.registry.read().await;
        info!(notification = %message, channels = registry.len(), "Sending notification.");

        for channel in registry.iter() {
            let name = channel.name().to_string();
            debug!(channel = %name, "Forwarding notification.");
            let start = Instant::now();
            match channel.send(message).await {
                Ok(()) => {
                    metrics::counter!("notifications_sent_total", "channel" => name.clone())
                        .increment(1);
                }
                Err(source) => {
                    metrics::counter!("notification_failures_total", "channel" => name.clone())
                        .increment(1);
                    let err = NotifyError::Delivery {
                        channel: name.clone(),
                        source: source.into(),
                    };
                    error!(error = %err, "Notification delivery failed.");
                }
            }
            metrics::histogram!("notification_send_duration_seconds", "channel" => name)
                .record(start.elapsed().as_secs_f64());
        }
    }

    /// Cleans up every channel, most recently registered first, and empties
    /// the registry. Later calls do nothing.
    ///
    /// Waits for in-flight `send` calls to finish before draining.
    pub async fn cleanup(&self) {
        async {
            let mut registry = self.registry.write().await;
            self.stopped.store(true, Ordering::SeqCst);
            if registry.is_empty() {
                debug!("No notification channels to clean up.");
                return;
            }
            info!(channels = registry.len(), "Cleaning up notification channels ...");
            drain(&mut registry).await;
            metrics::gauge!("channels_active").set(0.0);
        }
        .with_subscriber(self.dispatch.clone())
        .await
    }

    /// Names of the registered channels, in registry order.
    pub async fn channel_names(&self) -> Vec<String> {
        self.registry
            .read()
            .await
            .iter()
            .map(|channel| channel.name().to_string())
            .collect()
    }

    pub fn state(&self) -> ManagerState {
        if self.stopped.load(Ordering::SeqCst) {
            ManagerState::Stopped
        } else {
            ManagerState::Active
        }
    }
}

impl Drop for NotificationManager {
    fn drop(&mut self) {
        let remaining = self.registry.get_mut().len();
        if remaining > 0 {
            tracing::dispatcher::with_default(&self.dispatch, || {
                warn!(
                    channels = remaining,
                    "NotificationManager dropped without cleanup; channel tasks may keep running."
                );
            });
        }
    }
}

async fn construct_channels(
    config: &Config,
    host: Arc<dyn BotControl>,
    factories: &ChannelFactories,
) -> Result<Vec<Box<dyn Channel>>, NotifyError> {
    let enabled = config.enabled_kinds();
    if let Some(kind) = enabled.iter().copied().find(|kind| !factories.contains(*kind)) {
        error!(channel = %kind, "No factory registered for enabled channel, aborting startup.");
        return Err(NotifyError::MissingFactory(kind));
    }

    let mut channels: Vec<Box<dyn Channel>> = Vec::new();
    for kind in enabled {
        info!(channel = %kind, "Enabling channel ...");
        match factories.construct(kind, config, host.clone()).await {
            Ok(channel) => channels.push(channel),
            Err(e) => {
                error!(channel = %kind, error = %e, "Failed to enable channel, aborting startup.");
                drain(&mut channels).await;
                return Err(e);
            }
        }
    }

    info!(count = channels.len(), "Notification channels ready.");
    Ok(channels)
}

/// Pops and cleans up channels until `channels` is empty. A failing cleanup is
/// logged and does not stop the drain.
async fn drain(channels: &mut Vec<Box<dyn Channel>>) {
    while let Some(channel) = channels.pop() {
        debug!(channel = channel.name(), "Cleaning up channel ...");
        if let Err(source) = channel.cleanup().await {
            let err = NotifyError::Cleanup {
                channel: channel.name().to_string(),
                source: source.into(),
            };
            error!(error = %err, "Channel cleanup failed.");
        }
    }
}
