//! The host application loop, decoupled from the entry point.

use crate::{
    cli::Cli,
    config::Config,
    control::SharedBotControl,
    core::{BotControl, BotState, ChannelKind, Message},
    notification::{ChannelFactories, NotificationManager},
};
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, instrument};

type FactoriesFn = Arc<dyn Fn() -> ChannelFactories + Send + Sync>;

/// A running host: the active channels plus the state operators control.
pub struct App {
    cli: Cli,
    host: Arc<SharedBotControl>,
    state_rx: watch::Receiver<BotState>,
    manager: NotificationManager,
    factories: FactoriesFn,
}

impl App {
    /// Creates a new `AppBuilder` from the parsed arguments and the
    /// configuration they produced.
    pub fn builder(cli: Cli, config: Config) -> AppBuilder {
        AppBuilder {
            cli,
            config,
            host: None,
            factories: Arc::new(ChannelFactories::builtin),
        }
    }

    /// The handle channels use to control this host.
    pub fn host(&self) -> Arc<SharedBotControl> {
        self.host.clone()
    }

    /// Broadcasts `running`, then reacts to host state changes until
    /// `shutdown` completes. Ends by broadcasting `stopping bot` and cleaning
    /// up every channel.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        self.manager.send(&Message::status("running")).await;
        info!("relaybot initialized successfully. Waiting for shutdown signal...");
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received. Shutting down gracefully...");
                    break Ok(());
                }
                changed = self.state_rx.changed() => {
                    if changed.is_err() {
                        break Ok(());
                    }
                    let state = *self.state_rx.borrow_and_update();
                    if state == BotState::ReloadConf {
                        if let Err(e) = self.reload().await {
                            break Err(e);
                        }
                        // Broadcast through the rebuilt channels on the next iteration.
                        self.host.set_state(BotState::Running);
                    } else {
                        info!(%state, "Host state changed.");
                        self.manager
                            .send(&Message::new().with("state", state.to_string()))
                            .await;
                    }
                }
            }
        };

        self.manager.send(&Message::status("stopping bot")).await;
        self.manager.cleanup().await;
        info!("All channels shut down. Exiting.");
        result
    }

    /// Rebuilds every channel from a freshly loaded configuration.
    ///
    /// A configuration that fails to load leaves the current channels in
    /// place. A failure to rebuild is returned; the old channels are gone by
    /// then.
    #[instrument(skip_all)]
    async fn reload(&mut self) -> Result<()> {
        info!("Reloading configuration ...");
        let config = match Config::load(&self.cli) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to reload configuration, keeping current channels: {:#}", e);
                return Ok(());
            }
        };
        log_configuration(&config);

        self.manager.cleanup().await;
        self.manager = NotificationManager::builder(&config, self.host.clone())
            .factories((self.factories)())
            .build()
            .await?;
        Ok(())
    }
}

/// Builder for [`App`]; lets tests swap the host handle and channel factories.
pub struct AppBuilder {
    cli: Cli,
    config: Config,
    host: Option<Arc<SharedBotControl>>,
    factories: FactoriesFn,
}

impl AppBuilder {
    pub fn host(mut self, host: Arc<SharedBotControl>) -> Self {
        self.host = Some(host);
        self
    }

    /// Overrides the channel factories. Called again on every reload.
    pub fn factories<F>(mut self, factories: F) -> Self
    where
        F: Fn() -> ChannelFactories + Send + Sync + 'static,
    {
        self.factories = Arc::new(factories);
        self
    }

    /// Builds the enabled channels.
    pub async fn build(self) -> Result<App> {
        let host = self
            .host
            .unwrap_or_else(|| Arc::new(SharedBotControl::new(BotState::Running)));
        let state_rx = host.subscribe();
        let manager = NotificationManager::builder(&self.config, host.clone())
            .factories((self.factories)())
            .build()
            .await?;

        Ok(App {
            cli: self.cli,
            host,
            state_rx,
            manager,
            factories: self.factories,
        })
    }
}

pub fn log_configuration(config: &Config) {
    info!("-------------------- Configuration --------------------");
    match &config.source_file {
        Some(path) => info!("Config File: {}", path.display()),
        None => info!("Config File: none (defaults and environment only)"),
    }
    info!("Log Level: {}", config.log_level);
    let enabled = config.enabled_kinds();
    for kind in ChannelKind::PRIORITY {
        info!(
            "Channel {}: {}",
            kind,
            if enabled.contains(&kind) {
                "Enabled"
            } else {
                "Disabled"
            }
        );
    }
    info!("-------------------------------------------------------");
}
