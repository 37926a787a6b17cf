//! Deferred construction of channels, keyed by kind.
//!
//! A factory is only invoked for a kind that is enabled in the configuration,
//! so a disabled channel never parses its settings, opens a socket or talks to
//! a remote API.

use crate::channels::{
    ApiServer, ApiServerConfig, LogChannel, LogConfig, Telegram, TelegramConfig, WebhookChannel,
    WebhookConfig,
};
use crate::config::Config;
use crate::core::{BotControl, Channel, ChannelKind};
use crate::notification::NotifyError;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

/// The future a factory returns.
pub type ChannelFuture = BoxFuture<'static, Result<Box<dyn Channel>, NotifyError>>;

/// Builds one channel from the configuration and the host handle.
///
/// Settings must be read from `config` before the future is returned; the
/// future itself only performs the (possibly slow) construction.
pub type ChannelFactory = Box<dyn Fn(&Config, Arc<dyn BotControl>) -> ChannelFuture + Send + Sync>;

/// A map from channel kind to the factory that builds it.
pub struct ChannelFactories {
    factories: HashMap<ChannelKind, ChannelFactory>,
}

impl ChannelFactories {
    /// A registry with no factories at all.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with every built-in channel.
    pub fn builtin() -> Self {
        Self::empty()
            .with(ChannelKind::Telegram, telegram)
            .with(ChannelKind::ApiServer, api_server)
            .with(ChannelKind::Webhook, webhook)
            .with(ChannelKind::Log, log)
    }

    /// Registers `factory` for `kind`, replacing any previous one.
    pub fn register<F>(&mut self, kind: ChannelKind, factory: F)
    where
        F: Fn(&Config, Arc<dyn BotControl>) -> ChannelFuture + Send + Sync + 'static,
    {
        self.factories.insert(kind, Box::new(factory));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F>(mut self, kind: ChannelKind, factory: F) -> Self
    where
        F: Fn(&Config, Arc<dyn BotControl>) -> ChannelFuture + Send + Sync + 'static,
    {
        self.register(kind, factory);
        self
    }

    pub fn contains(&self, kind: ChannelKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Starts constructing the channel for `kind`.
    pub fn construct(
        &self,
        kind: ChannelKind,
        config: &Config,
        host: Arc<dyn BotControl>,
    ) -> ChannelFuture {
        match self.factories.get(&kind) {
            Some(factory) => factory(config, host),
            None => Box::pin(async move { Err(NotifyError::MissingFactory(kind)) }),
        }
    }
}

impl Default for ChannelFactories {
    fn default() -> Self {
        Self::builtin()
    }
}

fn telegram(config: &Config, host: Arc<dyn BotControl>) -> ChannelFuture {
    let kind = ChannelKind::Telegram;
    let settings = config.channel::<TelegramConfig>(kind);
    Box::pin(async move {
        let channel = Telegram::new(settings?, host)
            .await
            .map_err(|e| NotifyError::construction(kind, e))?;
        Ok(Box::new(channel) as Box<dyn Channel>)
    })
}

fn api_server(config: &Config, host: Arc<dyn BotControl>) -> ChannelFuture {
    let kind = ChannelKind::ApiServer;
    let settings = config.channel::<ApiServerConfig>(kind);
    Box::pin(async move {
        let channel = ApiServer::bind(settings?, host)
            .await
            .map_err(|e| NotifyError::construction(kind, e))?;
        Ok(Box::new(channel) as Box<dyn Channel>)
    })
}

fn webhook(config: &Config, _host: Arc<dyn BotControl>) -> ChannelFuture {
    let kind = ChannelKind::Webhook;
    let settings = config.channel::<WebhookConfig>(kind);
    Box::pin(async move {
        let channel =
            WebhookChannel::new(settings?).map_err(|e| NotifyError::construction(kind, e))?;
        Ok(Box::new(channel) as Box<dyn Channel>)
    })
}

fn log(config: &Config, _host: Arc<dyn BotControl>) -> ChannelFuture {
    let settings = config.channel::<LogConfig>(ChannelKind::Log);
    Box::pin(async move { Ok(Box::new(LogChannel::new(settings?)) as Box<dyn Channel>) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::SharedBotControl;
    use crate::core::BotState;

    fn host() -> Arc<dyn BotControl> {
        Arc::new(SharedBotControl::new(BotState::Running))
    }

    #[test]
    fn test_builtin_covers_every_kind() {
        let factories = ChannelFactories::builtin();
        for kind in ChannelKind::PRIORITY {
            assert!(factories.contains(kind), "missing factory for {kind}");
        }
    }

    #[tokio::test]
    async fn test_missing_factory_is_reported() {
        let config = Config::from_toml_str("").unwrap();
        let result = ChannelFactories::empty()
            .construct(ChannelKind::Log, &config, host())
            .await;
        assert!(matches!(result, Err(NotifyError::MissingFactory(ChannelKind::Log))));
    }

    #[tokio::test]
    async fn test_invalid_settings_surface_as_configuration_error() {
        let config = Config::from_toml_str(
            r#"
            [webhook]
            enabled = true
            url = ""
            "#,
        )
        .unwrap();
        let result = ChannelFactories::builtin()
            .construct(ChannelKind::Webhook, &config, host())
            .await;
        assert!(matches!(
            result,
            Err(NotifyError::Configuration { kind: ChannelKind::Webhook, .. })
        ));
    }

    #[tokio::test]
    async fn test_builtin_log_channel_constructs() {
        let config = Config::from_toml_str("[log]\nenabled = true\n").unwrap();
        let channel = ChannelFactories::builtin()
            .construct(ChannelKind::Log, &config, host())
            .await
            .unwrap();
        assert_eq!(channel.name(), "log");
    }
}
