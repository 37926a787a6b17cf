//! Configuration management for relaybot
//!
//! The configuration is layered with `figment`: built-in defaults, a
//! `relaybot.toml` file, `RELAYBOT_`-prefixed environment variables and
//! finally command-line arguments. Only the top-level settings are extracted
//! eagerly. Channel settings stay in the figment until the notification
//! manager asks for an enabled channel, so a disabled channel never has its
//! settings parsed.

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::Value,
    Figment,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::PathBuf;

use crate::cli::Cli;
use crate::core::ChannelKind;
use crate::notification::NotifyError;

/// The default configuration file, used when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "relaybot.toml";

/// Top-level settings that are not tied to a channel.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
struct BaseConfig {
    /// The logging level for the application.
    log_level: String,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// The loaded application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// The file the configuration was read from, if any.
    pub source_file: Option<PathBuf>,
    figment: Figment,
}

impl Config {
    /// Loads the configuration by layering defaults, the config file,
    /// environment variables and command-line arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let figment = Figment::new()
            .merge(Serialized::defaults(BaseConfig::default()))
            .merge(Toml::file(&path))
            // e.g. RELAYBOT_TELEGRAM__ENABLED=true
            .merge(Env::prefixed("RELAYBOT_").split("__"))
            .merge(cli.clone());
        let mut config = Self::from_figment(figment)?;
        config.source_file = path.exists().then_some(path);
        Ok(config)
    }

    /// Builds a configuration from a TOML document. Mostly useful in tests.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(BaseConfig::default()))
                .merge(Toml::string(toml)),
        )
    }

    /// Builds a configuration from an already assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let base: BaseConfig = figment.extract()?;
        Ok(Self {
            log_level: base.log_level,
            source_file: None,
            figment,
        })
    }

    /// Returns whether `kind` is enabled. Anything but a boolean `true`
    /// counts as disabled.
    pub fn is_enabled(&self, kind: ChannelKind) -> bool {
        self.figment
            .find_value(&format!("{}.enabled", kind.key()))
            .map(|value| matches!(value, Value::Bool(_, true)))
            .unwrap_or(false)
    }

    /// The enabled kinds, in construction priority order.
    pub fn enabled_kinds(&self) -> Vec<ChannelKind> {
        ChannelKind::PRIORITY
            .into_iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }

    /// Extracts and validates the settings table for `kind`.
    pub fn channel<T: ChannelSettings>(&self, kind: ChannelKind) -> Result<T, NotifyError> {
        let settings: T = self
            .figment
            .extract_inner(kind.key())
            .map_err(|e| NotifyError::configuration(kind, e))?;
        settings
            .validate()
            .map_err(|reason| NotifyError::configuration(kind, reason))?;
        Ok(settings)
    }
}

/// Settings for a single channel kind.
pub trait ChannelSettings: DeserializeOwned {
    /// Checks constraints serde cannot express. Returns a human-readable reason.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}
