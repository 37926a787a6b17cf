//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged on top
//! of the `relaybot.toml` file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

use crate::core::ChannelKind;

/// Broadcasts bot status notifications to chat, HTTP and log channels.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Logging level (e.g. "info", "debug", "relaybot=trace").
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Enable a channel regardless of the config file. May be repeated.
    #[arg(long = "enable", value_name = "KIND")]
    pub enable: Vec<ChannelKind>,

    /// Port for the API server channel.
    #[arg(long, value_name = "PORT")]
    pub api_port: Option<u16>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        for kind in &self.enable {
            insert_nested(&mut dict, kind.key(), "enabled", Value::from(true));
        }

        if let Some(port) = self.api_port {
            insert_nested(
                &mut dict,
                ChannelKind::ApiServer.key(),
                "listen_port",
                Value::from(port),
            );
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

/// Sets `dict[table][key] = value`, creating the table if needed.
fn insert_nested(dict: &mut Dict, table: &str, key: &str, value: Value) {
    let mut inner = match dict.remove(table) {
        Some(Value::Dict(_, inner)) => inner,
        _ => Dict::new(),
    };
    inner.insert(key.into(), value);
    dict.insert(table.into(), Value::from(inner));
}
