//! relaybot - notification relay
//!
//! Loads the configuration, enables the configured channels and keeps them
//! running until Ctrl-C. Control commands received through the channels
//! (start, stop, reload_conf) are reflected back as notifications; a reload
//! tears all channels down and rebuilds them from the fresh configuration.

use anyhow::Result;
use clap::Parser;
use relaybot::{
    app::{log_configuration, App},
    cli::Cli,
    config::Config,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        // Manually initialize logging for this specific error
        tracing_subscriber::fmt().init();
        error!("Failed to load configuration: {:#}", err);
        std::process::exit(1);
    });

    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("relaybot starting up...");
    log_configuration(&config);

    let app = App::builder(cli, config).build().await?;
    app.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    })
    .await
}
