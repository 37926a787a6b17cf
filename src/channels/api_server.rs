//! # API Server
//!
//! This module defines the `ApiServer` channel, an `axum`-based HTTP server
//! that lets an operator control the host from the command line or a script.
//!
//! Endpoints, all under `/api/v1`:
//!
//! - `GET ping`, `GET status`
//! - `POST start`, `POST stop`, `POST reload_conf`
//! - `GET messages`: the most recent notifications, oldest first
//!
//! Notifications sent to this channel are not pushed anywhere; they are kept
//! in a bounded history that `GET messages` returns. The server shuts down
//! gracefully when the channel is cleaned up.

use crate::config::ChannelSettings;
use crate::control::ControlCommand;
use crate::core::{BotControl, Channel, Message};
use crate::task_manager::BackgroundTask;
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace};

/// Configuration for the API server channel.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiServerConfig {
    #[serde(default = "default_listen_ip_address")]
    pub listen_ip_address: IpAddr,
    pub listen_port: u16,
    /// How many recent notifications `GET /api/v1/messages` returns.
    #[serde(default = "default_message_history")]
    pub message_history: usize,
}

fn default_listen_ip_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_message_history() -> usize {
    50
}

impl ChannelSettings for ApiServerConfig {}

/// A notification as recorded by the API server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordedMessage {
    /// RFC 3339 timestamp of when the notification arrived.
    pub received_at: String,
    pub message: Message,
}

type History = Arc<Mutex<VecDeque<RecordedMessage>>>;

#[derive(Clone)]
struct ApiState {
    host: Arc<dyn BotControl>,
    history: History,
}

/// The HTTP control API channel.
pub struct ApiServer {
    local_addr: SocketAddr,
    history: History,
    capacity: usize,
    server: BackgroundTask,
}

impl ApiServer {
    /// Binds the listener and spawns the server.
    ///
    /// Fails if the address cannot be bound, e.g. because the port is taken.
    pub async fn bind(config: ApiServerConfig, host: Arc<dyn BotControl>) -> Result<Self> {
        let addr = SocketAddr::new(config.listen_ip_address, config.listen_port);
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind API server to {}", addr))?;
        let local_addr = listener.local_addr()?;

        let history: History = Arc::new(Mutex::new(VecDeque::with_capacity(
            config.message_history,
        )));
        let app = router(ApiState {
            host,
            history: history.clone(),
        });

        let server = BackgroundTask::spawn("ApiServer", move |mut shutdown_rx| async move {
            let shutdown = async move {
                let _ = shutdown_rx.changed().await;
                trace!("API server received shutdown signal.");
            };
            if let Err(e) = axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("API server error: {}", e);
            }
            trace!("API server task finished.");
        });

        info!(%local_addr, "API server listening.");
        Ok(Self {
            local_addr,
            history,
            capacity: config.message_history,
            server,
        })
    }

    /// The address the server is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A snapshot of the recorded notifications, oldest first.
    pub fn history(&self) -> Vec<RecordedMessage> {
        snapshot(&self.history)
    }
}

fn router(state: ApiState) -> Router {
    let api = Router::new()
        .route("/ping", get(ping))
        .route("/status", get(status))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/reload_conf", post(reload_conf))
        .route("/messages", get(messages));
    Router::new().nest("/api/v1", api).with_state(state)
}

fn snapshot(history: &History) -> Vec<RecordedMessage> {
    history
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .cloned()
        .collect()
}

async fn ping(State(state): State<ApiState>) -> Json<Message> {
    Json(ControlCommand::Ping.execute(state.host.as_ref()))
}

async fn status(State(state): State<ApiState>) -> Json<Message> {
    Json(ControlCommand::Status.execute(state.host.as_ref()))
}

async fn start(State(state): State<ApiState>) -> Json<Message> {
    Json(ControlCommand::Start.execute(state.host.as_ref()))
}

async fn stop(State(state): State<ApiState>) -> Json<Message> {
    Json(ControlCommand::Stop.execute(state.host.as_ref()))
}

async fn reload_conf(State(state): State<ApiState>) -> Json<Message> {
    Json(ControlCommand::ReloadConf.execute(state.host.as_ref()))
}

async fn messages(State(state): State<ApiState>) -> Json<Vec<RecordedMessage>> {
    Json(snapshot(&state.history))
}

#[async_trait]
impl Channel for ApiServer {
    fn name(&self) -> &str {
        "api_server"
    }

    async fn send(&self, message: &Message) -> Result<()> {
        if self.capacity == 0 {
            return Ok(());
        }
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        while history.len() >= self.capacity {
            history.pop_front();
        }
        history.push_back(RecordedMessage {
            received_at: Utc::now().to_rfc3339(),
            message: message.clone(),
        });
        debug!(recorded = history.len(), "Recorded notification for API clients.");
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        info!(local_addr = %self.local_addr, "Stopping API server.");
        self.server.stop().await
    }
}
