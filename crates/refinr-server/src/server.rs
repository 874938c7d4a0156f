// Wires the WebSocket transport, session gateway and HTTP endpoint together.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use refinr_core::config::Config;
use refinr_core::ws_server::{self, WsListener};
use refinr_session::gateway::{self, Command, Gateway};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::http;

/// How long `shutdown` waits for the gateway to drain.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Running server. Dropping it leaves the tasks running; call `shutdown`.
pub struct ServerHandle {
    pub ws_addr: SocketAddr,
    pub http_addr: SocketAddr,
    cmd_tx: mpsc::Sender<Command>,
    gateway: JoinHandle<anyhow::Result<()>>,
    ws_task: JoinHandle<()>,
    http_task: JoinHandle<()>,
}

/// Bind both listeners and spawn the server tasks.
pub async fn start(config: &Config) -> anyhow::Result<ServerHandle> {
    let ws_listener = WsListener::bind(&config.websocket.addr())
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {}", config.websocket.addr()))?;
    let ws_addr = ws_listener.local_addr()?;

    let http_listener = TcpListener::bind(config.http.addr())
        .await
        .with_context(|| format!("failed to bind HTTP listener on {}", config.http.addr()))?;
    let http_addr = http_listener.local_addr()?;

    let (ws_tx, ws_rx) = mpsc::channel(256);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);

    let router = http::build_router(cmd_tx.clone(), config.http.cors_origin.as_deref())?;

    let gateway = tokio::spawn(gateway::run(
        ws_rx,
        cmd_rx,
        Gateway::new(config.session.clone()),
    ));

    let ws_task = tokio::spawn(async move {
        if let Err(e) = ws_server::run(ws_listener, ws_tx).await {
            error!("WebSocket server error: {e}");
        }
    });

    let http_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, router).await {
            error!("HTTP server error: {e}");
        }
    });

    info!("Server ready: WebSocket on {ws_addr}, HTTP on {http_addr}");

    Ok(ServerHandle {
        ws_addr,
        http_addr,
        cmd_tx,
        gateway,
        ws_task,
        http_task,
    })
}

impl ServerHandle {
    /// Stop the gateway (bounded by [`SHUTDOWN_TIMEOUT`]) and both listeners.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let ServerHandle {
            cmd_tx,
            gateway,
            ws_task,
            http_task,
            ..
        } = self;

        let _ = cmd_tx.send(Command::Shutdown).await;
        let outcome = tokio::time::timeout(SHUTDOWN_TIMEOUT, gateway).await;

        ws_task.abort();
        http_task.abort();

        match outcome {
            Ok(joined) => joined.context("session gateway task failed")?,
            Err(_) => {
                warn!("Session gateway did not stop within {SHUTDOWN_TIMEOUT:?}");
                Ok(())
            }
        }
    }
}
