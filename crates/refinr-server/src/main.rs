// Planning poker server entry point.
//
// Startup sequence:
// 1. Initialize tracing
// 2. Load config (copying defaults on first run)
// 3. Bind listeners, spawn transport, gateway and HTTP tasks
// 4. Wait for Ctrl+C
// 5. Shut down

use anyhow::Context;
use refinr_core::config;
use refinr_server::server;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("refinr starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: websocket={}, http={}, session={:?}",
        config.websocket.addr(),
        config.http.addr(),
        config.session
    );

    let handle = server::start(&config).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Ctrl+C received, shutting down");

    handle.shutdown().await?;
    info!("refinr shut down cleanly");
    Ok(())
}

/// Log to stdout, filtered by `RUST_LOG`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("refinr_core=info,refinr_session=info,refinr_server=info,warn")
        }))
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
