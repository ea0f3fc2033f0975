// Draft coordinator entry point.
//
// Startup sequence:
// 1. Initialize tracing
// 2. Load config
// 3. Build the room registry and channels
// 4. Spawn the gateway task
// 5. Run the coordinator event loop until shutdown

use draft_coordinator::app::{self, AppState};
use draft_coordinator::config;
use draft_coordinator::gateway;
use draft_coordinator::registry::RoomRegistry;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Draft coordinator starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: gateway port {}, turn clock {}s, preview {}",
        config.gateway.port, config.draft.turn_seconds, config.render.preview_limit
    );

    // 3. Build the room registry and channels
    let (bridge_tx, bridge_rx) = mpsc::channel(256);
    let (timer_tx, timer_rx) = mpsc::channel(64);
    let (out_tx, out_rx) = mpsc::channel(256);

    let registry = RoomRegistry::new(config.draft.turn_duration(), timer_tx);
    let state = AppState::new(config.clone(), registry);

    // 4. Spawn the gateway task
    let port = config.gateway.port;
    let gateway_handle = tokio::spawn(async move {
        if let Err(e) = gateway::run(port, bridge_tx, out_rx).await {
            error!("Gateway error: {e:#}");
        }
    });

    info!("Coordinator ready. Gateway listening on 127.0.0.1:{port}");

    // 5. Run the coordinator event loop until shutdown
    tokio::select! {
        result = app::run(bridge_rx, timer_rx, out_tx, state) => {
            if let Err(e) = result {
                error!("Event loop error: {e:#}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // The gateway loops forever; stop it explicitly.
    gateway_handle.abort();

    info!("Draft coordinator shut down cleanly");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("draft_coordinator=info,warn")),
        )
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
