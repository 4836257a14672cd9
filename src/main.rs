use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use wc26_predictor::api::{self, AppState, ClientLimiter};
use wc26_predictor::config::{self, ServerConfig};
use wc26_predictor::service::{PredictionService, ServiceSlot};
use wc26_predictor::teams::TeamRegistry;

const LIMITER_SWEEP: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    config::load_dotenv();
    config::init_tracing();
    let config = ServerConfig::parse();

    // No artifacts, no socket.
    let service = PredictionService::from_artifact_dir(
        TeamRegistry::world_cup().clone(),
        &config.artifact_dir,
    )
    .with_context(|| format!("load artifacts from {}", config.artifact_dir.display()))?;

    let slot = Arc::new(ServiceSlot::new(service));
    let limiter = Arc::new(ClientLimiter::per_minute(config.rate_limit_per_minute));
    api::spawn_eviction(Arc::clone(&limiter), LIMITER_SWEEP);
    spawn_reload_on_hangup(Arc::clone(&slot), config.artifact_dir.clone());

    let app = api::create_app(AppState::new(slot, limiter));
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, rate_limit = config.rate_limit_per_minute, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
fn spawn_reload_on_hangup(slot: Arc<ServiceSlot>, dir: PathBuf) {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut hangups = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(err) => {
                error!(error = %err, "cannot install SIGHUP handler, reload disabled");
                return;
            }
        };
        while hangups.recv().await.is_some() {
            info!(dir = %dir.display(), "SIGHUP received, reloading artifacts");
            let slot = Arc::clone(&slot);
            let dir = dir.clone();
            match tokio::task::spawn_blocking(move || slot.reload(&dir)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(error = %err, "reload failed, keeping current artifacts"),
                Err(err) => error!(error = %err, "reload task aborted"),
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_slot: Arc<ServiceSlot>, _dir: PathBuf) {}
