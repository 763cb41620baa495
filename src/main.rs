//! Crew Game Client - headless session runner
//!
//! Connects to the authoritative game server, drives the predictive
//! session loop to its final status and mirrors every state transition to
//! the log. Rendering and input wiring live in embedding collaborators;
//! this binary exercises the core end to end.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crew_game_client::config::Config;
use crew_game_client::game::{WORLD_HEIGHT, WORLD_WIDTH};
use crew_game_client::{NavMesh, Session, SessionStatus};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    let navmesh = match &config.navmesh_path {
        Some(path) => Arc::new(NavMesh::load(path)?),
        None => {
            info!("NAVMESH_PATH not set, using a fully open mesh");
            Arc::new(NavMesh::open(WORLD_WIDTH, WORLD_HEIGHT))
        }
    };

    info!("Starting Crew Game Client");
    info!(
        server_url = %config.server_url,
        player_name = %config.player_name,
        "Connecting"
    );

    tokio::select! {
        status = run_sessions(&config, navmesh) => {
            info!(status = %status, "Client finished");
        }
        _ = shutdown_signal() => {
            info!("Shutdown requested");
        }
    }

    Ok(())
}

/// Run sessions until one ends for good.
///
/// A transport error leaves the session in its `error` state; the reconnect
/// action tears the transport down and builds a fresh one, so this runner
/// stands in for the user pressing "reconnect".
async fn run_sessions(config: &Config, navmesh: Arc<NavMesh>) -> SessionStatus {
    loop {
        let (session, _handles) = match Session::connect(config, navmesh.clone()).await {
            Ok(parts) => parts,
            Err(e) => {
                error!(error = %e, "Could not connect to the game server");
                return SessionStatus::ConnectionFailed;
            }
        };

        let status = session.run().await;
        if status == SessionStatus::Error {
            info!("Transport error, reconnecting");
            tokio::time::sleep(Duration::from_secs(1)).await;
            continue;
        }
        return status;
    }
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
