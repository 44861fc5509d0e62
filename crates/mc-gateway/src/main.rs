//! Machine controller gateway daemon
//!
//! Serves the controller's command set to authenticated WebSocket clients
//! and runs the drain cycle that delivers deferred results.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mc_core::config::{self, GatewayConfig};
use mc_gateway::{run_drain_loop, ControllerSim, GatewayServer, GatewayState};

#[derive(Parser)]
#[command(name = "mc-gateway")]
#[command(about = "Machine controller WebSocket gateway")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "MC_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Credentials file (overrides config)
    #[arg(long)]
    users: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Machine gateway starting...");

    let mut config: GatewayConfig = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                GatewayConfig::default()
            })
        } else {
            tracing::info!("Using default configuration");
            GatewayConfig::default()
        }
    };

    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(users) = args.users {
        config.credentials_path = users;
    }
    let credentials = config::prepare_gateway(&config).with_context(|| {
        format!(
            "Failed to start with credentials from {}",
            config.credentials_path.display()
        )
    })?;
    if credentials.is_empty() {
        tracing::warn!("No users configured - all logins will be rejected");
    }

    let bridge = ControllerSim::spawn(config.executor.clone(), config.max_completions_per_drain);
    let state = Arc::new(GatewayState::new(config, Arc::new(credentials), bridge));

    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    let drain = tokio::spawn(run_drain_loop(Arc::clone(&state), cancel.clone()));

    let server = GatewayServer::new(Arc::clone(&state)).with_shutdown_token(cancel.clone());
    let result = server.run().await;

    cancel.cancel();
    let _ = drain.await;

    result?;
    tracing::info!("Gateway shutdown complete");
    Ok(())
}
