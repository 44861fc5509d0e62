//! WebSocket server
//!
//! Accepts client connections over WebSocket (on `/` and `/ws`) and runs
//! one reader loop and one writer task per connection.

mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::state::GatewayState;

/// Shared by every connection handler
#[derive(Clone)]
pub(crate) struct ServerContext {
    pub state: Arc<GatewayState>,
    pub shutdown: CancellationToken,
}

/// WebSocket front end of the gateway
pub struct GatewayServer {
    /// Gateway state
    state: Arc<GatewayState>,
    /// Cancellation token for shutdown
    shutdown_token: Option<CancellationToken>,
}

impl GatewayServer {
    /// Create a new server
    pub fn new(state: Arc<GatewayState>) -> Self {
        Self {
            state,
            shutdown_token: None,
        }
    }

    /// Set the shutdown token (call before run)
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = Some(token);
        self
    }

    fn shutdown(&self) -> CancellationToken {
        self.shutdown_token.clone().unwrap_or_default()
    }

    /// The HTTP router carrying the WebSocket endpoints
    pub fn router(&self) -> Router {
        let ctx = ServerContext {
            state: Arc::clone(&self.state),
            shutdown: self.shutdown(),
        };

        Router::new()
            .route("/", get(ws::upgrade))
            .route("/ws", get(ws::upgrade))
            .with_state(ctx)
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> Result<()> {
        let address = &self.state.config.bind_address;
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("Failed to bind to {}", address))?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!("Gateway listening on ws://{}", local_addr);

        let shutdown = self.shutdown();
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("WebSocket server failed")?;

        tracing::info!("Gateway server stopped");
        Ok(())
    }
}
