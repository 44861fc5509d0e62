//! Global gateway state

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mc_core::config::GatewayConfig;
use mc_core::{BackendBridge, ConnectionId, CredentialStore};

use crate::correlator::CallCorrelator;
use crate::dispatch::CommandTable;
use crate::session::SessionStore;

/// Shared state of the gateway daemon
pub struct GatewayState {
    /// Configuration
    pub config: GatewayConfig,
    /// Authenticated sessions
    pub sessions: Arc<SessionStore>,
    /// Outstanding deferred calls
    pub calls: Arc<CallCorrelator>,
    /// Backend executor
    pub bridge: Arc<dyn BackendBridge>,
    /// Controller commands by name
    pub commands: Arc<CommandTable>,
    next_connection_id: AtomicU64,
}

impl GatewayState {
    /// Create gateway state with the built-in command table
    pub fn new(
        config: GatewayConfig,
        credentials: Arc<CredentialStore>,
        bridge: Arc<dyn BackendBridge>,
    ) -> Self {
        Self::with_commands(config, credentials, bridge, CommandTable::builtin())
    }

    /// Create gateway state with a custom command table
    pub fn with_commands(
        config: GatewayConfig,
        credentials: Arc<CredentialStore>,
        bridge: Arc<dyn BackendBridge>,
        commands: CommandTable,
    ) -> Self {
        Self {
            config,
            sessions: Arc::new(SessionStore::new(credentials)),
            calls: Arc::new(CallCorrelator::new()),
            bridge,
            commands: Arc::new(commands),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Allocate an identifier for a newly accepted connection
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }
}
