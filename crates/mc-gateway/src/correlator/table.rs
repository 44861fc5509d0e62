//! In-flight call table
//!
//! Two tables are kept in lock-step: the calls themselves, keyed by
//! backend call ID, and a per-connection index of outstanding call IDs so
//! that a disconnect only touches that connection's calls. Every mutation
//! takes the coordination write lock, so no reader of both tables can see
//! one updated without the other.

use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, RwLockWriteGuard};

use mc_core::{BackendBridge, ConnectionId};
use mc_core::error::BridgeError;
use mc_protocol::{BackendCallId, RequestId, Response};
use serde_json::Value;

use crate::connection::ConnectionHandle;

/// An outstanding deferred call
#[derive(Debug, Clone)]
pub struct InFlightCall {
    /// ID the backend will report the result under
    pub backend_id: BackendCallId,
    /// Connection that made the request
    pub connection: ConnectionHandle,
    /// Client's own request ID, echoed in the reply
    pub request_id: RequestId,
    /// When the call was submitted
    pub submitted_at: Instant,
}

/// What one `resolve_all` pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    /// Replies queued to open connections
    pub delivered: usize,
    /// Records resolved whose connection had already closed
    pub dropped: usize,
    /// Completions with no record (orphaned, expired or unknown)
    pub unclaimed: usize,
}

/// Tracks every outstanding backend call and routes completions back
pub struct CallCorrelator {
    /// Coordination lock; the unit type means it guards no data of its own
    inner: RwLock<()>,
    /// Records indexed by backend call ID
    calls: DashMap<BackendCallId, InFlightCall>,
    /// Outstanding backend call IDs per connection
    by_connection: DashMap<ConnectionId, HashSet<BackendCallId>>,
}

impl CallCorrelator {
    /// Create an empty correlator
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(()),
            calls: DashMap::new(),
            by_connection: DashMap::new(),
        }
    }

    async fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.inner.write().await
    }

    /// Record a pending call.
    ///
    /// A `backend_id` that is already tracked means the backend broke its
    /// uniqueness contract; the stale record is logged and replaced.
    pub async fn track(&self, backend_id: BackendCallId, connection: ConnectionHandle, request_id: RequestId) {
        let _lock = self.write().await;
        self.insert_locked(backend_id, connection, request_id);
    }

    /// Submit `payload` to `bridge` and track the returned call, atomically
    /// with respect to `resolve_all`: a completion cannot be processed
    /// before its record exists.
    pub async fn submit_and_track(
        &self,
        bridge: &dyn BackendBridge,
        payload: Value,
        connection: ConnectionHandle,
        request_id: RequestId,
    ) -> Result<BackendCallId, BridgeError> {
        let _lock = self.write().await;
        let backend_id = bridge.submit(payload)?;
        self.insert_locked(backend_id, connection, request_id);
        Ok(backend_id)
    }

    fn insert_locked(&self, backend_id: BackendCallId, connection: ConnectionHandle, request_id: RequestId) {
        let connection_id = connection.id();
        let record = InFlightCall {
            backend_id,
            connection,
            request_id,
            submitted_at: Instant::now(),
        };

        if let Some(stale) = self.calls.insert(backend_id, record) {
            tracing::error!(
                backend_id = %backend_id,
                stale_connection = %stale.connection.id(),
                connection = %connection_id,
                "Backend reused an outstanding call ID; overwriting stale record"
            );
            self.unindex(stale.connection.id(), backend_id);
        }

        self.by_connection
            .entry(connection_id)
            .or_default()
            .insert(backend_id);

        tracing::debug!(backend_id = %backend_id, connection = %connection_id, "Tracking call");
    }

    fn unindex(&self, connection: ConnectionId, backend_id: BackendCallId) {
        if let Some(mut ids) = self.by_connection.get_mut(&connection) {
            ids.remove(&backend_id);
        }
        self.by_connection.remove_if(&connection, |_, ids| ids.is_empty());
    }

    /// Route a batch of completions to their connections.
    ///
    /// Each claimed record is removed whether or not its connection is
    /// still open. Completions nobody claims are discarded.
    pub async fn resolve_all(&self, completions: HashMap<BackendCallId, Value>) -> ResolveSummary {
        let mut summary = ResolveSummary::default();
        if completions.is_empty() {
            return summary;
        }

        let _lock = self.write().await;

        for (backend_id, result) in completions {
            let Some((_, call)) = self.calls.remove(&backend_id) else {
                tracing::debug!(backend_id = %backend_id, "Discarding unclaimed completion");
                summary.unclaimed += 1;
                continue;
            };

            let connection_id = call.connection.id();
            self.unindex(connection_id, backend_id);

            if call.connection.deliver(Response::success(call.request_id, result)) {
                summary.delivered += 1;
            } else {
                tracing::debug!(
                    backend_id = %backend_id,
                    connection = %connection_id,
                    "Connection closed before result arrived; reply dropped"
                );
                summary.dropped += 1;
            }
        }

        summary
    }

    /// Forget every pending call of a connection. Idempotent.
    ///
    /// The backend is not told; the calls still run and their results are
    /// discarded when they come back.
    pub async fn disconnect(&self, connection: ConnectionId) -> Vec<BackendCallId> {
        let _lock = self.write().await;

        let Some((_, ids)) = self.by_connection.remove(&connection) else {
            return Vec::new();
        };

        let orphaned: Vec<BackendCallId> = ids.into_iter().collect();
        for backend_id in &orphaned {
            self.calls.remove(backend_id);
        }

        if !orphaned.is_empty() {
            tracing::info!(
                connection = %connection,
                orphaned = orphaned.len(),
                "Dropped pending calls of closed connection"
            );
        }

        orphaned
    }

    /// Evict calls that have been pending longer than `ttl`
    pub async fn expire(&self, ttl: Duration) -> Vec<BackendCallId> {
        let _lock = self.write().await;

        let now = Instant::now();
        let expired: Vec<(BackendCallId, ConnectionId)> = self
            .calls
            .iter()
            .filter(|call| now.duration_since(call.submitted_at) > ttl)
            .map(|call| (call.backend_id, call.connection.id()))
            .collect();

        for (backend_id, connection) in &expired {
            self.calls.remove(backend_id);
            self.unindex(*connection, *backend_id);
            tracing::warn!(
                backend_id = %backend_id,
                connection = %connection,
                ttl = ?ttl,
                "Evicted pending call past its time-to-live"
            );
        }

        expired.into_iter().map(|(backend_id, _)| backend_id).collect()
    }

    /// Whether `backend_id` is currently pending
    pub fn is_tracked(&self, backend_id: BackendCallId) -> bool {
        self.calls.contains_key(&backend_id)
    }

    /// Number of pending calls owned by `connection`
    pub fn pending_for(&self, connection: ConnectionId) -> usize {
        self.by_connection.get(&connection).map(|ids| ids.len()).unwrap_or(0)
    }

    /// Number of pending calls
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

impl Default for CallCorrelator {
    fn default() -> Self {
        Self::new()
    }
}
