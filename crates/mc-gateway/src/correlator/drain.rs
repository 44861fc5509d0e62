//! Periodic drain cycle
//!
//! One task owns the bridge's flush/drain side. Every tick it pushes
//! buffered submissions to the executor, collects whatever has completed
//! and routes the results back through the correlator. When a pending-call
//! time-to-live is configured, stale records are swept on the same tick.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::ResolveSummary;
use crate::state::GatewayState;

/// Run the drain loop until `cancel` fires
pub async fn run_drain_loop(state: Arc<GatewayState>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(state.config.drain_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval = ?state.config.drain_interval,
        ttl = ?state.config.pending_call_ttl,
        "Starting drain loop"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                drain_once(&state).await;
            }
            _ = cancel.cancelled() => {
                tracing::info!("Drain loop shutting down");
                break;
            }
        }
    }
}

/// One flush, drain, resolve pass (plus the TTL sweep, if enabled)
pub async fn drain_once(state: &GatewayState) -> ResolveSummary {
    if let Err(e) = state.bridge.flush() {
        tracing::warn!(error = %e, "Backend flush failed");
    }

    let summary = match state.bridge.drain() {
        Ok(completions) => state.calls.resolve_all(completions).await,
        Err(e) => {
            tracing::warn!(error = %e, "Backend drain failed");
            ResolveSummary::default()
        }
    };

    if summary != ResolveSummary::default() {
        tracing::debug!(
            delivered = summary.delivered,
            dropped = summary.dropped,
            unclaimed = summary.unclaimed,
            pending = state.calls.len(),
            "Drain cycle"
        );
    }

    if let Some(ttl) = state.config.pending_call_ttl {
        state.calls.expire(ttl).await;
    }

    summary
}
