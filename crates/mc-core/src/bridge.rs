//! Backend bridge abstraction
//!
//! The executor behind the gateway is a black box: it accepts opaque call
//! payloads, hands back a correlation ID straight away, and reports
//! results later on its own schedule. The gateway only ever talks to it
//! through this trait.

use std::collections::HashMap;

use mc_protocol::BackendCallId;
use serde_json::Value;

use crate::error::BridgeError;

/// Submit/drain interface to the backend executor.
///
/// None of these methods may block waiting on the executor.
pub trait BackendBridge: Send + Sync {
    /// Queue a call and return the ID its result will be reported under.
    fn submit(&self, payload: Value) -> Result<BackendCallId, BridgeError>;

    /// Push queued submissions through to the executor.
    ///
    /// Called only from the drain cycle.
    fn flush(&self) -> Result<(), BridgeError> {
        Ok(())
    }

    /// Collect results that completed since the last drain.
    ///
    /// Each submitted call shows up in exactly one drain result, or never
    /// if the executor itself fails. An empty map means nothing is ready.
    fn drain(&self) -> Result<HashMap<BackendCallId, Value>, BridgeError>;
}
