//! Controller call payloads
//!
//! Deferred commands reach the executor as JSON objects naming the call in
//! `call_name`; results go back in the same shape.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use mc_core::error::BridgeError;

/// Machine power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    fn as_str(self) -> &'static str {
        match self {
            PowerState::On => "on",
            PowerState::Off => "off",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn state_name(state: Option<PowerState>) -> &'static str {
    state.map(PowerState::as_str).unwrap_or("none")
}

/// A call the controller knows how to run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "call_name", rename_all = "snake_case")]
pub enum ControllerCall {
    /// Report the machine state, switching it first if a state is commanded
    MachineState {
        #[serde(default)]
        commanded_state: Option<PowerState>,
    },
    /// Echo a value through the controller
    PrintUint32 { value: u32 },
}

impl ControllerCall {
    const KNOWN: [&'static str; 2] = ["machine_state", "print_uint32"];

    /// Decode a submitted payload
    pub fn from_payload(payload: Value) -> Result<Self, BridgeError> {
        let name = payload
            .get("call_name")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::MalformedPayload("missing string 'call_name'".to_string()))?;

        if !Self::KNOWN.contains(&name) {
            return Err(BridgeError::UnknownCall(name.to_string()));
        }

        serde_json::from_value(payload).map_err(|e| BridgeError::MalformedPayload(e.to_string()))
    }
}

pub(super) fn machine_state_result(current: Option<PowerState>, commanded: Option<PowerState>) -> Value {
    json!({
        "call_name": "machine_state",
        "current_state": state_name(current),
        "requested_state": "none",
        "commanded_state": state_name(commanded),
    })
}

pub(super) fn print_uint32_result(value: u32) -> Value {
    json!({
        "call_name": "print_uint32",
        "value": value,
    })
}
