//! Controller command table
//!
//! Each command is a plain function of the request parameters and the
//! caller's session. It either answers on the spot or hands back a payload
//! for the backend executor, whose result is delivered later by the drain
//! cycle.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::{json, Value};
use thiserror::Error;

use crate::session::Session;

/// What a command produced
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// Reply with this result now
    Immediate(Value),
    /// Submit this payload to the backend and reply when it completes
    Deferred(Value),
}

/// A command that could not run
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("missing parameter '{0}'")]
    MissingParam(&'static str),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam { name: &'static str, reason: String },

    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// Signature shared by all command handlers
pub type CommandFn = fn(&[Value], &Session) -> Result<CommandOutcome, CommandError>;

/// Commands by method name
#[derive(Clone, Default)]
pub struct CommandTable {
    commands: HashMap<String, CommandFn>,
}

impl CommandTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The controller's command set
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.register("Machine_on", machine_on);
        table.register("Machine_off", machine_off);
        table.register("machine_state", machine_state);
        table.register("print_uint32", print_uint32);
        table
    }

    /// Add or replace a command
    pub fn register(&mut self, method: impl Into<String>, handler: CommandFn) {
        self.commands.insert(method.into(), handler);
    }

    /// Whether `method` is a known command
    pub fn contains(&self, method: &str) -> bool {
        self.commands.contains_key(method)
    }

    /// Registered method names, sorted
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run `method`. Returns `None` for an unknown method.
    ///
    /// A panicking handler is reported as [`CommandError::Panicked`].
    pub fn invoke(
        &self,
        method: &str,
        params: &[Value],
        session: &Session,
    ) -> Option<Result<CommandOutcome, CommandError>> {
        let handler = self.commands.get(method)?;
        let result = catch_unwind(AssertUnwindSafe(|| handler(params, session)))
            .unwrap_or_else(|panic| Err(CommandError::Panicked(panic_message(panic.as_ref()))));
        Some(result)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn machine_on(_params: &[Value], session: &Session) -> Result<CommandOutcome, CommandError> {
    tracing::info!(user = %session.username, "Machine turned on");
    Ok(CommandOutcome::Immediate(json!({
        "success": true,
        "message": "Machine is now on.",
    })))
}

fn machine_off(_params: &[Value], session: &Session) -> Result<CommandOutcome, CommandError> {
    tracing::info!(user = %session.username, "Machine turned off");
    Ok(CommandOutcome::Immediate(json!({
        "success": true,
        "message": "Machine is now off.",
    })))
}

/// `machine_state [state?]`: query the machine state, or command it to `"on"`/`"off"`
fn machine_state(params: &[Value], _session: &Session) -> Result<CommandOutcome, CommandError> {
    let mut payload = json!({ "call_name": "machine_state" });

    match params.first() {
        None | Some(Value::Null) => {}
        Some(Value::String(state)) if state == "on" || state == "off" => {
            payload["commanded_state"] = Value::String(state.clone());
        }
        Some(other) => {
            return Err(CommandError::InvalidParam {
                name: "state",
                reason: format!("expected \"on\" or \"off\", got {}", other),
            })
        }
    }

    Ok(CommandOutcome::Deferred(payload))
}

/// `print_uint32 [value]`: have the controller echo an unsigned 32-bit value
fn print_uint32(params: &[Value], _session: &Session) -> Result<CommandOutcome, CommandError> {
    let raw = params.first().ok_or(CommandError::MissingParam("value"))?;
    let value = raw
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| CommandError::InvalidParam {
            name: "value",
            reason: format!("expected an unsigned 32-bit integer, got {}", raw),
        })?;

    Ok(CommandOutcome::Deferred(json!({
        "call_name": "print_uint32",
        "value": value,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_core::ConnectionId;
    use std::collections::HashSet;

    fn session() -> Session {
        Session::new(ConnectionId::new(1), "alice", HashSet::new())
    }

    #[test]
    fn test_builtin_methods() {
        let table = CommandTable::builtin();
        assert_eq!(
            table.methods(),
            vec!["Machine_off", "Machine_on", "machine_state", "print_uint32"]
        );
        assert!(!table.contains("Login"));
    }

    #[test]
    fn test_machine_on_is_immediate() {
        let table = CommandTable::builtin();
        let outcome = table.invoke("Machine_on", &[], &session()).unwrap().unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Immediate(json!({"success": true, "message": "Machine is now on."}))
        );
    }

    #[test]
    fn test_unknown_method() {
        let table = CommandTable::builtin();
        assert!(table.invoke("Self_destruct", &[], &session()).is_none());
    }

    #[test]
    fn test_print_uint32_defers() {
        let table = CommandTable::builtin();
        let outcome = table
            .invoke("print_uint32", &[json!(1234)], &session())
            .unwrap()
            .unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Deferred(json!({"call_name": "print_uint32", "value": 1234}))
        );
    }

    #[test]
    fn test_print_uint32_rejects_bad_values() {
        let table = CommandTable::builtin();
        for params in [vec![], vec![json!(-1)], vec![json!(4_294_967_296u64)], vec![json!("7")]] {
            let result = table.invoke("print_uint32", &params, &session()).unwrap();
            assert!(result.is_err(), "accepted {:?}", params);
        }
    }

    #[test]
    fn test_machine_state_payloads() {
        let table = CommandTable::builtin();

        let query = table.invoke("machine_state", &[], &session()).unwrap().unwrap();
        assert_eq!(query, CommandOutcome::Deferred(json!({"call_name": "machine_state"})));

        let on = table
            .invoke("machine_state", &[json!("on")], &session())
            .unwrap()
            .unwrap();
        assert_eq!(
            on,
            CommandOutcome::Deferred(json!({"call_name": "machine_state", "commanded_state": "on"}))
        );

        let bad = table.invoke("machine_state", &[json!("sideways")], &session()).unwrap();
        assert!(matches!(bad, Err(CommandError::InvalidParam { name: "state", .. })));
    }

    #[test]
    fn test_panicking_handler_is_caught() {
        fn explode(_: &[Value], _: &Session) -> Result<CommandOutcome, CommandError> {
            panic!("boom");
        }

        let mut table = CommandTable::new();
        table.register("explode", explode);

        let result = table.invoke("explode", &[], &session()).unwrap();
        match result {
            Err(CommandError::Panicked(message)) => assert_eq!(message, "boom"),
            other => panic!("Expected panic error, got {:?}", other),
        }
    }
}
