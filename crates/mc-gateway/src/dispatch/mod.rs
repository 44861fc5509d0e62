//! Request dispatch
//!
//! Turns one inbound text frame into at most one synchronous reply, a new
//! tracked backend call, or both a reply and a close request (logout).
//! Messages from one connection are handed in strictly in arrival order
//! by the transport.

mod commands;

pub use commands::{CommandError, CommandFn, CommandOutcome, CommandTable};

use serde_json::{json, Value};

use mc_protocol::{parse_request, ErrorObject, Request, RequestId, Response, LOGIN_METHOD, LOGOUT_METHOD};

use crate::connection::ConnectionHandle;
use crate::session::LoginOutcome;
use crate::state::GatewayState;

/// What the transport should do after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading
    Continue,
    /// Close the connection once queued replies are written
    Close,
}

/// Handle one inbound message from `conn`
pub async fn handle_message(state: &GatewayState, conn: &ConnectionHandle, text: &str) -> Flow {
    let request = match parse_request(text) {
        Ok(request) => request,
        Err(failure) => {
            tracing::debug!(connection = %conn.id(), error = %failure.error, "Malformed request");
            conn.deliver(failure.to_response());
            return Flow::Continue;
        }
    };

    tracing::trace!(connection = %conn.id(), method = %request.method, id = %request.id, "Request");

    if request.method == LOGIN_METHOD {
        handle_login(state, conn, request);
        return Flow::Continue;
    }

    let Some(session) = state.sessions.get(conn.id()) else {
        conn.deliver(Response::error(request.id, ErrorObject::unauthorized()));
        return Flow::Continue;
    };

    if request.method == LOGOUT_METHOD {
        state.sessions.end(conn.id());
        tracing::debug!(connection = %conn.id(), user = %session.username, "Logout requested");
        conn.deliver(Response::success(
            request.id,
            json!({ "success": true, "message": "Logged out successfully" }),
        ));
        return Flow::Close;
    }

    let Request { method, params, id } = request;

    if !session.is_permitted(&method) || !state.commands.contains(&method) {
        tracing::debug!(
            connection = %conn.id(),
            user = %session.username,
            method = %method,
            "Method not found or not permitted"
        );
        conn.deliver(Response::error(id, ErrorObject::method_not_found()));
        return Flow::Continue;
    }

    let outcome = match state.commands.invoke(&method, &params, &session) {
        Some(Ok(outcome)) => outcome,
        Some(Err(e)) => {
            tracing::warn!(connection = %conn.id(), method = %method, error = %e, "Command failed");
            conn.deliver(Response::error(id, ErrorObject::handler_fault(e)));
            return Flow::Continue;
        }
        None => {
            conn.deliver(Response::error(id, ErrorObject::method_not_found()));
            return Flow::Continue;
        }
    };

    match outcome {
        CommandOutcome::Immediate(result) => {
            conn.deliver(Response::success(id, result));
        }
        CommandOutcome::Deferred(payload) => {
            submit_deferred(state, conn, &method, payload, id).await;
        }
    }

    Flow::Continue
}

async fn submit_deferred(
    state: &GatewayState,
    conn: &ConnectionHandle,
    method: &str,
    payload: Value,
    id: RequestId,
) {
    match state
        .calls
        .submit_and_track(state.bridge.as_ref(), payload, conn.clone(), id.clone())
        .await
    {
        Ok(backend_id) => {
            tracing::debug!(
                connection = %conn.id(),
                method = %method,
                backend_id = %backend_id,
                "Deferred call submitted"
            );
        }
        Err(e) => {
            tracing::warn!(connection = %conn.id(), method = %method, error = %e, "Backend rejected call");
            conn.deliver(Response::error(id, ErrorObject::handler_fault(e)));
        }
    }
}

fn handle_login(state: &GatewayState, conn: &ConnectionHandle, request: Request) {
    let credentials = match request.params.as_slice() {
        [Value::String(username), Value::String(password), ..] => Some((username, password)),
        _ => None,
    };

    let outcome = match credentials {
        Some((username, password)) => state.sessions.authenticate(conn.id(), username, password),
        None => {
            state.sessions.end(conn.id());
            LoginOutcome::Rejected
        }
    };

    let result = if outcome.is_success() {
        json!({ "success": true })
    } else {
        json!({ "success": false, "error": "Invalid credentials" })
    };

    conn.deliver(Response::success(request.id, result));
}

/// Tear down everything the gateway holds for a closed connection.
///
/// Pending calls are orphaned: the backend still runs them, but their
/// results are discarded.
pub async fn handle_disconnect(state: &GatewayState, conn: &ConnectionHandle) {
    state.sessions.end(conn.id());
    state.calls.disconnect(conn.id()).await;
    conn.mark_closed();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Outbound;
    use mc_core::config::GatewayConfig;
    use mc_core::error::BridgeError;
    use mc_core::{BackendBridge, CredentialStore, UserEntry};
    use mc_protocol::BackendCallId;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    /// Bridge that numbers calls from 1 and records payloads
    #[derive(Default)]
    struct RecordingBridge {
        next: AtomicU32,
        submitted: Mutex<Vec<Value>>,
    }

    impl BackendBridge for RecordingBridge {
        fn submit(&self, payload: Value) -> Result<BackendCallId, BridgeError> {
            if payload.get("reject").is_some() {
                return Err(BridgeError::MalformedPayload("rejected".into()));
            }
            self.submitted.lock().unwrap().push(payload);
            Ok(BackendCallId::new(self.next.fetch_add(1, Ordering::SeqCst) + 1))
        }

        fn drain(&self) -> Result<HashMap<BackendCallId, Value>, BridgeError> {
            Ok(HashMap::new())
        }
    }

    fn credentials() -> Arc<CredentialStore> {
        let entries = HashMap::from([
            (
                "alice".to_string(),
                UserEntry {
                    password: "wonderland".into(),
                    allowed_methods: vec!["Machine_on".into(), "machine_state".into()],
                },
            ),
            (
                "admin".to_string(),
                UserEntry {
                    password: "password".into(),
                    allowed_methods: vec!["print_uint32".into(), "Self_destruct".into(), "rejecting".into()],
                },
            ),
        ]);
        Arc::new(CredentialStore::from_entries(entries).unwrap())
    }

    fn setup() -> (GatewayState, Arc<RecordingBridge>) {
        let bridge = Arc::new(RecordingBridge::default());
        let mut commands = CommandTable::builtin();
        commands.register("rejecting", |_, _| Ok(CommandOutcome::Deferred(json!({"reject": true}))));
        let state = GatewayState::with_commands(
            GatewayConfig::default(),
            credentials(),
            Arc::clone(&bridge) as Arc<dyn BackendBridge>,
            commands,
        );
        (state, bridge)
    }

    fn connect(state: &GatewayState) -> (ConnectionHandle, mpsc::UnboundedReceiver<Outbound>) {
        ConnectionHandle::channel(state.next_connection_id())
    }

    async fn send(state: &GatewayState, conn: &ConnectionHandle, request: Value) -> Flow {
        handle_message(state, conn, &request.to_string()).await
    }

    fn next_reply(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Value {
        match rx.try_recv() {
            Ok(Outbound::Reply(reply)) => serde_json::to_value(reply).unwrap(),
            other => panic!("Expected a reply, got {:?}", other),
        }
    }

    async fn login(
        state: &GatewayState,
        conn: &ConnectionHandle,
        rx: &mut mpsc::UnboundedReceiver<Outbound>,
        user: &str,
        pw: &str,
    ) -> Value {
        send(state, conn, json!({"method": "Login", "params": [user, pw], "id": 1})).await;
        next_reply(rx)
    }

    #[tokio::test]
    async fn test_unauthenticated_request_is_rejected() {
        let (state, bridge) = setup();
        let (conn, mut rx) = connect(&state);

        for method in ["Machine_on", "print_uint32", "Logout", "nope"] {
            let flow = send(&state, &conn, json!({"method": method, "params": [], "id": 4})).await;
            assert_eq!(flow, Flow::Continue);
            let reply = next_reply(&mut rx);
            assert_eq!(reply["error"]["code"], 401);
            assert_eq!(reply["error"]["message"], "Unauthorized");
            assert_eq!(reply["id"], 4);
        }
        assert!(bridge.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_success_and_failure() {
        let (state, _) = setup();
        let (conn, mut rx) = connect(&state);

        let reply = login(&state, &conn, &mut rx, "alice", "nope").await;
        assert_eq!(reply["result"], json!({"success": false, "error": "Invalid credentials"}));
        assert!(state.sessions.get(conn.id()).is_none());

        let reply = login(&state, &conn, &mut rx, "alice", "wonderland").await;
        assert_eq!(reply, json!({"jsonrpc": "2.0", "id": 1, "result": {"success": true}}));
        assert_eq!(state.sessions.get(conn.id()).unwrap().username, "alice");
    }

    #[tokio::test]
    async fn test_malformed_login_params_end_session() {
        let (state, _) = setup();
        let (conn, mut rx) = connect(&state);
        login(&state, &conn, &mut rx, "alice", "wonderland").await;

        send(&state, &conn, json!({"method": "Login", "params": ["alice"], "id": 2})).await;
        let reply = next_reply(&mut rx);
        assert_eq!(reply["result"]["success"], false);
        assert!(state.sessions.get(conn.id()).is_none());
    }

    #[tokio::test]
    async fn test_immediate_and_forbidden_calls() {
        let (state, _) = setup();
        let (conn, mut rx) = connect(&state);
        login(&state, &conn, &mut rx, "alice", "wonderland").await;

        send(&state, &conn, json!({"method": "Machine_on", "params": [], "id": 7})).await;
        let reply = next_reply(&mut rx);
        assert_eq!(reply["id"], 7);
        assert_eq!(reply["result"], json!({"success": true, "message": "Machine is now on."}));

        send(&state, &conn, json!({"method": "print_uint32", "params": [1], "id": 8})).await;
        let reply = next_reply(&mut rx);
        assert_eq!(reply["id"], 8);
        assert_eq!(reply["error"]["code"], 32601);

        // Session survives the forbidden call
        assert!(state.sessions.get(conn.id()).is_some());
    }

    #[tokio::test]
    async fn test_permitted_but_unknown_method_looks_forbidden() {
        let (state, _) = setup();
        let (conn, mut rx) = connect(&state);
        login(&state, &conn, &mut rx, "admin", "password").await;

        send(&state, &conn, json!({"method": "Self_destruct", "params": [], "id": 3})).await;
        let reply = next_reply(&mut rx);
        assert_eq!(reply["error"]["code"], 32601);
        assert_eq!(reply["error"]["message"], "Method not found or insufficient permissions");
    }

    #[tokio::test]
    async fn test_deferred_call_is_tracked_without_reply() {
        let (state, bridge) = setup();
        let (conn, mut rx) = connect(&state);
        login(&state, &conn, &mut rx, "admin", "password").await;

        send(&state, &conn, json!({"method": "print_uint32", "params": [42], "id": 9})).await;
        assert!(rx.try_recv().is_err());
        assert!(state.calls.is_tracked(BackendCallId::new(1)));
        assert_eq!(
            bridge.submitted.lock().unwrap().as_slice(),
            &[json!({"call_name": "print_uint32", "value": 42})]
        );

        let summary = state
            .calls
            .resolve_all(HashMap::from([(BackendCallId::new(1), json!({"value": 42}))]))
            .await;
        assert_eq!(summary.delivered, 1);
        assert_eq!(next_reply(&mut rx), json!({"jsonrpc": "2.0", "id": 9, "result": {"value": 42}}));
    }

    #[tokio::test]
    async fn test_handler_fault_reply() {
        let (state, _) = setup();
        let (conn, mut rx) = connect(&state);
        login(&state, &conn, &mut rx, "admin", "password").await;

        send(&state, &conn, json!({"method": "print_uint32", "params": ["x"], "id": 5})).await;
        let reply = next_reply(&mut rx);
        assert_eq!(reply["error"]["code"], 500);
        let message = reply["error"]["message"].as_str().unwrap();
        assert!(message.starts_with("Error executing method: "), "{}", message);
        assert!(state.calls.is_empty());

        send(&state, &conn, json!({"method": "rejecting", "params": [], "id": 6})).await;
        let reply = next_reply(&mut rx);
        assert_eq!(reply["error"]["code"], 500);
        assert!(state.calls.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_message_keeps_connection_open() {
        let (state, _) = setup();
        let (conn, mut rx) = connect(&state);

        assert_eq!(handle_message(&state, &conn, "{oops").await, Flow::Continue);
        let reply = next_reply(&mut rx);
        assert_eq!(reply["error"]["code"], 32700);
        assert_eq!(reply["id"], Value::Null);

        assert_eq!(
            handle_message(&state, &conn, r#"{"id": 11, "params": []}"#).await,
            Flow::Continue
        );
        let reply = next_reply(&mut rx);
        assert_eq!(reply["error"]["code"], 32600);
        assert_eq!(reply["id"], 11);
    }

    #[tokio::test]
    async fn test_logout_replies_then_closes() {
        let (state, _) = setup();
        let (conn, mut rx) = connect(&state);
        login(&state, &conn, &mut rx, "alice", "wonderland").await;

        let flow = send(&state, &conn, json!({"method": "Logout", "id": "bye"})).await;
        assert_eq!(flow, Flow::Close);
        let reply = next_reply(&mut rx);
        assert_eq!(reply["id"], "bye");
        assert_eq!(reply["result"], json!({"success": true, "message": "Logged out successfully"}));
        assert!(state.sessions.get(conn.id()).is_none());
    }

    #[tokio::test]
    async fn test_disconnect_clears_session_and_calls() {
        let (state, _) = setup();
        let (conn, mut rx) = connect(&state);
        login(&state, &conn, &mut rx, "alice", "wonderland").await;
        send(&state, &conn, json!({"method": "machine_state", "params": ["on"], "id": 2})).await;
        assert_eq!(state.calls.pending_for(conn.id()), 1);

        handle_disconnect(&state, &conn).await;
        assert!(state.sessions.get(conn.id()).is_none());
        assert!(state.calls.is_empty());
        assert!(!conn.is_open());

        // Idempotent
        handle_disconnect(&state, &conn).await;
        assert!(state.calls.is_empty());
    }
}
