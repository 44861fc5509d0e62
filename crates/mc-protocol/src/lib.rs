//! mc-protocol: Wire protocol for the machine controller gateway
//!
//! Every message on a gateway connection is a single JSON object.
//! Clients send `{method, params, id}` requests; the gateway answers
//! with JSON-RPC 2.0 style replies carrying either a `result` or an
//! `error`, always echoing the client's `id`.

pub mod error;
pub mod id;
pub mod message;

pub use error::ProtocolError;
pub use id::{BackendCallId, RequestId};
pub use message::{
    parse_request, request_object, ErrorCode, ErrorObject, ParseFailure, Request, Response,
    ResponsePayload, JSONRPC_VERSION, LOGIN_METHOD, LOGOUT_METHOD,
};
