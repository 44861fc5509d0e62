//! Request and reply messages
//!
//! Requests are loosely shaped (`{method, params, id}`, no `jsonrpc` field
//! required) and parsed by hand so that a broken request can still be
//! answered with the best identifier we could recover. Replies always
//! carry `jsonrpc: "2.0"`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::id::RequestId;

/// Version string stamped on every reply
pub const JSONRPC_VERSION: &str = "2.0";

/// Reserved method that creates a session for the connection
pub const LOGIN_METHOD: &str = "Login";

/// Reserved method that ends the session and closes the connection
pub const LOGOUT_METHOD: &str = "Logout";

/// A parsed client request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Method name
    pub method: String,
    /// Positional parameters
    #[serde(default)]
    pub params: Vec<Value>,
    /// Client token echoed in the reply
    #[serde(default)]
    pub id: RequestId,
}

impl Request {
    /// Create a new request
    pub fn new(method: impl Into<String>, params: Vec<Value>, id: impl Into<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            id: RequestId::new(id),
        }
    }
}

/// A request that could not be decoded
#[derive(Debug)]
pub struct ParseFailure {
    /// Identifier recovered from the message, if it was a JSON object with one
    pub id: Option<RequestId>,
    /// What was wrong with it
    pub error: ProtocolError,
}

impl ParseFailure {
    /// Error code to report for this failure
    pub fn code(&self) -> ErrorCode {
        match self.error {
            ProtocolError::Parse(_) => ErrorCode::ParseError,
            _ => ErrorCode::InvalidRequest,
        }
    }

    /// Build the error reply for this failure
    pub fn to_response(&self) -> Response {
        let id = self.id.clone().unwrap_or_default();
        Response::error(id, ErrorObject::new(self.code(), self.error.to_string()))
    }
}

/// Parse one inbound message
pub fn parse_request(text: &str) -> Result<Request, ParseFailure> {
    let value: Value = serde_json::from_str(text).map_err(|e| ParseFailure {
        id: None,
        error: ProtocolError::Parse(e),
    })?;

    let Value::Object(mut obj) = value else {
        return Err(ParseFailure {
            id: None,
            error: ProtocolError::NotAnObject,
        });
    };

    let id = obj.remove("id").map(RequestId::from);
    let fail = |error| ParseFailure {
        id: id.clone(),
        error,
    };

    let method = match obj.remove("method") {
        Some(Value::String(method)) => method,
        _ => return Err(fail(ProtocolError::MissingMethod)),
    };

    let params = match obj.remove("params") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(params)) => params,
        Some(_) => return Err(fail(ProtocolError::InvalidParams)),
    };

    Ok(Request {
        method,
        params,
        id: id.unwrap_or_default(),
    })
}

/// Error codes used on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// No session on this connection
    Unauthorized,
    /// Unknown method, or one the session may not call
    MethodNotFound,
    /// The command handler failed
    HandlerFault,
    /// Message body was not JSON
    ParseError,
    /// Message was JSON but not a request
    InvalidRequest,
}

impl ErrorCode {
    /// Numeric code sent to the client
    pub fn as_i64(self) -> i64 {
        match self {
            ErrorCode::Unauthorized => 401,
            ErrorCode::MethodNotFound => 32601,
            ErrorCode::HandlerFault => 500,
            ErrorCode::ParseError => 32700,
            ErrorCode::InvalidRequest => 32600,
        }
    }

    /// Map a numeric code back, if it is one of ours
    pub fn from_i64(code: i64) -> Option<Self> {
        match code {
            401 => Some(ErrorCode::Unauthorized),
            32601 => Some(ErrorCode::MethodNotFound),
            500 => Some(ErrorCode::HandlerFault),
            32700 => Some(ErrorCode::ParseError),
            32600 => Some(ErrorCode::InvalidRequest),
            _ => None,
        }
    }
}

/// Error body of a reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

impl ErrorObject {
    /// Create an error body
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_i64(),
            message: message.into(),
        }
    }

    /// The `401` reply body
    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "Unauthorized")
    }

    /// The `32601` reply body; deliberately the same for unknown and forbidden methods
    pub fn method_not_found() -> Self {
        Self::new(
            ErrorCode::MethodNotFound,
            "Method not found or insufficient permissions",
        )
    }

    /// The `500` reply body
    pub fn handler_fault(description: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::HandlerFault,
            format!("Error executing method: {}", description),
        )
    }
}

/// `result` or `error` half of a reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePayload {
    Result(Value),
    Error(ErrorObject),
}

/// A reply sent to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

impl Response {
    /// Successful reply
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: ResponsePayload::Result(result),
        }
    }

    /// Error reply
    pub fn error(id: RequestId, error: ErrorObject) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: ResponsePayload::Error(error),
        }
    }

    /// Result value, if this is a success reply
    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            ResponsePayload::Result(value) => Some(value),
            ResponsePayload::Error(_) => None,
        }
    }

    /// Error body, if this is an error reply
    pub fn error_object(&self) -> Option<&ErrorObject> {
        match &self.payload {
            ResponsePayload::Result(_) => None,
            ResponsePayload::Error(error) => Some(error),
        }
    }

    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Build a request object as sent by clients
pub fn request_object(method: &str, params: Vec<Value>, id: Value) -> Value {
    let mut obj = Map::new();
    obj.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.to_string()));
    obj.insert("id".to_string(), id);
    obj.insert("method".to_string(), Value::String(method.to_string()));
    obj.insert("params".to_string(), Value::Array(params));
    Value::Object(obj)
}
