//! Identifier types
//!
//! Two identifiers travel with every deferred call: the client's own
//! [`RequestId`], echoed back verbatim, and the [`BackendCallId`] the
//! executor assigns on submission.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Client-chosen request token.
///
/// Any JSON value is accepted and returned untouched. Uniqueness is the
/// client's business; the gateway never compares two of these.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Value);

impl RequestId {
    /// Create a request ID from any JSON value
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    /// The null ID used when a request carried none
    pub fn null() -> Self {
        Self(Value::Null)
    }

    /// Get the raw JSON value
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Value> for RequestId {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Correlation token assigned by the backend executor.
///
/// Unique only among calls that are still outstanding; the executor may
/// hand the same number out again once a call has been retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BackendCallId(pub u32);

impl BackendCallId {
    /// Create a new backend call ID
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for BackendCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

impl From<u32> for BackendCallId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_id_is_transparent() {
        let id = RequestId::new(json!({"seq": 7, "tag": "a"}));
        let encoded = serde_json::to_value(&id).unwrap();
        assert_eq!(encoded, json!({"seq": 7, "tag": "a"}));
    }

    #[test]
    fn test_request_id_default_is_null() {
        assert_eq!(RequestId::default(), RequestId::null());
        assert_eq!(format!("{}", RequestId::null()), "null");
    }

    #[test]
    fn test_backend_call_id_display() {
        assert_eq!(format!("{}", BackendCallId::new(42)), "call-42");
    }
}
