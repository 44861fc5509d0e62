//! Core error types for the machine gateway

use mc_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the gateway crates
#[derive(Error, Debug)]
pub enum McError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Backend bridge error
    #[error("Backend error: {0}")]
    Bridge(#[from] BridgeError),

    /// Credential store error
    #[error("Credential error: {0}")]
    Credentials(#[from] CredentialError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a backend bridge
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Payload is not a call the executor understands
    #[error("malformed call payload: {0}")]
    MalformedPayload(String),

    /// `call_name` names no known call
    #[error("unknown call: {0}")]
    UnknownCall(String),

    /// The executor is gone or refusing work
    #[error("executor unavailable: {0}")]
    Unavailable(String),
}

/// Credential store errors
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Credentials file could not be read
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Credentials file is not valid JSON of the expected shape
    #[error("Failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A stored password hash is not valid hex
    #[error("Invalid password hash for user {0}")]
    InvalidHash(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
