//! mc-core: Core abstractions and configuration for the machine gateway
//!
//! This crate provides the shared types, the backend bridge trait, the
//! credential store and configuration structures used by the gateway
//! and the CLI.

pub mod bridge;
pub mod config;
pub mod credentials;
pub mod error;
pub mod types;

pub use bridge::BackendBridge;
pub use credentials::{CredentialStore, UserEntry};
pub use error::McError;
pub use types::ConnectionId;
