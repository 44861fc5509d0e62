//! mc-cli: Command-line client for the machine gateway
//!
//! Provides the `mcctl` binary and the WebSocket client it is built on.

pub mod client;
pub mod output;

pub use client::GatewayClient;
