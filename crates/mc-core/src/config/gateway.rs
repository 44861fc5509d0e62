//! Gateway configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::{duration_millis, option_duration_secs};
use crate::error::ConfigError;

/// Configuration for the gateway daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Address to bind the WebSocket server to
    pub bind_address: String,

    /// Path to the user credentials file (JSON)
    pub credentials_path: PathBuf,

    /// How often the drain cycle flushes submissions and collects results
    #[serde(rename = "drain_interval_ms", with = "duration_millis")]
    pub drain_interval: Duration,

    /// Most completions collected in a single drain cycle
    pub max_completions_per_drain: usize,

    /// Largest WebSocket message accepted from a client, in bytes
    pub max_message_size: usize,

    /// Evict pending calls older than this. `None` keeps them forever.
    #[serde(
        rename = "pending_call_ttl_secs",
        with = "option_duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub pending_call_ttl: Option<Duration>,

    /// Simulated controller settings
    pub executor: ExecutorConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let config_dir = super::default_config_dir();

        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            credentials_path: config_dir.join("users.json"),
            drain_interval: Duration::from_millis(100),
            max_completions_per_drain: 10,
            max_message_size: 64 * 1024,
            pending_call_ttl: None,
            executor: ExecutorConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Reject settings the gateway cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Invalid("bind_address is empty".to_string()));
        }
        if self.drain_interval.is_zero() {
            return Err(ConfigError::Invalid("drain_interval_ms must be at least 1".to_string()));
        }
        if self.max_completions_per_drain == 0 {
            return Err(ConfigError::Invalid(
                "max_completions_per_drain must be at least 1".to_string(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::Invalid("max_message_size must be at least 1".to_string()));
        }
        if self.pending_call_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(ConfigError::Invalid(
                "pending_call_ttl_secs must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the in-process controller executor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Processing time of every call
    #[serde(rename = "latency_ms", with = "duration_millis")]
    pub latency: Duration,

    /// Upper bound of random extra latency added per call
    #[serde(rename = "jitter_ms", with = "duration_millis")]
    pub jitter: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(5),
            jitter: Duration::ZERO,
        }
    }
}
