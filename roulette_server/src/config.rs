//! Server configuration, read from environment variables.

use crate::error::SignalingError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Env var holding the connection liveness timeout in seconds.
pub const CLIENT_TIMEOUT_ENV: &str = "ROULETTE_CLIENT_TIMEOUT_SECS";
/// Env var holding the status text sent with `waiting`.
pub const WAITING_MESSAGE_ENV: &str = "ROULETTE_WAITING_MESSAGE";

const DEFAULT_CLIENT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_WAITING_MESSAGE: &str = "Searching for a partner...";

/// Configuration for the signaling server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// A connection that has not polled for this long is considered lost.
    pub client_timeout: Duration,
    /// Status text delivered with every `waiting` event.
    pub waiting_message: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            client_timeout: Duration::from_secs(DEFAULT_CLIENT_TIMEOUT_SECS),
            waiting_message: DEFAULT_WAITING_MESSAGE.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load from the process environment, falling back to defaults for unset keys.
    pub fn from_env() -> Result<Self, SignalingError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve each key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SignalingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(CLIENT_TIMEOUT_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|e| SignalingError::Config {
                key: CLIENT_TIMEOUT_ENV,
                reason: format!("{e}"),
            })?;
            if secs == 0 {
                return Err(SignalingError::Config {
                    key: CLIENT_TIMEOUT_ENV,
                    reason: "must be greater than zero".to_string(),
                });
            }
            config.client_timeout = Duration::from_secs(secs);
        }

        if let Some(message) = lookup(WAITING_MESSAGE_ENV) {
            if message.trim().is_empty() {
                return Err(SignalingError::Config {
                    key: WAITING_MESSAGE_ENV,
                    reason: "must not be empty".to_string(),
                });
            }
            config.waiting_message = message;
        }

        Ok(config)
    }
}
