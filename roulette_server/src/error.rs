//! Error types for the roulette signaling server
//!
//! Matchmaking itself never fails; these only surface at the transport edge.

use thiserror::Error;

/// Errors that can occur while delivering events or loading configuration
#[derive(Error, Debug)]
pub enum SignalingError {
    /// No live connection with that id
    #[error("Unknown client")]
    UnknownClient,

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration value
    #[error("Invalid config value for {key}: {reason}")]
    Config { key: &'static str, reason: String },
}

/// Errors from client requests
#[derive(Error, Debug)]
pub enum ClientRequestError {
    /// The X-Client-Id header is missing
    #[error("Missing X-Client-Id header")]
    MissingClientId,

    /// The X-Client-Id header is not a UUID
    #[error("Invalid X-Client-Id header: {0}")]
    InvalidClientId(#[from] uuid::Error),

    /// The request body could not be read
    #[error("Failed to read body: {0}")]
    Body(String),

    /// Empty request body
    #[error("Empty request body")]
    Empty,

    /// Malformed or unknown event
    #[error("Invalid event: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Signaling(#[from] SignalingError),
}
