//! WASI HTTP server entry point for the long-polling signaling server
//!
//! This module provides the main entry point when running as a WASI HTTP component
//! using `wasmtime serve`.

use roulette_server::{ServerConfig, ServerState, handle_request, logging};
use std::sync::OnceLock;
use tracing::{info, warn};
use wstd::http::{Body, Request, Response};

// Process-wide state, created empty on the first request
static STATE: OnceLock<ServerState> = OnceLock::new();

fn state() -> &'static ServerState {
    STATE.get_or_init(|| {
        logging::init();
        let config = ServerConfig::from_env().unwrap_or_else(|e| {
            warn!(error = %e, "invalid configuration, using defaults");
            ServerConfig::default()
        });
        info!(
            client_timeout_secs = config.client_timeout.as_secs(),
            waiting_message = %config.waiting_message,
            "starting roulette signaling server"
        );
        ServerState::new(config)
    })
}

/// The main HTTP handler for WASI
///
/// This function is called by the WASI runtime for each incoming HTTP request.
#[wstd::http_server]
async fn main(request: Request<Body>) -> Result<Response<Body>, wstd::http::Error> {
    handle_request(request, state()).await
}
