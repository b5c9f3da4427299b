//! WASI-compatible one-on-one matchmaking and WebRTC signaling server using wstd
//!
//! Anonymous clients ask to be matched, get paired with the longest-waiting
//! client, and then exchange session descriptions, network candidates and
//! chat messages through the server until either side leaves. The server
//! never inspects signaling payloads and never carries media.
//!
//! # Protocol
//!
//! The server uses HTTP long-polling:
//!
//! - **GET /poll?client_id={id}** - Connect (no id) or poll for events
//! - **POST /event** - Send an event (X-Client-Id header required)
//! - **POST /disconnect** - Close the connection (X-Client-Id header required)
//! - **GET /stats** - Connection, queue and session counts
//! - **GET /health** - Health check
//!
//! ## Response Format (server → client)
//!
//! ```json
//! {"client_id": "<uuid>", "events": ["..."]}
//! ```
//!
//! Events are JSON strings:
//! - `{"event":"id-assigned","data":"<uuid>"}` - Your client ID
//! - `{"event":"waiting","data":"Searching for a partner..."}` - Queued
//! - `{"event":"match-found","data":{"role":"initiator","partnerId":"<uuid>"}}` - Paired
//! - `{"event":"offer","data":...}`, `answer`, `ice-candidate` - Signal from partner
//! - `{"event":"receive-message","data":...}` - Chat from partner
//! - `{"event":"peer-disconnected"}` - Partner left
//!
//! ## Client Events (client → server)
//!
//! POST to /event with X-Client-Id header and JSON body:
//! - `{"event":"find-match"}` - Start searching, or skip to the next partner
//! - `{"event":"offer","data":...}`, `answer`, `ice-candidate` - Signal to partner
//! - `{"event":"send-message","data":...}` - Chat to partner
//! - `{"event":"disconnect-manual"}` - Stop
//! - `{"event":"keep-alive"}`
//!
//! # Example
//!
//! ```bash
//! # Start the server
//! wasmtime serve -S common --addr 127.0.0.1:3536 roulette-signaling.wasm
//!
//! # Connect (returns client_id and initial events)
//! curl http://127.0.0.1:3536/poll
//!
//! # Start searching
//! curl -X POST -H "X-Client-Id: <your-id>" -d '{"event":"find-match"}' \
//!   http://127.0.0.1:3536/event
//!
//! # Poll for new events
//! curl "http://127.0.0.1:3536/poll?client_id=<your-id>"
//! ```
//!
//! # Instance lifetime
//!
//! Connections, the waiting queue and pairings live in component memory
//! only. The host must keep one component instance alive and route every
//! request to it. A host that instantiates the component per request (which
//! `wasmtime serve` may do) gives each request an empty server: clients are
//! never matched and every poll opens a fresh connection.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod matchmaker;
pub mod registry;
pub mod relay;
pub mod state;

pub use config::ServerConfig;
pub use error::{ClientRequestError, SignalingError};
pub use handler::handle_request;
pub use matchmaker::{MatchOutcome, Matchmaker, MatchmakerStats, Pairing, PairingSnapshot};
pub use registry::{ConnectionRegistry, MailboxRegistry};
pub use relay::{RelayOutcome, SignalKind, relay};
pub use state::{ServerState, ServerStats};
