//! Server state management for the roulette signaling server
//!
//! Ties the connection registry, the matchmaker and the relay together and
//! dispatches inbound client events. State is in memory and lives as long as
//! the process.

use crate::config::ServerConfig;
use crate::error::{ClientRequestError, SignalingError};
use crate::matchmaker::Matchmaker;
use crate::registry::MailboxRegistry;
use crate::relay::{SignalKind, relay};
use roulette_protocol::{ClientId, ClientRequest, JsonClientRequest};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Connection, queue and session counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerStats {
    pub connections: usize,
    pub waiting: usize,
    pub sessions: usize,
}

struct Inner {
    registry: Arc<MailboxRegistry>,
    matchmaker: Matchmaker<MailboxRegistry>,
    config: ServerConfig,
}

/// The main server state, cheap to clone
#[derive(Clone)]
pub struct ServerState {
    inner: Arc<Inner>,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl ServerState {
    /// Create empty server state
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(MailboxRegistry::new(config.client_timeout));
        let matchmaker = Matchmaker::new(registry.clone(), config.waiting_message.clone());
        Self {
            inner: Arc::new(Inner {
                registry,
                matchmaker,
                config,
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn matchmaker(&self) -> &Matchmaker<MailboxRegistry> {
        &self.inner.matchmaker
    }

    pub fn registry(&self) -> &MailboxRegistry {
        &self.inner.registry
    }

    /// Open a connection or poll an existing one.
    ///
    /// If `client_id` is `None` or unknown, a new connection is opened.
    /// Returns (client_id, pending_events)
    pub fn connect_or_poll(&self, client_id: Option<ClientId>) -> (ClientId, Vec<String>) {
        if let Some(id) = client_id {
            if let Some(events) = self.inner.registry.poll(id) {
                return (id, events);
            }
            debug!(client = %id, "poll from unknown client, opening a new connection");
        }

        let id = self.inner.registry.connect();
        info!(client = %id, "connected");
        let events = self.inner.registry.poll(id).unwrap_or_default();
        (id, events)
    }

    /// Apply one inbound event from `id`.
    pub fn handle_request(
        &self,
        id: ClientId,
        request: JsonClientRequest,
    ) -> Result<(), SignalingError> {
        if !self.inner.registry.touch(id) {
            return Err(SignalingError::UnknownClient);
        }
        debug!(client = %id, event = request.name(), "client event");

        let matchmaker = &self.inner.matchmaker;
        match request {
            ClientRequest::FindMatch => {
                matchmaker.find_match(id);
            }
            ClientRequest::Offer(payload) => {
                relay(matchmaker, SignalKind::Offer, id, payload);
            }
            ClientRequest::Answer(payload) => {
                relay(matchmaker, SignalKind::Answer, id, payload);
            }
            ClientRequest::IceCandidate(payload) => {
                relay(matchmaker, SignalKind::IceCandidate, id, payload);
            }
            ClientRequest::SendMessage(payload) => {
                relay(matchmaker, SignalKind::ChatMessage, id, payload);
            }
            ClientRequest::DisconnectManual => {
                matchmaker.teardown(id);
            }
            ClientRequest::KeepAlive => {}
        }
        Ok(())
    }

    /// Parse and apply a raw JSON event body.
    ///
    /// Bodies that do not parse never reach the matchmaker.
    pub fn handle_raw(&self, id: ClientId, body: &str) -> Result<(), ClientRequestError> {
        if body.trim().is_empty() {
            return Err(ClientRequestError::Empty);
        }
        let request: JsonClientRequest = body.parse()?;
        self.handle_request(id, request)?;
        Ok(())
    }

    /// The transport lost `id`: end its session and forget the connection.
    ///
    /// Returns whether the connection was still open.
    pub fn disconnect(&self, id: ClientId) -> bool {
        let existed = self.inner.registry.remove(id);
        self.inner.matchmaker.teardown(id);
        if existed {
            info!(client = %id, "disconnected");
        }
        existed
    }

    /// Disconnect every connection that stopped polling.
    pub fn reap_expired(&self) -> Vec<ClientId> {
        self.reap_expired_at(Instant::now())
    }

    pub fn reap_expired_at(&self, now: Instant) -> Vec<ClientId> {
        let expired = self.inner.registry.remove_expired(now);
        for id in &expired {
            self.inner.matchmaker.teardown(*id);
            info!(client = %id, "connection timed out");
        }
        expired
    }

    pub fn stats(&self) -> ServerStats {
        let matchmaker = self.inner.matchmaker.stats();
        ServerStats {
            connections: self.inner.registry.len(),
            waiting: matchmaker.waiting,
            sessions: matchmaker.sessions,
        }
    }
}
