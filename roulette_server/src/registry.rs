//! Connection registry
//!
//! The matchmaker only needs two things from the transport: whether a client
//! is still connected, and a best-effort way to hand it an event. The
//! long-polling transport implements both with one mailbox per connection;
//! events sit in the mailbox until the client polls for them.

use crate::error::SignalingError;
use roulette_protocol::{ClientId, JsonServerEvent};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Lookup and delivery primitives the matchmaker runs on top of.
///
/// `send` is called while the pairing store lock is held, so implementations
/// must only enqueue and never block on the network.
pub trait ConnectionRegistry: Send + Sync {
    /// Whether `id` is a live connection.
    fn is_live(&self, id: ClientId) -> bool;

    /// Queue `event` for delivery to `id`.
    fn send(&self, id: ClientId, event: &JsonServerEvent) -> Result<(), SignalingError>;
}

/// One connection's pending events
#[derive(Debug)]
struct Mailbox {
    events: VecDeque<String>,
    last_seen: Instant,
}

impl Mailbox {
    fn new(now: Instant) -> Self {
        Self {
            events: VecDeque::new(),
            last_seen: now,
        }
    }
}

/// Registry of long-polling connections
#[derive(Debug)]
pub struct MailboxRegistry {
    mailboxes: Mutex<HashMap<ClientId, Mailbox>>,
    /// Connections not seen for this long are no longer live.
    timeout: Duration,
}

impl MailboxRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            mailboxes: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ClientId, Mailbox>> {
        self.mailboxes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a new connection. Its first pending event is `id-assigned`.
    pub fn connect(&self) -> ClientId {
        let id = ClientId::random();
        let mut mailbox = Mailbox::new(Instant::now());
        mailbox
            .events
            .push_back(JsonServerEvent::IdAssigned(id).to_string());
        self.lock().insert(id, mailbox);
        id
    }

    /// Drain pending events for `id`, marking it as seen.
    ///
    /// Returns `None` if there is no such connection.
    pub fn poll(&self, id: ClientId) -> Option<Vec<String>> {
        let mut mailboxes = self.lock();
        let mailbox = mailboxes.get_mut(&id)?;
        mailbox.last_seen = Instant::now();
        Some(mailbox.events.drain(..).collect())
    }

    /// Mark `id` as seen without draining. Returns whether it exists.
    pub fn touch(&self, id: ClientId) -> bool {
        match self.lock().get_mut(&id) {
            Some(mailbox) => {
                mailbox.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Drop the connection. Returns whether it existed.
    pub fn remove(&self, id: ClientId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Remove every connection not seen since `now - timeout` and return their ids.
    pub fn remove_expired(&self, now: Instant) -> Vec<ClientId> {
        let mut mailboxes = self.lock();
        let expired: Vec<ClientId> = mailboxes
            .iter()
            .filter(|(_, mailbox)| now.saturating_duration_since(mailbox.last_seen) >= self.timeout)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            mailboxes.remove(id);
        }
        expired
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl ConnectionRegistry for MailboxRegistry {
    fn is_live(&self, id: ClientId) -> bool {
        self.lock()
            .get(&id)
            .is_some_and(|mailbox| mailbox.last_seen.elapsed() < self.timeout)
    }

    fn send(&self, id: ClientId, event: &JsonServerEvent) -> Result<(), SignalingError> {
        let payload = serde_json::to_string(event)?;
        let mut mailboxes = self.lock();
        let mailbox = mailboxes.get_mut(&id).ok_or(SignalingError::UnknownClient)?;
        mailbox.events.push_back(payload);
        debug!(client = %id, pending = mailbox.events.len(), "queued event");
        Ok(())
    }
}
