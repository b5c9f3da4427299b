//! Matchmaker and pairing store
//!
//! Owns the waiting queue and the partner map. Both live in one structure
//! behind one lock: pairing touches two clients at once, and the pop of a
//! waiting partner must be indivisible from writing both sides of the pair.
//!
//! Events produced by an operation are collected while the lock is held and
//! flushed to the registry before it is released, so no other operation can
//! interleave between a state change and the notifications it causes.

use crate::registry::ConnectionRegistry;
use roulette_protocol::{ClientId, JsonServerEvent, Role, ServerEvent};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// One active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    /// Sends the connection offer.
    pub initiator: ClientId,
    pub receiver: ClientId,
}

impl Pairing {
    /// The other side of the pairing, if `id` is part of it.
    pub fn partner_of(&self, id: ClientId) -> Option<ClientId> {
        if id == self.initiator {
            Some(self.receiver)
        } else if id == self.receiver {
            Some(self.initiator)
        } else {
            None
        }
    }
}

/// Result of a find-match request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Paired(Pairing),
    Waiting,
    /// The requester's connection is already gone; nothing was queued.
    Disconnected,
}

/// Queue and session counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchmakerStats {
    pub waiting: usize,
    pub sessions: usize,
}

/// Consistent copy of the pairing state, taken under a single lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairingSnapshot {
    pub waiting: Vec<ClientId>,
    pub partners: HashMap<ClientId, ClientId>,
}

/// The waiting queue and partner map.
///
/// `partners` is only written through `bind` and `unbind`, which always touch
/// both directions.
#[derive(Debug, Default)]
struct PairingStore {
    waiting: VecDeque<ClientId>,
    partners: HashMap<ClientId, ClientId>,
}

impl PairingStore {
    fn dequeue(&mut self, id: ClientId) -> bool {
        let before = self.waiting.len();
        self.waiting.retain(|waiting| *waiting != id);
        self.waiting.len() != before
    }

    fn bind(&mut self, pairing: Pairing) {
        self.partners.insert(pairing.initiator, pairing.receiver);
        self.partners.insert(pairing.receiver, pairing.initiator);
    }

    /// Remove both directions of `id`'s pairing and return the former partner.
    fn unbind(&mut self, id: ClientId) -> Option<ClientId> {
        let partner = self.partners.remove(&id)?;
        self.partners.remove(&partner);
        Some(partner)
    }
}

/// Events to deliver once the current operation is complete
#[derive(Default)]
struct Outbox {
    events: Vec<(ClientId, JsonServerEvent)>,
}

impl Outbox {
    fn push(&mut self, to: ClientId, event: JsonServerEvent) {
        self.events.push((to, event));
    }

    /// Best-effort delivery; a recipient that vanished is not an error.
    fn flush<R: ConnectionRegistry>(self, registry: &R) {
        for (to, event) in self.events {
            if let Err(e) = registry.send(to, &event) {
                debug!(client = %to, error = %e, "dropping undeliverable event");
            }
        }
    }
}

/// Pairs searching clients and tears pairings down.
pub struct Matchmaker<R> {
    store: Mutex<PairingStore>,
    registry: Arc<R>,
    waiting_message: String,
}

impl<R: ConnectionRegistry> Matchmaker<R> {
    pub fn new(registry: Arc<R>, waiting_message: impl Into<String>) -> Self {
        Self {
            store: Mutex::new(PairingStore::default()),
            registry,
            waiting_message: waiting_message.into(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PairingStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pair `id` with the longest-waiting live client, or queue it.
    ///
    /// Any queue entry or session `id` already has is torn down first, so this
    /// also implements "next". A requester that is no longer live is never
    /// queued or paired.
    pub fn find_match(&self, id: ClientId) -> MatchOutcome {
        let mut store = self.lock();
        let mut outbox = Outbox::default();

        teardown_locked(&mut store, self.registry.as_ref(), id, &mut outbox);

        // A disconnect may have run its teardown between the caller's
        // liveness check and this lock.
        if !self.registry.is_live(id) {
            debug!(client = %id, "ignoring find-match from a lost connection");
            outbox.flush(self.registry.as_ref());
            return MatchOutcome::Disconnected;
        }

        let mut outcome = MatchOutcome::Waiting;
        while let Some(partner) = store.waiting.pop_front() {
            if !self.registry.is_live(partner) {
                debug!(client = %partner, "skipping stale queue entry");
                continue;
            }

            let pairing = Pairing {
                initiator: id,
                receiver: partner,
            };
            store.bind(pairing);
            outbox.push(
                id,
                ServerEvent::MatchFound {
                    role: Role::Initiator,
                    partner_id: partner,
                },
            );
            outbox.push(
                partner,
                ServerEvent::MatchFound {
                    role: Role::Receiver,
                    partner_id: id,
                },
            );
            info!(initiator = %id, receiver = %partner, "matched");
            outcome = MatchOutcome::Paired(pairing);
            break;
        }

        if outcome == MatchOutcome::Waiting {
            store.waiting.push_back(id);
            outbox.push(id, ServerEvent::Waiting(self.waiting_message.clone()));
            debug!(client = %id, queued = store.waiting.len(), "waiting for a partner");
        }

        outbox.flush(self.registry.as_ref());
        outcome
    }

    /// Remove `id` from the queue and end its session, notifying the partner.
    ///
    /// Returns the former partner. Calling this on an idle client is a no-op.
    pub fn teardown(&self, id: ClientId) -> Option<ClientId> {
        let mut store = self.lock();
        let mut outbox = Outbox::default();
        let partner = teardown_locked(&mut store, self.registry.as_ref(), id, &mut outbox);
        outbox.flush(self.registry.as_ref());
        partner
    }

    /// Run `f` with `id`'s partner while the pairing cannot change.
    pub(crate) fn with_partner<T>(
        &self,
        id: ClientId,
        f: impl FnOnce(ClientId, &R) -> T,
    ) -> Option<T> {
        let store = self.lock();
        let partner = *store.partners.get(&id)?;
        Some(f(partner, self.registry.as_ref()))
    }

    pub fn partner_of(&self, id: ClientId) -> Option<ClientId> {
        self.lock().partners.get(&id).copied()
    }

    pub fn is_waiting(&self, id: ClientId) -> bool {
        self.lock().waiting.contains(&id)
    }

    /// Queued clients, head first.
    pub fn waiting_clients(&self) -> Vec<ClientId> {
        self.lock().waiting.iter().copied().collect()
    }

    pub fn snapshot(&self) -> PairingSnapshot {
        let store = self.lock();
        PairingSnapshot {
            waiting: store.waiting.iter().copied().collect(),
            partners: store.partners.clone(),
        }
    }

    pub fn stats(&self) -> MatchmakerStats {
        let store = self.lock();
        MatchmakerStats {
            waiting: store.waiting.len(),
            sessions: store.partners.len() / 2,
        }
    }
}

fn teardown_locked<R: ConnectionRegistry>(
    store: &mut PairingStore,
    registry: &R,
    id: ClientId,
    outbox: &mut Outbox,
) -> Option<ClientId> {
    if store.dequeue(id) {
        debug!(client = %id, "left the queue");
    }

    let partner = store.unbind(id)?;
    if registry.is_live(partner) {
        outbox.push(partner, ServerEvent::PeerDisconnected);
    }
    info!(client = %id, partner = %partner, "session ended");
    Some(partner)
}
