//! Signal relay
//!
//! Forwards signaling payloads to the sender's current partner. Payloads are
//! opaque: they are handed over exactly as received.

use crate::matchmaker::Matchmaker;
use crate::registry::ConnectionRegistry;
use roulette_protocol::{ClientId, Payload, ServerEvent};
use tracing::debug;

/// Kinds of payload the relay forwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
    /// Text chat, delivered to the partner as `receive-message`.
    ChatMessage,
}

impl SignalKind {
    fn into_event<S>(self, payload: S) -> ServerEvent<S> {
        match self {
            SignalKind::Offer => ServerEvent::Offer(payload),
            SignalKind::Answer => ServerEvent::Answer(payload),
            SignalKind::IceCandidate => ServerEvent::IceCandidate(payload),
            SignalKind::ChatMessage => ServerEvent::ReceiveMessage(payload),
        }
    }
}

/// What happened to a relayed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Queued for the partner.
    Forwarded(ClientId),
    /// The sender has no partner; dropped.
    NoPartner,
    /// The partner's connection is gone; dropped.
    Undeliverable(ClientId),
}

/// Forward `payload` from `sender` to its partner.
///
/// The payload is never parsed; the partner receives the exact bytes sent.
pub fn relay<R: ConnectionRegistry>(
    matchmaker: &Matchmaker<R>,
    kind: SignalKind,
    sender: ClientId,
    payload: Payload,
) -> RelayOutcome {
    let outcome = matchmaker.with_partner(sender, |partner, registry| {
        match registry.send(partner, &kind.into_event(payload)) {
            Ok(()) => RelayOutcome::Forwarded(partner),
            Err(e) => {
                debug!(sender = %sender, partner = %partner, error = %e, "partner unreachable");
                RelayOutcome::Undeliverable(partner)
            }
        }
    });

    match outcome {
        Some(outcome) => {
            debug!(sender = %sender, ?kind, ?outcome, "relayed signal");
            outcome
        }
        None => {
            debug!(sender = %sender, ?kind, "no partner, dropping signal");
            RelayOutcome::NoPartner
        }
    }
}
