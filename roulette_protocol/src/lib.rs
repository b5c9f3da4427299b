//! Wire protocol for the roulette signaling server.
//!
//! Every message, in both directions, is a JSON envelope carrying the event
//! name and an optional payload:
//!
//! ```json
//! {"event": "match-found", "data": {"role": "initiator", "partnerId": "<uuid>"}}
//! {"event": "peer-disconnected"}
//! ```
//!
//! Signaling payloads (`offer`, `answer`, `ice-candidate`, chat messages) are
//! generic over `S` so the server can carry them without ever looking inside.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identifier of one live client connection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// A fresh random id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for ClientId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ClientId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Which side of a pairing originates the connection offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Initiator,
    Receiver,
}

/// Requests a client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientRequest<S> {
    /// Start searching, or skip the current partner ("next").
    FindMatch,
    /// Session description offer for the partner.
    Offer(S),
    /// Session description answer for the partner.
    Answer(S),
    /// Network candidate for the partner.
    IceCandidate(S),
    /// Text chat message for the partner.
    SendMessage(S),
    /// Leave the queue or the current session.
    DisconnectManual,
    KeepAlive,
}

impl<S> ClientRequest<S> {
    /// The event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ClientRequest::FindMatch => "find-match",
            ClientRequest::Offer(_) => "offer",
            ClientRequest::Answer(_) => "answer",
            ClientRequest::IceCandidate(_) => "ice-candidate",
            ClientRequest::SendMessage(_) => "send-message",
            ClientRequest::DisconnectManual => "disconnect-manual",
            ClientRequest::KeepAlive => "keep-alive",
        }
    }
}

/// Events the server delivers to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent<S> {
    /// First event of every connection.
    IdAssigned(ClientId),
    /// No partner available yet; carries a human readable status.
    Waiting(String),
    MatchFound {
        role: Role,
        #[serde(rename = "partnerId")]
        partner_id: ClientId,
    },
    Offer(S),
    Answer(S),
    IceCandidate(S),
    ReceiveMessage(S),
    /// The partner left the session.
    PeerDisconnected,
}

#[cfg(feature = "json")]
pub use json::*;

#[cfg(feature = "json")]
mod json {
    use super::*;
    use serde::de::{DeserializeOwned, Error as _};
    use serde_json::value::RawValue;

    /// An unparsed JSON payload, relayed byte for byte.
    pub type Payload = Box<RawValue>;

    /// A client request with an opaque JSON payload.
    pub type JsonClientRequest = ClientRequest<Payload>;

    /// A server event with an opaque JSON payload.
    pub type JsonServerEvent = ServerEvent<Payload>;

    const CLIENT_EVENTS: &[&str] = &[
        "find-match",
        "offer",
        "answer",
        "ice-candidate",
        "send-message",
        "disconnect-manual",
        "keep-alive",
    ];

    const SERVER_EVENTS: &[&str] = &[
        "id-assigned",
        "waiting",
        "match-found",
        "offer",
        "answer",
        "ice-candidate",
        "receive-message",
        "peer-disconnected",
    ];

    /// The wire envelope with `data` left as raw text.
    ///
    /// Decoding through a plain struct keeps the payload unparsed whatever
    /// order `event` and `data` arrive in.
    #[derive(Deserialize)]
    struct Envelope {
        event: String,
        #[serde(default)]
        data: Option<Payload>,
    }

    fn payload(data: Option<Payload>) -> Result<Payload, serde_json::Error> {
        data.ok_or_else(|| serde_json::Error::missing_field("data"))
    }

    fn typed<T: DeserializeOwned>(data: Option<Payload>) -> Result<T, serde_json::Error> {
        serde_json::from_str(payload(data)?.get())
    }

    #[derive(Deserialize)]
    struct MatchFoundData {
        role: Role,
        #[serde(rename = "partnerId")]
        partner_id: ClientId,
    }

    impl fmt::Display for JsonServerEvent {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
            f.write_str(&json)
        }
    }

    impl fmt::Display for JsonClientRequest {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
            f.write_str(&json)
        }
    }

    impl FromStr for JsonServerEvent {
        type Err = serde_json::Error;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let Envelope { event, data } = serde_json::from_str(s)?;
            match event.as_str() {
                "id-assigned" => typed(data).map(ServerEvent::IdAssigned),
                "waiting" => typed(data).map(ServerEvent::Waiting),
                "match-found" => {
                    let MatchFoundData { role, partner_id } = typed(data)?;
                    Ok(ServerEvent::MatchFound { role, partner_id })
                }
                "offer" => payload(data).map(ServerEvent::Offer),
                "answer" => payload(data).map(ServerEvent::Answer),
                "ice-candidate" => payload(data).map(ServerEvent::IceCandidate),
                "receive-message" => payload(data).map(ServerEvent::ReceiveMessage),
                "peer-disconnected" => Ok(ServerEvent::PeerDisconnected),
                other => Err(serde_json::Error::unknown_variant(other, SERVER_EVENTS)),
            }
        }
    }

    impl FromStr for JsonClientRequest {
        type Err = serde_json::Error;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let Envelope { event, data } = serde_json::from_str(s)?;
            match event.as_str() {
                "find-match" => Ok(ClientRequest::FindMatch),
                "offer" => payload(data).map(ClientRequest::Offer),
                "answer" => payload(data).map(ClientRequest::Answer),
                "ice-candidate" => payload(data).map(ClientRequest::IceCandidate),
                "send-message" => payload(data).map(ClientRequest::SendMessage),
                "disconnect-manual" => Ok(ClientRequest::DisconnectManual),
                "keep-alive" => Ok(ClientRequest::KeepAlive),
                other => Err(serde_json::Error::unknown_variant(other, CLIENT_EVENTS)),
            }
        }
    }
}
