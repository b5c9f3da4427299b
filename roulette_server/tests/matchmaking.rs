//! End-to-end matchmaking flows through `ServerState`.

use roulette_protocol::{ClientId, ClientRequest, Payload, Role, ServerEvent};
use roulette_server::{ServerConfig, ServerState};
use serde_json::value::to_raw_value;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;

fn connect(state: &ServerState) -> ClientId {
    let (id, _) = state.connect_or_poll(None);
    id
}

fn poll(state: &ServerState, id: ClientId) -> Vec<ServerEvent<Value>> {
    let (_, raw) = state.connect_or_poll(Some(id));
    raw.iter().map(|event| serde_json::from_str(event).unwrap()).collect()
}

fn raw(value: &Value) -> Payload {
    to_raw_value(value).unwrap()
}

fn send(state: &ServerState, id: ClientId, body: &str) {
    state.handle_raw(id, body).unwrap();
}

fn waiting(state: &ServerState) -> ServerEvent<Value> {
    ServerEvent::Waiting(state.config().waiting_message.clone())
}

#[test]
fn two_strangers_meet_negotiate_and_part() {
    let state = ServerState::default();
    let x = connect(&state);
    let y = connect(&state);

    send(&state, x, r#"{"event":"find-match"}"#);
    assert_eq!(poll(&state, x), vec![waiting(&state)]);
    assert_eq!(state.matchmaker().waiting_clients(), vec![x]);

    send(&state, y, r#"{"event":"find-match"}"#);
    assert_eq!(
        poll(&state, x),
        vec![ServerEvent::MatchFound {
            role: Role::Receiver,
            partner_id: y
        }]
    );
    assert_eq!(
        poll(&state, y),
        vec![ServerEvent::MatchFound {
            role: Role::Initiator,
            partner_id: x
        }]
    );

    let offer = json!({"type": "offer", "sdp": "v=0\r\no=- 1 2 IN IP4 0.0.0.0\r\n"});
    let answer = json!({"type": "answer", "sdp": "v=0\r\n"});
    let candidate = json!({"candidate": "candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host", "sdpMLineIndex": 0});

    state.handle_request(y, ClientRequest::Offer(raw(&offer))).unwrap();
    assert_eq!(poll(&state, x), vec![ServerEvent::Offer(offer)]);

    state.handle_request(x, ClientRequest::Answer(raw(&answer))).unwrap();
    state
        .handle_request(x, ClientRequest::IceCandidate(raw(&candidate)))
        .unwrap();
    assert_eq!(
        poll(&state, y),
        vec![ServerEvent::Answer(answer), ServerEvent::IceCandidate(candidate)]
    );

    assert!(state.disconnect(x));
    assert_eq!(poll(&state, y), vec![ServerEvent::PeerDisconnected]);
    assert!(state.matchmaker().snapshot().partners.is_empty());

    send(&state, y, r#"{"event":"find-match"}"#);
    assert_eq!(poll(&state, y), vec![waiting(&state)]);
}

#[test]
fn next_skips_to_a_new_partner() {
    let state = ServerState::default();
    let x = connect(&state);
    let y = connect(&state);
    let z = connect(&state);

    send(&state, x, r#"{"event":"find-match"}"#);
    send(&state, y, r#"{"event":"find-match"}"#);
    poll(&state, x);
    poll(&state, y);

    // y presses "next" while nobody else is searching
    send(&state, y, r#"{"event":"find-match"}"#);
    assert_eq!(poll(&state, x), vec![ServerEvent::PeerDisconnected]);
    assert_eq!(poll(&state, y), vec![waiting(&state)]);

    send(&state, z, r#"{"event":"find-match"}"#);
    assert_eq!(state.matchmaker().partner_of(z), Some(y));
    assert_eq!(state.matchmaker().partner_of(x), None);
}

#[test]
fn stop_then_signal_is_dropped() {
    let state = ServerState::default();
    let x = connect(&state);
    let y = connect(&state);
    send(&state, x, r#"{"event":"find-match"}"#);
    send(&state, y, r#"{"event":"find-match"}"#);
    poll(&state, x);

    send(&state, y, r#"{"event":"disconnect-manual"}"#);
    send(&state, y, r#"{"event":"disconnect-manual"}"#);
    send(&state, x, r#"{"event":"offer","data":{"sdp":"late"}}"#);

    assert_eq!(poll(&state, x), vec![ServerEvent::PeerDisconnected]);
    let y_events = poll(&state, y);
    assert!(
        !y_events.iter().any(|e| matches!(e, ServerEvent::Offer(_))),
        "offer leaked after stop: {y_events:?}"
    );
}

#[test]
fn silent_waiter_is_never_matched() {
    let state = ServerState::new(ServerConfig::default());
    let ghost = connect(&state);
    let x = connect(&state);
    send(&state, ghost, r#"{"event":"find-match"}"#);

    // The transport loses the ghost without telling the matchmaker.
    state.registry().remove(ghost);

    send(&state, x, r#"{"event":"find-match"}"#);
    assert_eq!(poll(&state, x), vec![waiting(&state)]);
    assert_eq!(state.matchmaker().waiting_clients(), vec![x]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disconnect_racing_find_match_never_strands_a_partner() {
    for _ in 0..200 {
        let state = ServerState::default();
        let waiter = connect(&state);
        let leaver = connect(&state);
        state.handle_request(waiter, ClientRequest::FindMatch).unwrap();

        let searching = {
            let state = state.clone();
            tokio::spawn(async move {
                let _ = state.handle_raw(leaver, r#"{"event":"find-match"}"#);
            })
        };
        let closing = {
            let state = state.clone();
            tokio::spawn(async move {
                state.disconnect(leaver);
            })
        };
        searching.await.unwrap();
        closing.await.unwrap();

        let snapshot = state.matchmaker().snapshot();
        assert!(!snapshot.partners.contains_key(&leaver));
        assert!(!snapshot.waiting.contains(&leaver));

        // Either the match never happened, or the waiter was told it ended.
        let events = poll(&state, waiter);
        let matched = events
            .iter()
            .any(|e| matches!(e, ServerEvent::MatchFound { .. }));
        if matched {
            assert_eq!(events.last(), Some(&ServerEvent::PeerDisconnected));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_clients_never_break_pairings() {
    const CLIENTS: usize = 32;
    const ROUNDS: usize = 50;

    let state = ServerState::default();
    let clients: Arc<Vec<ClientId>> = Arc::new((0..CLIENTS).map(|_| connect(&state)).collect());

    let mut tasks = Vec::new();
    for (n, id) in clients.iter().copied().enumerate() {
        let state = state.clone();
        tasks.push(tokio::spawn(async move {
            for round in 0..ROUNDS {
                let request = match (n + round) % 5 {
                    0 | 1 => ClientRequest::FindMatch,
                    2 => ClientRequest::Offer(raw(&json!({"from": id.to_string(), "round": round}))),
                    3 => ClientRequest::IceCandidate(raw(&json!({"round": round}))),
                    _ => ClientRequest::DisconnectManual,
                };
                state.handle_request(id, request).unwrap();
                tokio::task::yield_now().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let snapshot = state.matchmaker().snapshot();
    let waiting: HashSet<ClientId> = snapshot.waiting.iter().copied().collect();
    assert_eq!(waiting.len(), snapshot.waiting.len(), "duplicate queue entries");
    assert!(snapshot.waiting.len() <= 1, "live clients left waiting: {:?}", snapshot.waiting);
    for (a, b) in &snapshot.partners {
        assert!(!waiting.contains(a));
        assert_eq!(snapshot.partners.get(b), Some(a));
    }

    // A paired client's last pairing event names its final partner. Unpaired
    // clients are not checked: leaving with disconnect-manual sends nothing back.
    for id in clients.iter().copied() {
        let last = poll(&state, id)
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    ServerEvent::MatchFound { .. } | ServerEvent::PeerDisconnected | ServerEvent::Waiting(_)
                )
            })
            .last();
        match (last, snapshot.partners.get(&id)) {
            (Some(ServerEvent::MatchFound { partner_id, .. }), Some(partner)) => {
                assert_eq!(partner_id, *partner)
            }
            (_, Some(partner)) => panic!("{id} is paired with {partner} but was never told"),
            _ => {}
        }
    }
}
