//! Queue and pairing invariants over random event sequences.

use proptest::prelude::*;
use roulette_protocol::{ClientId, ClientRequest};
use roulette_server::{PairingSnapshot, ServerState};
use std::collections::HashSet;

const CLIENTS: usize = 6;

#[derive(Debug, Clone, Copy)]
enum Op {
    FindMatch(usize),
    Stop(usize),
    Offer(usize),
    /// Transport-level close
    Disconnect(usize),
    /// Connection lost without the matchmaker being told
    Vanish(usize),
    Reconnect(usize),
}

fn op() -> impl Strategy<Value = Op> {
    let client = 0..CLIENTS;
    prop_oneof![
        4 => client.clone().prop_map(Op::FindMatch),
        2 => client.clone().prop_map(Op::Stop),
        1 => client.clone().prop_map(Op::Offer),
        1 => client.clone().prop_map(Op::Disconnect),
        1 => client.clone().prop_map(Op::Vanish),
        1 => client.prop_map(Op::Reconnect),
    ]
}

fn check(snapshot: &PairingSnapshot) -> Result<(), TestCaseError> {
    let waiting: HashSet<ClientId> = snapshot.waiting.iter().copied().collect();
    prop_assert_eq!(waiting.len(), snapshot.waiting.len(), "duplicate queue entry");
    for (a, b) in &snapshot.partners {
        prop_assert!(!waiting.contains(a), "{} is both queued and paired", a);
        prop_assert_ne!(a, b);
        prop_assert_eq!(snapshot.partners.get(b), Some(a), "one-sided pairing");
    }
    Ok(())
}

proptest! {
    #[test]
    fn pairing_state_stays_consistent(ops in proptest::collection::vec(op(), 1..80)) {
        let state = ServerState::default();
        let mut clients: Vec<ClientId> = (0..CLIENTS)
            .map(|_| state.connect_or_poll(None).0)
            .collect();

        for op in ops {
            match op {
                Op::FindMatch(n) => {
                    let _ = state.handle_request(clients[n], ClientRequest::FindMatch);
                }
                Op::Stop(n) => {
                    let _ = state.handle_request(clients[n], ClientRequest::DisconnectManual);
                }
                Op::Offer(n) => {
                    let _ = state.handle_request(
                        clients[n],
                        ClientRequest::Offer(
                            serde_json::value::to_raw_value(&serde_json::json!({"n": n})).unwrap(),
                        ),
                    );
                }
                Op::Disconnect(n) => {
                    state.disconnect(clients[n]);
                }
                Op::Vanish(n) => {
                    state.registry().remove(clients[n]);
                }
                Op::Reconnect(n) => {
                    state.disconnect(clients[n]);
                    clients[n] = state.connect_or_poll(None).0;
                }
            }
            check(&state.matchmaker().snapshot())?;
        }
    }

    #[test]
    fn stop_is_idempotent(ops in proptest::collection::vec(op(), 0..40), n in 0..CLIENTS) {
        let state = ServerState::default();
        let clients: Vec<ClientId> = (0..CLIENTS)
            .map(|_| state.connect_or_poll(None).0)
            .collect();
        for op in ops {
            if let Op::FindMatch(m) = op {
                let _ = state.handle_request(clients[m], ClientRequest::FindMatch);
            }
        }

        state.matchmaker().teardown(clients[n]);
        let once = state.matchmaker().snapshot();
        state.matchmaker().teardown(clients[n]);
        prop_assert_eq!(state.matchmaker().snapshot(), once);
    }

    #[test]
    fn live_clients_never_wait_together(ops in proptest::collection::vec(0..CLIENTS, 1..60)) {
        let state = ServerState::default();
        let clients: Vec<ClientId> = (0..CLIENTS)
            .map(|_| state.connect_or_poll(None).0)
            .collect();
        for n in ops {
            state.handle_request(clients[n], ClientRequest::FindMatch).unwrap();
            prop_assert!(state.matchmaker().waiting_clients().len() <= 1);
        }
    }
}
