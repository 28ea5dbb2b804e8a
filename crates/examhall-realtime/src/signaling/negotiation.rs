//! Explicit per-pair negotiation state.
//!
//! The relay never looks inside payloads, so pair state is driven purely
//! by signal direction and ordering: the first signal between two peers
//! opens a negotiation, the first reply acknowledges it, and any further
//! traffic marks the pair connected. Either side leaving closes every
//! pair it participates in.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use examhall_core::types::id::ParticipantId;

/// Negotiation progress for one peer pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    /// No signaling exchanged yet.
    Idle,
    /// One side has sent the opening signal.
    OfferSent,
    /// The other side has replied.
    AnswerReceived,
    /// Both sides have exchanged further traffic.
    Connected,
    /// One side left or disconnected.
    Closed,
}

#[derive(Debug)]
struct PairNegotiation {
    initiator: ParticipantId,
    state: NegotiationState,
}

/// Bookkeeping of which peer pairs are negotiating, keyed by the
/// unordered pair so both directions share one row.
#[derive(Debug, Default)]
pub struct NegotiationTable {
    pairs: HashMap<(ParticipantId, ParticipantId), PairNegotiation>,
}

impl NegotiationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            pairs: HashMap::new(),
        }
    }

    fn key(a: ParticipantId, b: ParticipantId) -> (ParticipantId, ParticipantId) {
        if a <= b { (a, b) } else { (b, a) }
    }

    /// Record a signal from `from` to `to` and return the pair's new state.
    pub fn on_signal(&mut self, from: ParticipantId, to: ParticipantId) -> NegotiationState {
        let entry = self
            .pairs
            .entry(Self::key(from, to))
            .or_insert(PairNegotiation {
                initiator: from,
                state: NegotiationState::Idle,
            });

        entry.state = match entry.state {
            NegotiationState::Idle | NegotiationState::Closed => {
                // A closed pair restarting means a fresh negotiation.
                entry.initiator = from;
                NegotiationState::OfferSent
            }
            NegotiationState::OfferSent if from != entry.initiator => {
                NegotiationState::AnswerReceived
            }
            NegotiationState::OfferSent => NegotiationState::OfferSent,
            NegotiationState::AnswerReceived | NegotiationState::Connected => {
                NegotiationState::Connected
            }
        };
        entry.state
    }

    /// Close every pair the participant is part of.
    pub fn close_for(&mut self, participant_id: ParticipantId) {
        for (key, pair) in self.pairs.iter_mut() {
            if key.0 == participant_id || key.1 == participant_id {
                pair.state = NegotiationState::Closed;
            }
        }
    }

    /// Current state for a pair.
    pub fn state(&self, a: ParticipantId, b: ParticipantId) -> NegotiationState {
        self.pairs
            .get(&Self::key(a, b))
            .map(|p| p.state)
            .unwrap_or(NegotiationState::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_walks_to_connected() {
        let mut table = NegotiationTable::new();
        let a = ParticipantId::new();
        let b = ParticipantId::new();

        assert_eq!(table.state(a, b), NegotiationState::Idle);
        assert_eq!(table.on_signal(a, b), NegotiationState::OfferSent);
        assert_eq!(table.on_signal(b, a), NegotiationState::AnswerReceived);
        assert_eq!(table.on_signal(a, b), NegotiationState::Connected);
        assert_eq!(table.on_signal(b, a), NegotiationState::Connected);
    }

    #[test]
    fn test_repeated_offer_stays_offer_sent() {
        let mut table = NegotiationTable::new();
        let a = ParticipantId::new();
        let b = ParticipantId::new();

        table.on_signal(a, b);
        assert_eq!(table.on_signal(a, b), NegotiationState::OfferSent);
    }

    #[test]
    fn test_leave_closes_all_pairs() {
        let mut table = NegotiationTable::new();
        let a = ParticipantId::new();
        let b = ParticipantId::new();
        let c = ParticipantId::new();

        table.on_signal(a, b);
        table.on_signal(a, c);
        table.close_for(a);

        assert_eq!(table.state(a, b), NegotiationState::Closed);
        assert_eq!(table.state(a, c), NegotiationState::Closed);
    }

    #[test]
    fn test_closed_pair_can_renegotiate() {
        let mut table = NegotiationTable::new();
        let a = ParticipantId::new();
        let b = ParticipantId::new();

        table.on_signal(a, b);
        table.close_for(b);
        assert_eq!(table.on_signal(b, a), NegotiationState::OfferSent);
        assert_eq!(table.on_signal(a, b), NegotiationState::AnswerReceived);
    }
}
