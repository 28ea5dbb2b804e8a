//! Violation tracker — per-participant ledger and attempt budget.
//!
//! The tracker only reports state; it never disconnects anyone. Policy for
//! an exhausted budget belongs to the session coordinator.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use examhall_core::types::id::ParticipantId;

use super::record::{ViolationRecord, ViolationReport};

/// Outcome of ingesting a violation report.
#[derive(Debug)]
pub enum Ingest {
    /// The report was accepted and stored.
    Recorded {
        /// The stored record.
        record: ViolationRecord,
        /// Running violation count for the participant.
        count: u32,
        /// Attempts left after this violation.
        attempts_remaining: u32,
        /// Whether this violation exhausted the budget. Emitted at most
        /// once per participant.
        exhausted: bool,
    },
    /// The report matched a recent record and was silently dropped.
    Duplicate,
}

/// Ingests violation events for one session and maintains per-participant
/// counters against a bounded attempt budget.
#[derive(Debug)]
pub struct ViolationTracker {
    /// Maximum violations before the budget is exhausted.
    max_attempts: u32,
    /// Window within which identical reports are collapsed.
    dedup_window: Duration,
    /// Stored records per participant, in ingestion order.
    ledger: HashMap<ParticipantId, Vec<ViolationRecord>>,
    /// `occurred_at` of the most recent stored record per dedup identity.
    last_seen: HashMap<(ParticipantId, String, String), DateTime<Utc>>,
    /// Participants whose exhaustion has already been signaled.
    exhausted_signaled: HashSet<ParticipantId>,
}

impl ViolationTracker {
    /// Create a tracker with the given budget and dedup window.
    pub fn new(max_attempts: u32, dedup_window_seconds: u64) -> Self {
        Self {
            max_attempts,
            dedup_window: Duration::seconds(dedup_window_seconds as i64),
            ledger: HashMap::new(),
            last_seen: HashMap::new(),
            exhausted_signaled: HashSet::new(),
        }
    }

    /// Ingest a violation report.
    ///
    /// A report matching the most recent stored record for the same
    /// (participant, kind, detail) within the dedup window increments
    /// nothing — idempotent ingestion under retransmission.
    pub fn record(&mut self, report: ViolationReport) -> Ingest {
        let identity = (
            report.participant_id,
            report.kind.clone(),
            report.detail.clone(),
        );

        if let Some(last) = self.last_seen.get(&identity) {
            let delta = report.occurred_at.signed_duration_since(*last);
            if delta.abs() < self.dedup_window {
                debug!(
                    participant_id = %report.participant_id,
                    kind = %report.kind,
                    "Duplicate violation report suppressed"
                );
                return Ingest::Duplicate;
            }
        }

        self.last_seen.insert(identity, report.occurred_at);

        let record = ViolationRecord::from_report(report);
        let entries = self.ledger.entry(record.participant_id).or_default();
        entries.push(record.clone());

        let count = entries.len() as u32;
        let attempts_remaining = self.max_attempts.saturating_sub(count);
        let exhausted =
            attempts_remaining == 0 && self.exhausted_signaled.insert(record.participant_id);

        Ingest::Recorded {
            record,
            count,
            attempts_remaining,
            exhausted,
        }
    }

    /// Number of stored violations for a participant.
    pub fn violation_count(&self, participant_id: ParticipantId) -> u32 {
        self.ledger
            .get(&participant_id)
            .map(|v| v.len() as u32)
            .unwrap_or(0)
    }

    /// Attempts left in the budget: `max(0, max_attempts - count)`.
    pub fn attempts_remaining(&self, participant_id: ParticipantId) -> u32 {
        self.max_attempts
            .saturating_sub(self.violation_count(participant_id))
    }

    /// Stored records for a participant, oldest first.
    pub fn records(&self, participant_id: ParticipantId) -> &[ViolationRecord] {
        self.ledger
            .get(&participant_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
