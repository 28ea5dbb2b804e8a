//! Serializable timer snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a session timer for display and session snapshots.
///
/// `remaining_seconds` is a display cache; the authoritative remaining
/// time is always derived from the engine's deadline at query time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerState {
    /// Configured duration in whole seconds.
    pub duration_seconds: u64,
    /// When the countdown started.
    pub started_at: DateTime<Utc>,
    /// When the countdown ends: `started_at + duration + pauses + extensions`.
    pub ends_at: DateTime<Utc>,
    /// When the timer was paused, while paused.
    pub paused_at: Option<DateTime<Utc>>,
    /// Total seconds spent paused so far.
    pub accumulated_pause_seconds: u64,
    /// Total seconds granted via extensions.
    pub extended_seconds: u64,
    /// Remaining whole seconds at snapshot time.
    pub remaining_seconds: u64,
}
