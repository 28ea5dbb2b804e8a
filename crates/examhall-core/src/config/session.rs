//! Exam session engine configuration.

use serde::{Deserialize, Serialize};

/// Settings governing live exam sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum rule violations an attendee may accrue before the host is
    /// told the attempt budget is exhausted.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Window within which identical violation reports are collapsed.
    #[serde(default = "default_violation_dedup_window")]
    pub violation_dedup_window_seconds: u64,
    /// Window within which a repeated idempotency key is suppressed.
    #[serde(default = "default_idempotency_window")]
    pub idempotency_window_seconds: u64,
    /// Cadence of `timer_tick` broadcasts while a timer is active.
    #[serde(default = "default_tick_interval")]
    pub timer_tick_interval_seconds: u64,
    /// Outbound buffer size per connection.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
    /// Session worker mailbox depth.
    #[serde(default = "default_mailbox_depth")]
    pub mailbox_depth: usize,
    /// How long an ended session keeps serving reads before its worker
    /// retires and the session is discarded.
    #[serde(default = "default_ended_retention")]
    pub ended_retention_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            violation_dedup_window_seconds: default_violation_dedup_window(),
            idempotency_window_seconds: default_idempotency_window(),
            timer_tick_interval_seconds: default_tick_interval(),
            channel_buffer_size: default_channel_buffer(),
            mailbox_depth: default_mailbox_depth(),
            ended_retention_seconds: default_ended_retention(),
        }
    }
}

fn default_max_attempts() -> u32 {
    10
}

fn default_violation_dedup_window() -> u64 {
    5
}

fn default_idempotency_window() -> u64 {
    60
}

fn default_tick_interval() -> u64 {
    1
}

fn default_channel_buffer() -> usize {
    256
}

fn default_mailbox_depth() -> usize {
    256
}

fn default_ended_retention() -> u64 {
    300
}
