//! Response DTOs for the admin session endpoints.

use serde::{Deserialize, Serialize};

use examhall_realtime::timer::state::TimerState;

/// Body for `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server is serving.
    pub status: String,
    /// Number of live session workers.
    pub sessions: usize,
    /// Number of registered transport connections.
    pub connections: usize,
}

/// Body returned by timer commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerResponse {
    /// Authoritative timer view after the command.
    pub timer: TimerState,
}
