//! Request DTOs for the admin session endpoints.

use serde::{Deserialize, Serialize};

use examhall_realtime::session::state::EndReason;

/// Body for `POST /api/sessions/{id}/end`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndSessionRequest {
    /// Why the session is ending; defaults to host-requested.
    #[serde(default)]
    pub reason: Option<EndReason>,
}

/// Body for `POST /api/sessions/{id}/timer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TimerCommandRequest {
    /// Start the countdown.
    Start {
        /// Duration in whole seconds.
        duration_seconds: u64,
    },
    /// Pause the countdown and the session.
    Pause,
    /// Resume a paused countdown and session.
    Resume,
    /// Grant extra time.
    Extend {
        /// Extra whole seconds.
        additional_seconds: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_command_wire_format() {
        let cmd: TimerCommandRequest =
            serde_json::from_str(r#"{"action":"start","duration_seconds":1800}"#)
                .expect("deserialize");
        assert!(matches!(
            cmd,
            TimerCommandRequest::Start {
                duration_seconds: 1800
            }
        ));

        let cmd: TimerCommandRequest =
            serde_json::from_str(r#"{"action":"pause"}"#).expect("deserialize");
        assert!(matches!(cmd, TimerCommandRequest::Pause));
    }

    #[test]
    fn test_end_request_reason_defaults_to_none() {
        let req: EndSessionRequest = serde_json::from_str("{}").expect("deserialize");
        assert!(req.reason.is_none());
    }
}
