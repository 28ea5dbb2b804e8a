//! Inbound and outbound WebSocket message type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use examhall_core::types::id::{ExamId, MessageId, ParticipantId};

use crate::session::state::{EndReason, Role, SessionSnapshot};
use crate::violation::record::Severity;

/// Messages sent by a client to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Join (or rejoin) a session.
    JoinSession {
        /// Exam to join.
        exam_id: ExamId,
        /// Display name shown to peers.
        display_name: String,
        /// Host or attendee.
        role: Role,
    },
    /// Leave the current session. The participant record survives.
    LeaveSession {
        /// Exam to leave.
        exam_id: ExamId,
    },
    /// Start the session (host only).
    StartSession {
        /// Exam to start.
        exam_id: ExamId,
    },
    /// End the session (host only).
    EndSession {
        /// Exam to end.
        exam_id: ExamId,
        /// End reason; defaults to host-requested.
        #[serde(default)]
        reason: Option<EndReason>,
    },
    /// Relay an opaque negotiation payload to one peer.
    Signal {
        /// Session scope.
        exam_id: ExamId,
        /// Target participant.
        to: ParticipantId,
        /// Opaque payload; never interpreted by the server.
        payload: serde_json::Value,
    },
    /// Session-wide chat message.
    ChatMessage {
        /// Session scope.
        exam_id: ExamId,
        /// Message text.
        text: String,
        /// Caller-supplied idempotency key; repeats are suppressed. The
        /// server assigns the message id when absent.
        client_message_id: Option<MessageId>,
    },
    /// A violation event produced by an external detector.
    ReportViolation {
        /// Session scope.
        exam_id: ExamId,
        /// The participant the violation was detected for.
        participant_id: ParticipantId,
        /// Classification string.
        kind: String,
        /// Detail text; part of the dedup identity.
        detail: String,
        /// Severity.
        severity: Severity,
        /// Detector confidence in `0.0..=1.0`.
        confidence: Option<f64>,
        /// When the infraction occurred.
        occurred_at: DateTime<Utc>,
    },
    /// Start the countdown (host only).
    StartTimer {
        /// Session scope.
        exam_id: ExamId,
        /// Duration in whole seconds.
        duration_seconds: u64,
    },
    /// Pause the countdown and the session (host only).
    PauseTimer {
        /// Session scope.
        exam_id: ExamId,
    },
    /// Resume a paused countdown and session (host only).
    ResumeTimer {
        /// Session scope.
        exam_id: ExamId,
    },
    /// Grant extra time (host only).
    ExtendTimer {
        /// Session scope.
        exam_id: ExamId,
        /// Extra whole seconds.
        additional_seconds: u64,
    },
    /// Attendee-reported camera/microphone flags.
    MediaUpdate {
        /// Session scope.
        exam_id: ExamId,
        /// Camera enabled.
        camera_enabled: bool,
        /// Microphone enabled.
        microphone_enabled: bool,
    },
    /// Pong response to server ping.
    Pong {
        /// Echoed timestamp.
        timestamp: i64,
    },
}

/// Messages sent by the server to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Full current session state; sent on join (late binding).
    SessionSnapshot {
        /// The snapshot.
        snapshot: SessionSnapshot,
    },
    /// The session went Active.
    SessionStarted {
        /// Session scope.
        exam_id: ExamId,
        /// Start time.
        started_at: DateTime<Utc>,
    },
    /// A participant joined or reconnected.
    ParticipantJoined {
        /// Session scope.
        exam_id: ExamId,
        /// Who joined.
        participant_id: ParticipantId,
        /// Display name.
        display_name: String,
        /// Role.
        role: Role,
    },
    /// A participant disconnected (host only).
    ParticipantLeft {
        /// Session scope.
        exam_id: ExamId,
        /// Who left.
        participant_id: ParticipantId,
    },
    /// An attendee's media flags changed (host only).
    MediaChanged {
        /// Session scope.
        exam_id: ExamId,
        /// Whose flags changed.
        participant_id: ParticipantId,
        /// Camera enabled.
        camera_enabled: bool,
        /// Microphone enabled.
        microphone_enabled: bool,
    },
    /// Relayed negotiation payload.
    Signal {
        /// Session scope.
        exam_id: ExamId,
        /// Originating participant.
        from: ParticipantId,
        /// Opaque payload, unchanged.
        payload: serde_json::Value,
    },
    /// Relayed chat message.
    ChatMessage {
        /// Session scope.
        exam_id: ExamId,
        /// Sender.
        from: ParticipantId,
        /// Message text.
        text: String,
        /// Server-assigned message id.
        server_message_id: MessageId,
        /// Server receipt time.
        timestamp: DateTime<Utc>,
    },
    /// An accepted violation (host only).
    ViolationAlert {
        /// Session scope.
        exam_id: ExamId,
        /// The offending participant.
        participant_id: ParticipantId,
        /// Classification string.
        kind: String,
        /// Severity.
        severity: Severity,
        /// Running violation count.
        count: u32,
        /// Attempts left in the budget.
        attempts_remaining: u32,
    },
    /// A participant's attempt budget reached zero (host only, once).
    AttemptsExhausted {
        /// Session scope.
        exam_id: ExamId,
        /// The participant out of attempts.
        participant_id: ParticipantId,
    },
    /// The countdown started.
    TimerStarted {
        /// Session scope.
        exam_id: ExamId,
        /// Configured duration.
        duration_seconds: u64,
        /// Authoritative end time.
        ends_at: DateTime<Utc>,
    },
    /// Periodic countdown broadcast while active.
    TimerTick {
        /// Session scope.
        exam_id: ExamId,
        /// Remaining whole seconds.
        remaining_seconds: u64,
    },
    /// The countdown (and session) paused.
    TimerPaused {
        /// Session scope.
        exam_id: ExamId,
        /// Frozen remaining seconds.
        remaining_seconds: u64,
    },
    /// The countdown (and session) resumed.
    TimerResumed {
        /// Session scope.
        exam_id: ExamId,
        /// Recomputed end time.
        ends_at: DateTime<Utc>,
    },
    /// Extra time was granted.
    TimerExtended {
        /// Session scope.
        exam_id: ExamId,
        /// Seconds added.
        additional_seconds: u64,
        /// Recomputed end time.
        ends_at: DateTime<Utc>,
    },
    /// The session ended.
    SessionEnded {
        /// Session scope.
        exam_id: ExamId,
        /// Why.
        reason: EndReason,
    },
    /// Ping (server keepalive).
    Ping {
        /// Server timestamp.
        timestamp: i64,
    },
    /// Error reply, delivered only to the originating connection.
    Error {
        /// Error code.
        code: String,
        /// Error description.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_join_wire_format() {
        let json = format!(
            r#"{{"type":"join_session","exam_id":"{}","display_name":"Ada","role":"attendee"}}"#,
            uuid::Uuid::new_v4()
        );
        let msg: InboundMessage = serde_json::from_str(&json).expect("deserialize");
        assert!(matches!(
            msg,
            InboundMessage::JoinSession {
                role: Role::Attendee,
                ..
            }
        ));
    }

    #[test]
    fn test_outbound_is_type_tagged() {
        let msg = OutboundMessage::TimerTick {
            exam_id: ExamId::new(),
            remaining_seconds: 42,
        };
        let value = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(value["type"], "timer_tick");
        assert_eq!(value["remaining_seconds"], 42);
    }

    #[test]
    fn test_signal_payload_is_opaque() {
        let payload = serde_json::json!({"sdp": "v=0...", "anything": [1, 2, 3]});
        let msg = OutboundMessage::Signal {
            exam_id: ExamId::new(),
            from: ParticipantId::new(),
            payload: payload.clone(),
        };
        let value = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(value["payload"], payload);
    }
}
