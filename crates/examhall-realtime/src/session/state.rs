//! Exam session entity, participants, and the lifecycle state machine.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use examhall_core::error::AppError;
use examhall_core::result::AppResult;
use examhall_core::types::id::{ExamId, ParticipantId};

use crate::timer::state::TimerState;

/// Role of a session member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The single instructor observing the session.
    Host,
    /// A proctored exam taker.
    Attendee,
}

impl Role {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Attendee => "attendee",
        }
    }

    /// Check if this role is the host.
    pub fn is_host(&self) -> bool {
        matches!(self, Self::Host)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "host" => Ok(Self::Host),
            "attendee" => Ok(Self::Attendee),
            _ => Err(AppError::validation(format!(
                "Invalid role: '{s}'. Expected one of: host, attendee"
            ))),
        }
    }
}

/// Session lifecycle states.
///
/// Transitions are monotonic: NotStarted → Active → {Paused ↔ Active} →
/// Ended. Only Paused → Active moves "back"; Ended is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created but not yet started by the host.
    NotStarted,
    /// The exam is running.
    Active,
    /// The exam (and its timer) is paused.
    Paused,
    /// The exam is over. No further mutation is permitted.
    Ended,
}

impl SessionState {
    /// Whether a transition to `next` is allowed from this state.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Active)
                | (Self::Active, Self::Paused)
                | (Self::Paused, Self::Active)
                | (Self::Active, Self::Ended)
                | (Self::Paused, Self::Ended)
        )
    }

    /// Whether this is the terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended)
    }
}

/// Whether a participant's transport is currently connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// A live transport handle exists.
    Connected,
    /// The transport dropped; the participant record survives for rejoin.
    Disconnected,
}

/// Attendee-reported capability flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFlags {
    /// Camera enabled.
    pub camera_enabled: bool,
    /// Microphone enabled.
    pub microphone_enabled: bool,
}

/// One session member, present from first join until the session is
/// discarded. Rejoins update `connection`, never identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Stable participant identifier.
    pub participant_id: ParticipantId,
    /// Display name shown to the host and peers.
    pub display_name: String,
    /// Host or attendee.
    pub role: Role,
    /// Transport connectivity.
    pub connection: ConnectionStatus,
    /// Camera/microphone flags.
    pub media: MediaFlags,
    /// Mirrored from the violation tracker for display.
    pub violation_count: u32,
    /// Mirrored from the violation tracker for display.
    pub attempts_remaining: u32,
    /// First join time.
    pub joined_at: DateTime<Utc>,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// The host requested the end.
    #[serde(rename = "host-requested")]
    HostRequested,
    /// The server-authoritative timer expired.
    #[serde(rename = "time-expired")]
    TimeExpired,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostRequested => write!(f, "host-requested"),
            Self::TimeExpired => write!(f, "time-expired"),
        }
    }
}

/// One live exam instance. Owned exclusively by its session worker.
#[derive(Debug)]
pub struct ExamSession {
    /// Stable identifier; matches the exam being run.
    pub exam_id: ExamId,
    /// Lifecycle state.
    pub state: SessionState,
    /// The single instructor, once one has joined.
    pub host: Option<ParticipantId>,
    /// All members, keyed by participant id.
    pub participants: HashMap<ParticipantId, Participant>,
    /// When the session went Active.
    pub started_at: Option<DateTime<Utc>>,
    /// When the session ended.
    pub ended_at: Option<DateTime<Utc>>,
    /// Why the session ended.
    pub end_reason: Option<EndReason>,
}

impl ExamSession {
    /// Create a fresh, not-yet-started session.
    pub fn new(exam_id: ExamId) -> Self {
        Self {
            exam_id,
            state: SessionState::NotStarted,
            host: None,
            participants: HashMap::new(),
            started_at: None,
            ended_at: None,
            end_reason: None,
        }
    }

    /// Apply a lifecycle transition, enforcing monotonicity.
    pub fn transition(&mut self, next: SessionState) -> AppResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(AppError::invalid_transition(format!(
                "cannot transition session {} from {:?} to {:?}",
                self.exam_id, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Look up a participant.
    pub fn participant(&self, id: ParticipantId) -> AppResult<&Participant> {
        self.participants.get(&id).ok_or_else(|| {
            AppError::unknown_participant(format!("participant {id} is not in session"))
        })
    }

    /// Look up a participant mutably.
    pub fn participant_mut(&mut self, id: ParticipantId) -> AppResult<&mut Participant> {
        let exam_id = self.exam_id;
        self.participants.get_mut(&id).ok_or_else(|| {
            AppError::unknown_participant(format!(
                "participant {id} is not in session {exam_id}"
            ))
        })
    }

    /// Whether the given participant is the recorded host.
    pub fn is_host(&self, id: ParticipantId) -> bool {
        self.host == Some(id)
    }

    /// Ids of all participants whose transport is connected.
    pub fn connected_ids(&self) -> Vec<ParticipantId> {
        self.participants
            .values()
            .filter(|p| p.connection == ConnectionStatus::Connected)
            .map(|p| p.participant_id)
            .collect()
    }

    /// Build a serializable snapshot scoped to a viewer.
    ///
    /// Violation counters are private diagnostic data: the host and the
    /// admin surface see everything, an attendee sees only their own.
    pub fn snapshot(&self, timer: Option<TimerState>, scope: SnapshotScope) -> SessionSnapshot {
        let mut participants: Vec<ParticipantView> = self
            .participants
            .values()
            .map(|p| {
                let visible = match scope {
                    SnapshotScope::Full => true,
                    SnapshotScope::Viewer(viewer) => {
                        self.is_host(viewer) || viewer == p.participant_id
                    }
                };
                ParticipantView {
                    participant_id: p.participant_id,
                    display_name: p.display_name.clone(),
                    role: p.role,
                    connection: p.connection,
                    media: p.media,
                    violation_count: visible.then_some(p.violation_count),
                    attempts_remaining: visible.then_some(p.attempts_remaining),
                    joined_at: p.joined_at,
                }
            })
            .collect();
        participants.sort_by_key(|p| p.joined_at);

        SessionSnapshot {
            exam_id: self.exam_id,
            state: self.state,
            host: self.host,
            participants,
            timer,
            started_at: self.started_at,
            ended_at: self.ended_at,
            end_reason: self.end_reason,
        }
    }
}

/// Who a snapshot is being built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotScope {
    /// The admin surface; nothing is redacted.
    Full,
    /// A session member; host sees all, attendees see only themselves.
    Viewer(ParticipantId),
}

/// A participant as seen by a specific viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantView {
    /// Stable participant identifier.
    pub participant_id: ParticipantId,
    /// Display name.
    pub display_name: String,
    /// Host or attendee.
    pub role: Role,
    /// Transport connectivity.
    pub connection: ConnectionStatus,
    /// Camera/microphone flags.
    pub media: MediaFlags,
    /// Violation count; absent when redacted for the viewer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation_count: Option<u32>,
    /// Attempts left; absent when redacted for the viewer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_remaining: Option<u32>,
    /// First join time.
    pub joined_at: DateTime<Utc>,
}

/// Full current state of a session, sent to late joiners and returned by
/// the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Exam identifier.
    pub exam_id: ExamId,
    /// Lifecycle state.
    pub state: SessionState,
    /// Host participant, if one has joined.
    pub host: Option<ParticipantId>,
    /// Members ordered by first join.
    pub participants: Vec<ParticipantView>,
    /// Timer view, if a timer exists.
    pub timer: Option<TimerState>,
    /// When the session started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the session ended.
    pub ended_at: Option<DateTime<Utc>>,
    /// Why the session ended.
    pub end_reason: Option<EndReason>,
}
