//! Session registry — maps exam ids to live session worker mailboxes.
//!
//! Each session's state is owned by exactly one worker task; the registry
//! is the only shared structure, a concurrency-safe map from exam id to
//! mailbox handle. Joining an unknown exam spawns its worker; every other
//! operation on an unknown id fails with `UnknownSession`, which callers
//! recover from by (re)joining.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use examhall_core::config::session::SessionConfig;
use examhall_core::error::AppError;
use examhall_core::result::AppResult;
use examhall_core::types::id::{ExamId, MessageId, ParticipantId};

use crate::presence::registry::PresenceRegistry;
use crate::session::coordinator;
use crate::session::state::{EndReason, Role, SessionSnapshot, SnapshotScope};
use crate::timer::state::TimerState;
use crate::violation::record::ViolationReport;

/// Reply channel carried by every request command.
pub type Reply<T> = oneshot::Sender<AppResult<T>>;

/// Commands processed one at a time by a session worker.
#[derive(Debug)]
pub enum SessionCommand {
    /// Join or rejoin the session.
    Join {
        /// Joining participant.
        participant_id: ParticipantId,
        /// Display name.
        display_name: String,
        /// Host or attendee.
        role: Role,
        /// Scoped snapshot reply.
        reply: Reply<SessionSnapshot>,
    },
    /// Mark a participant disconnected. The record survives for rejoin.
    Leave {
        /// Leaving participant.
        participant_id: ParticipantId,
        /// Completion reply.
        reply: Reply<()>,
    },
    /// Transition NotStarted → Active.
    Start {
        /// Requesting participant; `None` for the trusted admin surface.
        requested_by: Option<ParticipantId>,
        /// Snapshot reply.
        reply: Reply<SessionSnapshot>,
    },
    /// Transition to Ended. Idempotent on an already-Ended session.
    End {
        /// Why the session is ending.
        reason: EndReason,
        /// Requesting participant; `None` for admin or the timer.
        requested_by: Option<ParticipantId>,
        /// Snapshot reply.
        reply: Reply<SessionSnapshot>,
    },
    /// Relay an opaque payload to one peer.
    Signal {
        /// Sender.
        from: ParticipantId,
        /// Target.
        to: ParticipantId,
        /// Opaque payload.
        payload: serde_json::Value,
        /// Completion reply.
        reply: Reply<()>,
    },
    /// Session-wide chat broadcast.
    Chat {
        /// Sender.
        from: ParticipantId,
        /// Message text.
        text: String,
        /// Caller idempotency key; `None` skips dedup.
        client_message_id: Option<MessageId>,
        /// Server-assigned message id reply.
        reply: Reply<MessageId>,
    },
    /// Ingest a violation event.
    ReportViolation {
        /// The report.
        report: ViolationReport,
        /// Completion reply.
        reply: Reply<()>,
    },
    /// Start the countdown.
    StartTimer {
        /// Duration in whole seconds.
        duration_seconds: u64,
        /// Requesting participant; `None` for admin.
        requested_by: Option<ParticipantId>,
        /// Timer view reply.
        reply: Reply<TimerState>,
    },
    /// Pause the countdown and the session.
    PauseTimer {
        /// Requesting participant; `None` for admin.
        requested_by: Option<ParticipantId>,
        /// Timer view reply.
        reply: Reply<TimerState>,
    },
    /// Resume the countdown and the session.
    ResumeTimer {
        /// Requesting participant; `None` for admin.
        requested_by: Option<ParticipantId>,
        /// Timer view reply.
        reply: Reply<TimerState>,
    },
    /// Grant extra time.
    ExtendTimer {
        /// Extra whole seconds.
        additional_seconds: u64,
        /// Requesting participant; `None` for admin.
        requested_by: Option<ParticipantId>,
        /// Timer view reply.
        reply: Reply<TimerState>,
    },
    /// Update attendee-reported media flags.
    MediaUpdate {
        /// Whose flags.
        participant_id: ParticipantId,
        /// Camera enabled.
        camera_enabled: bool,
        /// Microphone enabled.
        microphone_enabled: bool,
        /// Completion reply.
        reply: Reply<()>,
    },
    /// Read the current state.
    Snapshot {
        /// Viewer scope for redaction.
        scope: SnapshotScope,
        /// Snapshot reply.
        reply: Reply<SessionSnapshot>,
    },
}

/// Mailbox handle for one session worker.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Exam this worker owns.
    pub exam_id: ExamId,
    /// When the worker was spawned.
    pub spawned_at: DateTime<Utc>,
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Create a handle over a worker mailbox.
    pub(crate) fn new(exam_id: ExamId, tx: mpsc::Sender<SessionCommand>) -> Self {
        Self {
            exam_id,
            spawned_at: Utc::now(),
            tx,
        }
    }

    /// Whether the worker behind this handle has retired.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Send a command and await its reply.
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> AppResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| AppError::internal("session worker unavailable"))?;
        rx.await
            .map_err(|_| AppError::internal("session worker dropped the request"))?
    }

    /// Join or rejoin.
    pub async fn join(
        &self,
        participant_id: ParticipantId,
        display_name: String,
        role: Role,
    ) -> AppResult<SessionSnapshot> {
        self.request(|reply| SessionCommand::Join {
            participant_id,
            display_name,
            role,
            reply,
        })
        .await
    }

    /// Mark a participant disconnected.
    pub async fn leave(&self, participant_id: ParticipantId) -> AppResult<()> {
        self.request(|reply| SessionCommand::Leave {
            participant_id,
            reply,
        })
        .await
    }

    /// Start the session.
    pub async fn start(
        &self,
        requested_by: Option<ParticipantId>,
    ) -> AppResult<SessionSnapshot> {
        self.request(|reply| SessionCommand::Start {
            requested_by,
            reply,
        })
        .await
    }

    /// End the session.
    pub async fn end(
        &self,
        reason: EndReason,
        requested_by: Option<ParticipantId>,
    ) -> AppResult<SessionSnapshot> {
        self.request(|reply| SessionCommand::End {
            reason,
            requested_by,
            reply,
        })
        .await
    }

    /// Relay a signaling payload.
    pub async fn signal(
        &self,
        from: ParticipantId,
        to: ParticipantId,
        payload: serde_json::Value,
    ) -> AppResult<()> {
        self.request(|reply| SessionCommand::Signal {
            from,
            to,
            payload,
            reply,
        })
        .await
    }

    /// Broadcast a chat message.
    pub async fn chat(
        &self,
        from: ParticipantId,
        text: String,
        client_message_id: Option<MessageId>,
    ) -> AppResult<MessageId> {
        self.request(|reply| SessionCommand::Chat {
            from,
            text,
            client_message_id,
            reply,
        })
        .await
    }

    /// Ingest a violation report.
    pub async fn report_violation(&self, report: ViolationReport) -> AppResult<()> {
        self.request(|reply| SessionCommand::ReportViolation { report, reply })
            .await
    }

    /// Start the countdown.
    pub async fn start_timer(
        &self,
        duration_seconds: u64,
        requested_by: Option<ParticipantId>,
    ) -> AppResult<TimerState> {
        self.request(|reply| SessionCommand::StartTimer {
            duration_seconds,
            requested_by,
            reply,
        })
        .await
    }

    /// Pause the countdown.
    pub async fn pause_timer(
        &self,
        requested_by: Option<ParticipantId>,
    ) -> AppResult<TimerState> {
        self.request(|reply| SessionCommand::PauseTimer {
            requested_by,
            reply,
        })
        .await
    }

    /// Resume the countdown.
    pub async fn resume_timer(
        &self,
        requested_by: Option<ParticipantId>,
    ) -> AppResult<TimerState> {
        self.request(|reply| SessionCommand::ResumeTimer {
            requested_by,
            reply,
        })
        .await
    }

    /// Grant extra time.
    pub async fn extend_timer(
        &self,
        additional_seconds: u64,
        requested_by: Option<ParticipantId>,
    ) -> AppResult<TimerState> {
        self.request(|reply| SessionCommand::ExtendTimer {
            additional_seconds,
            requested_by,
            reply,
        })
        .await
    }

    /// Update media flags.
    pub async fn media_update(
        &self,
        participant_id: ParticipantId,
        camera_enabled: bool,
        microphone_enabled: bool,
    ) -> AppResult<()> {
        self.request(|reply| SessionCommand::MediaUpdate {
            participant_id,
            camera_enabled,
            microphone_enabled,
            reply,
        })
        .await
    }

    /// Read the current state.
    pub async fn snapshot(&self, scope: SnapshotScope) -> AppResult<SessionSnapshot> {
        self.request(|reply| SessionCommand::Snapshot { scope, reply })
            .await
    }
}

/// Registry of live session workers.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<ExamId, SessionHandle>,
    presence: Arc<PresenceRegistry>,
    config: SessionConfig,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(config: SessionConfig, presence: Arc<PresenceRegistry>) -> Self {
        Self {
            sessions: DashMap::new(),
            presence,
            config,
        }
    }

    /// Get a session handle, failing with `UnknownSession` when absent or
    /// retired.
    pub fn get(&self, exam_id: ExamId) -> AppResult<SessionHandle> {
        if let Some(entry) = self.sessions.get(&exam_id) {
            if !entry.is_closed() {
                return Ok(entry.value().clone());
            }
        }
        // The worker retired after its retention; prune the stale handle
        // so the exam id is free again.
        self.sessions.remove_if(&exam_id, |_, handle| handle.is_closed());
        Err(AppError::unknown_session(format!(
            "no live session for exam {exam_id}"
        )))
    }

    /// Get a session handle, spawning its worker when absent.
    ///
    /// Exactly one session exists per exam id: the dashmap entry guards
    /// concurrent joiners racing to spawn. A handle whose worker retired
    /// is replaced by a fresh session.
    pub fn get_or_spawn(&self, exam_id: ExamId) -> SessionHandle {
        let mut entry = self.sessions.entry(exam_id).or_insert_with(|| {
            info!(exam_id = %exam_id, "Spawning session worker");
            coordinator::spawn(exam_id, self.config.clone(), self.presence.clone())
        });
        if entry.is_closed() {
            info!(exam_id = %exam_id, "Respawning worker for retired session");
            *entry = coordinator::spawn(exam_id, self.config.clone(), self.presence.clone());
        }
        entry.clone()
    }

    /// Join a session, creating it on first contact.
    pub async fn join(
        &self,
        exam_id: ExamId,
        participant_id: ParticipantId,
        display_name: String,
        role: Role,
    ) -> AppResult<SessionSnapshot> {
        self.get_or_spawn(exam_id)
            .join(participant_id, display_name, role)
            .await
    }

    /// Mark a participant disconnected.
    pub async fn leave(&self, exam_id: ExamId, participant_id: ParticipantId) -> AppResult<()> {
        self.get(exam_id)?.leave(participant_id).await
    }

    /// Start a session.
    pub async fn start(
        &self,
        exam_id: ExamId,
        requested_by: Option<ParticipantId>,
    ) -> AppResult<SessionSnapshot> {
        self.get(exam_id)?.start(requested_by).await
    }

    /// End a session.
    pub async fn end(
        &self,
        exam_id: ExamId,
        reason: EndReason,
        requested_by: Option<ParticipantId>,
    ) -> AppResult<SessionSnapshot> {
        self.get(exam_id)?.end(reason, requested_by).await
    }

    /// Relay a signaling payload.
    pub async fn signal(
        &self,
        exam_id: ExamId,
        from: ParticipantId,
        to: ParticipantId,
        payload: serde_json::Value,
    ) -> AppResult<()> {
        self.get(exam_id)?.signal(from, to, payload).await
    }

    /// Broadcast a chat message.
    pub async fn chat(
        &self,
        exam_id: ExamId,
        from: ParticipantId,
        text: String,
        client_message_id: Option<MessageId>,
    ) -> AppResult<MessageId> {
        self.get(exam_id)?.chat(from, text, client_message_id).await
    }

    /// Ingest a violation report.
    pub async fn report_violation(
        &self,
        exam_id: ExamId,
        report: ViolationReport,
    ) -> AppResult<()> {
        self.get(exam_id)?.report_violation(report).await
    }

    /// Start a countdown.
    pub async fn start_timer(
        &self,
        exam_id: ExamId,
        duration_seconds: u64,
        requested_by: Option<ParticipantId>,
    ) -> AppResult<TimerState> {
        self.get(exam_id)?
            .start_timer(duration_seconds, requested_by)
            .await
    }

    /// Pause a countdown.
    pub async fn pause_timer(
        &self,
        exam_id: ExamId,
        requested_by: Option<ParticipantId>,
    ) -> AppResult<TimerState> {
        self.get(exam_id)?.pause_timer(requested_by).await
    }

    /// Resume a countdown.
    pub async fn resume_timer(
        &self,
        exam_id: ExamId,
        requested_by: Option<ParticipantId>,
    ) -> AppResult<TimerState> {
        self.get(exam_id)?.resume_timer(requested_by).await
    }

    /// Grant extra time.
    pub async fn extend_timer(
        &self,
        exam_id: ExamId,
        additional_seconds: u64,
        requested_by: Option<ParticipantId>,
    ) -> AppResult<TimerState> {
        self.get(exam_id)?
            .extend_timer(additional_seconds, requested_by)
            .await
    }

    /// Update media flags.
    pub async fn media_update(
        &self,
        exam_id: ExamId,
        participant_id: ParticipantId,
        camera_enabled: bool,
        microphone_enabled: bool,
    ) -> AppResult<()> {
        self.get(exam_id)?
            .media_update(participant_id, camera_enabled, microphone_enabled)
            .await
    }

    /// Read a session's current state.
    pub async fn snapshot(
        &self,
        exam_id: ExamId,
        scope: SnapshotScope,
    ) -> AppResult<SessionSnapshot> {
        self.get(exam_id)?.snapshot(scope).await
    }

    /// Number of live session workers.
    pub fn session_count(&self) -> usize {
        self.sessions.iter().filter(|e| !e.is_closed()).count()
    }
}
