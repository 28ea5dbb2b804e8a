//! Session coordinator — the worker task that owns one exam session.
//!
//! All mutable session state lives inside a single task: the lifecycle
//! machine, the timer, the violation ledger, and negotiation bookkeeping.
//! Commands arrive through the mailbox and are processed strictly in
//! order, so no operation ever observes a half-applied state. Timer
//! events share the same select loop, which is how an expired countdown
//! ends the exam with no client involvement.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use examhall_core::config::session::SessionConfig;
use examhall_core::error::AppError;
use examhall_core::result::AppResult;
use examhall_core::types::id::{ExamId, MessageId, ParticipantId};

use crate::message::types::OutboundMessage;
use crate::presence::registry::PresenceRegistry;
use crate::session::idempotency::{IdempotencyWindow, KeyCheck};
use crate::session::registry::{SessionCommand, SessionHandle};
use crate::session::state::{
    ConnectionStatus, EndReason, ExamSession, MediaFlags, Participant, Role, SessionSnapshot,
    SessionState, SnapshotScope,
};
use crate::signaling::negotiation::NegotiationTable;
use crate::signaling::relay::SignalingRelay;
use crate::timer::engine::{TimerEngine, TimerEvent};
use crate::timer::state::TimerState;
use crate::violation::record::ViolationReport;
use crate::violation::tracker::{Ingest, ViolationTracker};

/// Spawn the worker task for one exam and return its mailbox handle.
pub fn spawn(
    exam_id: ExamId,
    config: SessionConfig,
    presence: Arc<PresenceRegistry>,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(config.mailbox_depth);
    let handle = SessionHandle::new(exam_id, tx);

    let mut coordinator = SessionCoordinator::new(exam_id, config, presence);
    tokio::spawn(async move {
        coordinator.run(rx).await;
    });

    handle
}

struct SessionCoordinator {
    session: ExamSession,
    timer: TimerEngine,
    timer_events: mpsc::Receiver<TimerEvent>,
    violations: ViolationTracker,
    negotiation: NegotiationTable,
    idempotency: IdempotencyWindow,
    relay: SignalingRelay,
    config: SessionConfig,
}

impl SessionCoordinator {
    fn new(exam_id: ExamId, config: SessionConfig, presence: Arc<PresenceRegistry>) -> Self {
        let mut timer = TimerEngine::new(config.timer_tick_interval_seconds);
        // The engine is freshly constructed, so the receiver is present.
        let timer_events = match timer.take_events() {
            Some(rx) => rx,
            None => mpsc::channel(1).1,
        };

        Self {
            session: ExamSession::new(exam_id),
            timer,
            timer_events,
            violations: ViolationTracker::new(
                config.max_attempts,
                config.violation_dedup_window_seconds,
            ),
            negotiation: NegotiationTable::new(),
            idempotency: IdempotencyWindow::new(config.idempotency_window_seconds),
            relay: SignalingRelay::new(presence),
            config,
        }
    }

    /// Process commands and timer events until every mailbox sender is
    /// gone. An ended session keeps serving reads for the configured
    /// retention, then the worker retires; the registry prunes the dead
    /// handle on next access.
    async fn run(&mut self, mut mailbox: mpsc::Receiver<SessionCommand>) {
        info!(exam_id = %self.session.exam_id, "Session worker started");
        let mut retire_at: Option<Instant> = None;
        loop {
            tokio::select! {
                cmd = mailbox.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd),
                        None => break,
                    }
                }
                Some(event) = self.timer_events.recv() => {
                    self.handle_timer_event(event);
                }
                _ = Self::sleep_until(retire_at) => {
                    info!(exam_id = %self.session.exam_id, "Retention elapsed, retiring session");
                    break;
                }
            }
            if self.session.state.is_terminal() && retire_at.is_none() {
                retire_at = Some(
                    Instant::now() + Duration::from_secs(self.config.ended_retention_seconds),
                );
            }
        }
        info!(exam_id = %self.session.exam_id, "Session worker stopped");
    }

    /// Sleep until the retirement deadline; pending while there is none.
    async fn sleep_until(deadline: Option<Instant>) {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }

    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Join {
                participant_id,
                display_name,
                role,
                reply,
            } => {
                let _ = reply.send(self.join(participant_id, display_name, role));
            }
            SessionCommand::Leave {
                participant_id,
                reply,
            } => {
                let _ = reply.send(self.leave(participant_id));
            }
            SessionCommand::Start {
                requested_by,
                reply,
            } => {
                let _ = reply.send(self.start(requested_by));
            }
            SessionCommand::End {
                reason,
                requested_by,
                reply,
            } => {
                let _ = reply.send(self.end(reason, requested_by));
            }
            SessionCommand::Signal {
                from,
                to,
                payload,
                reply,
            } => {
                let _ = reply.send(self.signal(from, to, payload));
            }
            SessionCommand::Chat {
                from,
                text,
                client_message_id,
                reply,
            } => {
                let _ = reply.send(self.chat(from, text, client_message_id));
            }
            SessionCommand::ReportViolation { report, reply } => {
                let _ = reply.send(self.report_violation(report));
            }
            SessionCommand::StartTimer {
                duration_seconds,
                requested_by,
                reply,
            } => {
                let _ = reply.send(self.start_timer(duration_seconds, requested_by));
            }
            SessionCommand::PauseTimer {
                requested_by,
                reply,
            } => {
                let _ = reply.send(self.pause_timer(requested_by));
            }
            SessionCommand::ResumeTimer {
                requested_by,
                reply,
            } => {
                let _ = reply.send(self.resume_timer(requested_by));
            }
            SessionCommand::ExtendTimer {
                additional_seconds,
                requested_by,
                reply,
            } => {
                let _ = reply.send(self.extend_timer(additional_seconds, requested_by));
            }
            SessionCommand::MediaUpdate {
                participant_id,
                camera_enabled,
                microphone_enabled,
                reply,
            } => {
                let _ = reply.send(self.media_update(
                    participant_id,
                    camera_enabled,
                    microphone_enabled,
                ));
            }
            SessionCommand::Snapshot { scope, reply } => {
                let _ = reply.send(Ok(self.snapshot(scope)));
            }
        }
    }

    fn handle_timer_event(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Tick => {
                // Ticks race with pause/end in the event queue; only an
                // Active session broadcasts the countdown.
                if self.session.state != SessionState::Active {
                    return;
                }
                if let Some(remaining_seconds) = self.timer.remaining_seconds() {
                    self.broadcast(
                        OutboundMessage::TimerTick {
                            exam_id: self.session.exam_id,
                            remaining_seconds,
                        },
                        None,
                    );
                }
            }
            TimerEvent::Expired => {
                info!(exam_id = %self.session.exam_id, "Timer expired, ending session");
                if let Err(e) = self.end(EndReason::TimeExpired, None) {
                    warn!(exam_id = %self.session.exam_id, error = %e, "Expiry end failed");
                }
            }
        }
    }

    fn join(
        &mut self,
        participant_id: ParticipantId,
        display_name: String,
        role: Role,
    ) -> AppResult<SessionSnapshot> {
        if self.session.state.is_terminal() {
            return Err(AppError::invalid_transition(format!(
                "session {} has ended",
                self.session.exam_id
            )));
        }

        if role.is_host() {
            match self.session.host {
                Some(existing) if existing != participant_id => {
                    return Err(AppError::forbidden(format!(
                        "session {} already has a host",
                        self.session.exam_id
                    )));
                }
                _ => self.session.host = Some(participant_id),
            }
        }

        match self.session.participants.get_mut(&participant_id) {
            Some(existing) => {
                // Rejoin: connectivity changes, identity and counters do not.
                existing.connection = ConnectionStatus::Connected;
                existing.display_name = display_name.clone();
                existing.violation_count = self.violations.violation_count(participant_id);
                existing.attempts_remaining = self.violations.attempts_remaining(participant_id);
            }
            None => {
                self.session.participants.insert(
                    participant_id,
                    Participant {
                        participant_id,
                        display_name: display_name.clone(),
                        role,
                        connection: ConnectionStatus::Connected,
                        media: MediaFlags::default(),
                        violation_count: 0,
                        attempts_remaining: self.config.max_attempts,
                        joined_at: Utc::now(),
                    },
                );
            }
        }

        debug!(
            exam_id = %self.session.exam_id,
            participant_id = %participant_id,
            role = %role,
            "Participant joined"
        );

        self.broadcast(
            OutboundMessage::ParticipantJoined {
                exam_id: self.session.exam_id,
                participant_id,
                display_name,
                role,
            },
            Some(participant_id),
        );

        Ok(self.snapshot(SnapshotScope::Viewer(participant_id)))
    }

    fn leave(&mut self, participant_id: ParticipantId) -> AppResult<()> {
        if self.session.state.is_terminal() {
            return Ok(());
        }

        let participant = self.session.participant_mut(participant_id)?;
        participant.connection = ConnectionStatus::Disconnected;
        self.negotiation.close_for(participant_id);

        debug!(
            exam_id = %self.session.exam_id,
            participant_id = %participant_id,
            "Participant left"
        );

        self.notify_host(OutboundMessage::ParticipantLeft {
            exam_id: self.session.exam_id,
            participant_id,
        });
        Ok(())
    }

    fn start(&mut self, requested_by: Option<ParticipantId>) -> AppResult<SessionSnapshot> {
        self.require_host(requested_by)?;
        self.session.transition(SessionState::Active)?;
        let started_at = Utc::now();
        self.session.started_at = Some(started_at);

        info!(exam_id = %self.session.exam_id, "Session started");
        self.broadcast(
            OutboundMessage::SessionStarted {
                exam_id: self.session.exam_id,
                started_at,
            },
            None,
        );
        Ok(self.snapshot(SnapshotScope::Full))
    }

    /// End the session. Idempotent: ending an already-Ended session
    /// succeeds without re-broadcasting.
    fn end(
        &mut self,
        reason: EndReason,
        requested_by: Option<ParticipantId>,
    ) -> AppResult<SessionSnapshot> {
        if self.session.state == SessionState::Ended {
            return Ok(self.snapshot(SnapshotScope::Full));
        }
        self.require_host(requested_by)?;
        self.session.transition(SessionState::Ended)?;

        self.timer.stop();
        self.session.ended_at = Some(Utc::now());
        self.session.end_reason = Some(reason);

        info!(exam_id = %self.session.exam_id, reason = %reason, "Session ended");
        self.broadcast(
            OutboundMessage::SessionEnded {
                exam_id: self.session.exam_id,
                reason,
            },
            None,
        );
        Ok(self.snapshot(SnapshotScope::Full))
    }

    fn signal(
        &mut self,
        from: ParticipantId,
        to: ParticipantId,
        payload: serde_json::Value,
    ) -> AppResult<()> {
        if self.session.state.is_terminal() {
            return Err(AppError::invalid_transition(format!(
                "session {} has ended",
                self.session.exam_id
            )));
        }
        if from == to {
            return Err(AppError::validation("cannot signal yourself"));
        }
        self.session.participant(from)?;
        self.session.participant(to)?;

        let state = self.negotiation.on_signal(from, to);
        debug!(
            exam_id = %self.session.exam_id,
            from = %from,
            to = %to,
            negotiation = ?state,
            "Relaying signal"
        );

        self.relay.unicast(
            self.session.exam_id,
            to,
            OutboundMessage::Signal {
                exam_id: self.session.exam_id,
                from,
                payload,
            },
        )
    }

    fn chat(
        &mut self,
        from: ParticipantId,
        text: String,
        client_message_id: Option<MessageId>,
    ) -> AppResult<MessageId> {
        if self.session.state.is_terminal() {
            return Err(AppError::invalid_transition(format!(
                "session {} has ended",
                self.session.exam_id
            )));
        }
        self.session.participant(from)?;

        // Without a caller key there is nothing to dedup against; the
        // server assigns the message id directly.
        let server_message_id = match client_message_id {
            Some(key) => match self.idempotency.check("chat", &key.to_string()) {
                KeyCheck::Duplicate(id) => return Ok(id),
                KeyCheck::Fresh(id) => id,
            },
            None => MessageId::new(),
        };

        self.broadcast(
            OutboundMessage::ChatMessage {
                exam_id: self.session.exam_id,
                from,
                text,
                server_message_id,
                timestamp: Utc::now(),
            },
            Some(from),
        );
        Ok(server_message_id)
    }

    fn report_violation(&mut self, report: ViolationReport) -> AppResult<()> {
        if self.session.state.is_terminal() {
            return Err(AppError::invalid_transition(format!(
                "session {} has ended",
                self.session.exam_id
            )));
        }
        self.session.participant(report.participant_id)?;
        if let Some(confidence) = report.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(AppError::validation(format!(
                    "confidence {confidence} is outside 0.0..=1.0"
                )));
            }
        }

        let (record, count, attempts_remaining, exhausted) = match self.violations.record(report) {
            Ingest::Duplicate => return Ok(()),
            Ingest::Recorded {
                record,
                count,
                attempts_remaining,
                exhausted,
            } => (record, count, attempts_remaining, exhausted),
        };

        let participant = self.session.participant_mut(record.participant_id)?;
        participant.violation_count = count;
        participant.attempts_remaining = attempts_remaining;

        // Alerts go to the host alone; attendees never learn about each
        // other's infractions.
        self.notify_host(OutboundMessage::ViolationAlert {
            exam_id: self.session.exam_id,
            participant_id: record.participant_id,
            kind: record.kind.clone(),
            severity: record.severity,
            count,
            attempts_remaining,
        });

        if exhausted {
            warn!(
                exam_id = %self.session.exam_id,
                participant_id = %record.participant_id,
                "Attempt budget exhausted"
            );
            self.notify_host(OutboundMessage::AttemptsExhausted {
                exam_id: self.session.exam_id,
                participant_id: record.participant_id,
            });
        }
        Ok(())
    }

    fn start_timer(
        &mut self,
        duration_seconds: u64,
        requested_by: Option<ParticipantId>,
    ) -> AppResult<TimerState> {
        self.require_host(requested_by)?;
        if self.session.state != SessionState::Active {
            return Err(AppError::invalid_transition(format!(
                "timer requires an active session, state is {:?}",
                self.session.state
            )));
        }

        let state = self.timer.start(duration_seconds)?;
        self.broadcast(
            OutboundMessage::TimerStarted {
                exam_id: self.session.exam_id,
                duration_seconds,
                ends_at: state.ends_at,
            },
            None,
        );
        Ok(state)
    }

    fn pause_timer(&mut self, requested_by: Option<ParticipantId>) -> AppResult<TimerState> {
        self.require_host(requested_by)?;
        // Validate the lifecycle move before touching the clock so a
        // failure leaves both machines unchanged.
        if !self.session.state.can_transition_to(SessionState::Paused) {
            return Err(AppError::invalid_transition(format!(
                "cannot pause session in state {:?}",
                self.session.state
            )));
        }

        let state = self.timer.pause()?;
        self.session.transition(SessionState::Paused)?;

        self.broadcast(
            OutboundMessage::TimerPaused {
                exam_id: self.session.exam_id,
                remaining_seconds: state.remaining_seconds,
            },
            None,
        );
        Ok(state)
    }

    fn resume_timer(&mut self, requested_by: Option<ParticipantId>) -> AppResult<TimerState> {
        self.require_host(requested_by)?;
        if self.session.state != SessionState::Paused {
            return Err(AppError::not_paused(format!(
                "session is {:?}, not paused",
                self.session.state
            )));
        }

        let state = self.timer.resume()?;
        self.session.transition(SessionState::Active)?;

        self.broadcast(
            OutboundMessage::TimerResumed {
                exam_id: self.session.exam_id,
                ends_at: state.ends_at,
            },
            None,
        );
        Ok(state)
    }

    fn extend_timer(
        &mut self,
        additional_seconds: u64,
        requested_by: Option<ParticipantId>,
    ) -> AppResult<TimerState> {
        self.require_host(requested_by)?;
        if self.session.state.is_terminal() {
            return Err(AppError::invalid_transition(format!(
                "session {} has ended",
                self.session.exam_id
            )));
        }

        let state = self.timer.extend(additional_seconds)?;
        self.broadcast(
            OutboundMessage::TimerExtended {
                exam_id: self.session.exam_id,
                additional_seconds,
                ends_at: state.ends_at,
            },
            None,
        );
        Ok(state)
    }

    fn media_update(
        &mut self,
        participant_id: ParticipantId,
        camera_enabled: bool,
        microphone_enabled: bool,
    ) -> AppResult<()> {
        if self.session.state.is_terminal() {
            return Err(AppError::invalid_transition(format!(
                "session {} has ended",
                self.session.exam_id
            )));
        }

        let participant = self.session.participant_mut(participant_id)?;
        participant.media = MediaFlags {
            camera_enabled,
            microphone_enabled,
        };

        if !self.session.is_host(participant_id) {
            self.notify_host(OutboundMessage::MediaChanged {
                exam_id: self.session.exam_id,
                participant_id,
                camera_enabled,
                microphone_enabled,
            });
        }
        Ok(())
    }

    fn snapshot(&self, scope: SnapshotScope) -> SessionSnapshot {
        self.session.snapshot(self.timer.snapshot(), scope)
    }

    /// Host-only guard. `None` marks the trusted admin surface.
    fn require_host(&self, requested_by: Option<ParticipantId>) -> AppResult<()> {
        match requested_by {
            None => Ok(()),
            Some(pid) => {
                self.session.participant(pid)?;
                if self.session.is_host(pid) {
                    Ok(())
                } else {
                    Err(AppError::forbidden(format!(
                        "participant {pid} is not the session host"
                    )))
                }
            }
        }
    }

    fn broadcast(&self, msg: OutboundMessage, except: Option<ParticipantId>) {
        self.relay
            .broadcast(self.session.exam_id, self.session.connected_ids(), except, &msg);
    }

    /// Best-effort delivery to the host. An unreachable host never fails
    /// the triggering operation.
    fn notify_host(&self, msg: OutboundMessage) {
        if let Some(host) = self.session.host {
            if let Err(e) = self.relay.unicast(self.session.exam_id, host, msg) {
                debug!(exam_id = %self.session.exam_id, error = %e, "Host not notified");
            }
        }
    }
}
