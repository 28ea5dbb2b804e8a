//! Transport gateway — the seam between raw transports and sessions.
//!
//! The gateway owns the connection table, turns raw inbound frames into
//! session operations, and routes failures back to the originating
//! connection as error messages. It is transport-agnostic: the WebSocket
//! layer above only pumps text frames in and serialized messages out.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use examhall_core::error::AppError;
use examhall_core::result::AppResult;
use examhall_core::types::id::{ExamId, ParticipantId};

use crate::connection::handle::{ConnectionHandle, ConnectionId};
use crate::message::types::{InboundMessage, OutboundMessage};
use crate::presence::registry::PresenceRegistry;
use crate::session::registry::SessionRegistry;
use crate::session::state::EndReason;
use crate::violation::record::ViolationReport;

/// Entry point for transport connections.
#[derive(Debug)]
pub struct TransportGateway {
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    presence: Arc<PresenceRegistry>,
    sessions: Arc<SessionRegistry>,
    outbound_buffer: usize,
}

impl TransportGateway {
    /// Create a gateway over the shared presence and session registries.
    pub fn new(
        presence: Arc<PresenceRegistry>,
        sessions: Arc<SessionRegistry>,
        outbound_buffer: usize,
    ) -> Self {
        Self {
            connections: DashMap::new(),
            presence,
            sessions,
            outbound_buffer,
        }
    }

    /// Register a new connection.
    ///
    /// Returns the handle plus the receiver half of the connection's
    /// outbound mailbox; the transport task drains the receiver onto the
    /// wire.
    pub fn register(
        &self,
        participant_id: ParticipantId,
        display_name: String,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        let handle = Arc::new(ConnectionHandle::new(participant_id, display_name, tx));
        self.connections.insert(handle.id, handle.clone());

        info!(
            conn_id = %handle.id,
            participant_id = %participant_id,
            "Connection registered"
        );
        (handle, rx)
    }

    /// Tear down a connection after its transport closed.
    ///
    /// If the connection had joined a session, presence is dropped and
    /// the session is told the participant left. The participant record
    /// inside the session survives for rejoin.
    pub async fn unregister(&self, handle: &Arc<ConnectionHandle>) {
        handle.mark_closed();
        self.connections.remove(&handle.id);

        if let Some(exam_id) = handle.current_exam() {
            self.presence
                .unregister(exam_id, handle.participant_id, handle.id);
            if let Err(e) = self.sessions.leave(exam_id, handle.participant_id).await {
                debug!(
                    conn_id = %handle.id,
                    error = %e,
                    "Leave on disconnect failed"
                );
            }
            handle.set_exam(None);
        }

        info!(conn_id = %handle.id, "Connection unregistered");
    }

    /// Handle one raw inbound frame from a connection.
    ///
    /// Failures never propagate to the transport loop; they are reported
    /// to the originating connection as an `error` message.
    pub async fn handle_inbound(&self, handle: &Arc<ConnectionHandle>, raw: &str) {
        let msg: InboundMessage = match serde_json::from_str(raw) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(conn_id = %handle.id, error = %e, "Unparseable inbound frame");
                self.reply_error(handle, &AppError::from(e));
                return;
            }
        };

        if let Err(e) = self.dispatch(handle, msg).await {
            debug!(conn_id = %handle.id, error = %e, "Inbound message rejected");
            self.reply_error(handle, &e);
        }
    }

    async fn dispatch(&self, handle: &Arc<ConnectionHandle>, msg: InboundMessage) -> AppResult<()> {
        let sender = handle.participant_id;
        match msg {
            InboundMessage::JoinSession {
                exam_id,
                display_name,
                role,
            } => self.join(handle, exam_id, display_name, role).await,
            InboundMessage::LeaveSession { exam_id } => {
                self.presence.unregister(exam_id, sender, handle.id);
                handle.set_exam(None);
                self.sessions.leave(exam_id, sender).await
            }
            InboundMessage::StartSession { exam_id } => {
                self.sessions.start(exam_id, Some(sender)).await.map(|_| ())
            }
            InboundMessage::EndSession { exam_id, reason } => self
                .sessions
                .end(
                    exam_id,
                    reason.unwrap_or(EndReason::HostRequested),
                    Some(sender),
                )
                .await
                .map(|_| ()),
            InboundMessage::Signal {
                exam_id,
                to,
                payload,
            } => self.sessions.signal(exam_id, sender, to, payload).await,
            InboundMessage::ChatMessage {
                exam_id,
                text,
                client_message_id,
            } => self
                .sessions
                .chat(exam_id, sender, text, client_message_id)
                .await
                .map(|_| ()),
            InboundMessage::ReportViolation {
                exam_id,
                participant_id,
                kind,
                detail,
                severity,
                confidence,
                occurred_at,
            } => {
                self.sessions
                    .report_violation(
                        exam_id,
                        ViolationReport {
                            participant_id,
                            kind,
                            detail,
                            severity,
                            confidence,
                            occurred_at,
                        },
                    )
                    .await
            }
            InboundMessage::StartTimer {
                exam_id,
                duration_seconds,
            } => self
                .sessions
                .start_timer(exam_id, duration_seconds, Some(sender))
                .await
                .map(|_| ()),
            InboundMessage::PauseTimer { exam_id } => self
                .sessions
                .pause_timer(exam_id, Some(sender))
                .await
                .map(|_| ()),
            InboundMessage::ResumeTimer { exam_id } => self
                .sessions
                .resume_timer(exam_id, Some(sender))
                .await
                .map(|_| ()),
            InboundMessage::ExtendTimer {
                exam_id,
                additional_seconds,
            } => self
                .sessions
                .extend_timer(exam_id, additional_seconds, Some(sender))
                .await
                .map(|_| ()),
            InboundMessage::MediaUpdate {
                exam_id,
                camera_enabled,
                microphone_enabled,
            } => {
                self.sessions
                    .media_update(exam_id, sender, camera_enabled, microphone_enabled)
                    .await
            }
            InboundMessage::Pong { timestamp } => {
                debug!(conn_id = %handle.id, timestamp, "Pong received");
                Ok(())
            }
        }
    }

    /// Join flow: presence must be registered before the session worker
    /// broadcasts the join, so the snapshot reply and subsequent fan-out
    /// both reach this connection. A rejected join rolls presence back.
    async fn join(
        &self,
        handle: &Arc<ConnectionHandle>,
        exam_id: ExamId,
        display_name: String,
        role: crate::session::state::Role,
    ) -> AppResult<()> {
        // One connection, one session: hopping to another exam leaves the
        // old one first, or its presence entry would outlive the hop and
        // keep receiving that session's broadcasts.
        if let Some(previous) = handle.current_exam() {
            if previous != exam_id {
                self.presence
                    .unregister(previous, handle.participant_id, handle.id);
                if let Err(e) = self.sessions.leave(previous, handle.participant_id).await {
                    debug!(
                        conn_id = %handle.id,
                        error = %e,
                        "Leave of previous session failed"
                    );
                }
                handle.set_exam(None);
            }
        }

        self.presence
            .register(exam_id, handle.participant_id, handle.clone());

        match self
            .sessions
            .join(exam_id, handle.participant_id, display_name, role)
            .await
        {
            Ok(snapshot) => {
                handle.set_exam(Some(exam_id));
                handle.send(OutboundMessage::SessionSnapshot { snapshot });
                Ok(())
            }
            Err(e) => {
                self.presence
                    .unregister(exam_id, handle.participant_id, handle.id);
                Err(e)
            }
        }
    }

    fn reply_error(&self, handle: &Arc<ConnectionHandle>, error: &AppError) {
        handle.send(OutboundMessage::Error {
            code: error.kind.to_string(),
            message: error.message.clone(),
        });
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
