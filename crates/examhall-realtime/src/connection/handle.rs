//! Individual transport connection handle.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use examhall_core::types::id::{ExamId, ParticipantId};

use crate::message::types::OutboundMessage;

/// Unique connection identifier.
pub type ConnectionId = Uuid;

/// A handle to a single live connection.
///
/// Holds the sender half of the connection's outbound mailbox plus
/// metadata about the participant behind it. Sends never block: a full
/// or closed buffer drops the message, so one slow client cannot stall
/// a session worker.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// The participant behind this connection.
    pub participant_id: ParticipantId,
    /// Display name supplied at connect time.
    pub display_name: String,
    /// When the connection was established.
    pub connected_at: DateTime<Utc>,
    /// Sender for outbound messages.
    sender: mpsc::Sender<OutboundMessage>,
    /// Session this connection has joined, if any.
    exam: RwLock<Option<ExamId>>,
    /// Whether the connection is still alive.
    alive: AtomicBool,
}

impl ConnectionHandle {
    /// Create a new connection handle.
    pub fn new(
        participant_id: ParticipantId,
        display_name: String,
        sender: mpsc::Sender<OutboundMessage>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            participant_id,
            display_name,
            connected_at: Utc::now(),
            sender,
            exam: RwLock::new(None),
            alive: AtomicBool::new(true),
        }
    }

    /// Push an outbound message to this connection.
    ///
    /// Returns `false` if the message was dropped (dead connection or
    /// full buffer).
    pub fn send(&self, msg: OutboundMessage) -> bool {
        if !self.is_alive() {
            return false;
        }
        match self.sender.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %self.id, "Send buffer full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_closed();
                false
            }
        }
    }

    /// Check if the connection is alive.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Mark the connection as closed.
    pub fn mark_closed(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// The session this connection has joined, if any.
    pub fn current_exam(&self) -> Option<ExamId> {
        *self.exam.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the session this connection joined (or `None` on leave).
    pub fn set_exam(&self, exam_id: Option<ExamId>) {
        *self.exam.write().unwrap_or_else(|e| e.into_inner()) = exam_id;
    }
}
