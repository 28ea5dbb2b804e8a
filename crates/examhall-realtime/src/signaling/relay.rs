//! Signaling relay — forwards opaque payloads between session members.
//!
//! Pure message forwarding: the relay never interprets payloads. Delivery
//! is best-effort fire-and-forget; negotiation protocols above it retry.

use std::sync::Arc;

use tracing::debug;

use examhall_core::error::AppError;
use examhall_core::result::AppResult;
use examhall_core::types::id::{ExamId, ParticipantId};

use crate::message::types::OutboundMessage;
use crate::presence::registry::PresenceRegistry;

/// Stateless forwarder over the live-handle table.
#[derive(Debug, Clone)]
pub struct SignalingRelay {
    presence: Arc<PresenceRegistry>,
}

impl SignalingRelay {
    /// Create a relay over the given presence registry.
    pub fn new(presence: Arc<PresenceRegistry>) -> Self {
        Self { presence }
    }

    /// Forward a message to one session member.
    ///
    /// Fails with `TargetUnreachable` when the target has no live
    /// transport — a signal to the caller, not a session failure.
    pub fn unicast(
        &self,
        exam_id: ExamId,
        to: ParticipantId,
        msg: OutboundMessage,
    ) -> AppResult<()> {
        let handle = self.presence.get(exam_id, to).ok_or_else(|| {
            AppError::target_unreachable(format!("participant {to} has no live connection"))
        })?;

        if !handle.send(msg) {
            return Err(AppError::target_unreachable(format!(
                "participant {to} dropped the message"
            )));
        }
        Ok(())
    }

    /// Best-effort delivery to every listed member except `except`.
    ///
    /// Returns the number of members the message reached.
    pub fn broadcast<I>(
        &self,
        exam_id: ExamId,
        recipients: I,
        except: Option<ParticipantId>,
        msg: &OutboundMessage,
    ) -> usize
    where
        I: IntoIterator<Item = ParticipantId>,
    {
        let mut sent = 0;
        for pid in recipients {
            if Some(pid) == except {
                continue;
            }
            if let Some(handle) = self.presence.get(exam_id, pid) {
                if handle.send(msg.clone()) {
                    sent += 1;
                }
            }
        }
        debug!(exam_id = %exam_id, sent, "Broadcast delivered");
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::handle::ConnectionHandle;
    use examhall_core::error::ErrorKind;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_unicast_to_disconnected_peer_fails() {
        let presence = Arc::new(PresenceRegistry::new());
        let relay = SignalingRelay::new(presence);

        let err = relay
            .unicast(
                ExamId::new(),
                ParticipantId::new(),
                OutboundMessage::Ping { timestamp: 0 },
            )
            .expect_err("must be unreachable");
        assert_eq!(err.kind, ErrorKind::TargetUnreachable);
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let presence = Arc::new(PresenceRegistry::new());
        let exam = ExamId::new();
        let sender = ParticipantId::new();
        let peer = ParticipantId::new();

        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        presence.register(
            exam,
            sender,
            Arc::new(ConnectionHandle::new(sender, "a".to_string(), tx_a)),
        );
        presence.register(
            exam,
            peer,
            Arc::new(ConnectionHandle::new(peer, "b".to_string(), tx_b)),
        );

        let relay = SignalingRelay::new(presence);
        let sent = relay.broadcast(
            exam,
            vec![sender, peer],
            Some(sender),
            &OutboundMessage::Ping { timestamp: 0 },
        );

        assert_eq!(sent, 1);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }
}
