//! Shared test harness for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use examhall_core::config::session::SessionConfig;
use examhall_core::types::id::{ExamId, ParticipantId};
use examhall_realtime::ProctorEngine;
use examhall_realtime::connection::handle::ConnectionHandle;
use examhall_realtime::message::types::OutboundMessage;
use examhall_realtime::session::state::Role;

/// Test harness wrapping a fully-wired proctoring engine.
pub struct Harness {
    /// The engine under test.
    pub engine: Arc<ProctorEngine>,
}

impl Harness {
    /// Engine with default session configuration.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// Engine with a custom session configuration.
    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            engine: Arc::new(ProctorEngine::new(config)),
        }
    }

    /// Register a transport connection for a participant.
    pub fn connect(&self, name: &str) -> TestClient {
        let participant_id = ParticipantId::new();
        let (handle, rx) = self
            .engine
            .gateway()
            .register(participant_id, name.to_string());
        TestClient {
            participant_id,
            name: name.to_string(),
            handle,
            rx,
        }
    }

    /// Join a session through the inbound message path, consuming the
    /// snapshot reply.
    pub async fn join(&self, client: &mut TestClient, exam_id: ExamId, role: Role) {
        let msg = serde_json::json!({
            "type": "join_session",
            "exam_id": exam_id,
            "display_name": client.name,
            "role": role,
        });
        self.engine
            .gateway()
            .handle_inbound(&client.handle, &msg.to_string())
            .await;

        match client.recv().await {
            OutboundMessage::SessionSnapshot { .. } => {}
            other => panic!("expected session_snapshot after join, got {other:?}"),
        }
    }
}

/// One simulated client connection.
pub struct TestClient {
    /// The participant behind the connection.
    pub participant_id: ParticipantId,
    /// Display name.
    pub name: String,
    /// Live connection handle.
    pub handle: Arc<ConnectionHandle>,
    /// Receiver half of the outbound mailbox.
    pub rx: mpsc::Receiver<OutboundMessage>,
}

impl TestClient {
    /// Receive the next outbound message, failing after five seconds.
    pub async fn recv(&mut self) -> OutboundMessage {
        timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for outbound message")
            .expect("connection mailbox closed")
    }

    /// Drain every message currently queued.
    pub fn drain(&mut self) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// Receive messages until one matches, failing after `max` messages.
    pub async fn recv_until(
        &mut self,
        max: usize,
        mut pred: impl FnMut(&OutboundMessage) -> bool,
    ) -> OutboundMessage {
        for _ in 0..max {
            let msg = self.recv().await;
            if pred(&msg) {
                return msg;
            }
        }
        panic!("matching message never arrived within {max} messages");
    }
}
