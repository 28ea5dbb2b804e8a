//! Presence registry — maps session members to live transport handles.
//!
//! The only resource touched by multiple session workers concurrently, so
//! it lives in a concurrency-safe map. Each participant is in at most one
//! session at a time.

use std::sync::Arc;

use dashmap::DashMap;

use examhall_core::types::id::{ExamId, ParticipantId};

use crate::connection::handle::ConnectionHandle;

/// Thread-safe map of `(exam, participant) → live connection handle`.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    handles: DashMap<(ExamId, ParticipantId), Arc<ConnectionHandle>>,
}

impl PresenceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
        }
    }

    /// Register a live handle for a session member.
    ///
    /// A rejoin replaces the previous handle; the old one is returned.
    pub fn register(
        &self,
        exam_id: ExamId,
        participant_id: ParticipantId,
        handle: Arc<ConnectionHandle>,
    ) -> Option<Arc<ConnectionHandle>> {
        self.handles.insert((exam_id, participant_id), handle)
    }

    /// Remove a member's handle.
    ///
    /// Only removes when the stored handle is the given connection, so a
    /// stale disconnect cannot evict a fresh rejoin.
    pub fn unregister(
        &self,
        exam_id: ExamId,
        participant_id: ParticipantId,
        conn_id: crate::connection::handle::ConnectionId,
    ) -> Option<Arc<ConnectionHandle>> {
        self.handles
            .remove_if(&(exam_id, participant_id), |_, h| h.id == conn_id)
            .map(|(_, h)| h)
    }

    /// Get a member's live handle, if one exists and is alive.
    pub fn get(&self, exam_id: ExamId, participant_id: ParticipantId) -> Option<Arc<ConnectionHandle>> {
        self.handles
            .get(&(exam_id, participant_id))
            .map(|r| r.value().clone())
            .filter(|h| h.is_alive())
    }

    /// Whether the member currently has a live transport.
    pub fn is_connected(&self, exam_id: ExamId, participant_id: ParticipantId) -> bool {
        self.get(exam_id, participant_id).is_some()
    }

    /// Number of live handles for a session.
    pub fn connected_count(&self, exam_id: ExamId) -> usize {
        self.handles
            .iter()
            .filter(|r| r.key().0 == exam_id && r.value().is_alive())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn handle(pid: ParticipantId) -> Arc<ConnectionHandle> {
        let (tx, _rx) = mpsc::channel(4);
        Arc::new(ConnectionHandle::new(pid, "test".to_string(), tx))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = PresenceRegistry::new();
        let exam = ExamId::new();
        let pid = ParticipantId::new();

        assert!(!registry.is_connected(exam, pid));
        registry.register(exam, pid, handle(pid));
        assert!(registry.is_connected(exam, pid));
        assert_eq!(registry.connected_count(exam), 1);
    }

    #[test]
    fn test_dead_handle_is_not_connected() {
        let registry = PresenceRegistry::new();
        let exam = ExamId::new();
        let pid = ParticipantId::new();

        let h = handle(pid);
        registry.register(exam, pid, h.clone());
        h.mark_closed();
        assert!(!registry.is_connected(exam, pid));
    }

    #[test]
    fn test_stale_unregister_keeps_fresh_handle() {
        let registry = PresenceRegistry::new();
        let exam = ExamId::new();
        let pid = ParticipantId::new();

        let old = handle(pid);
        registry.register(exam, pid, old.clone());
        let fresh = handle(pid);
        registry.register(exam, pid, fresh.clone());

        // The old connection's cleanup runs after the rejoin.
        assert!(registry.unregister(exam, pid, old.id).is_none());
        assert!(registry.is_connected(exam, pid));

        assert!(registry.unregister(exam, pid, fresh.id).is_some());
        assert!(!registry.is_connected(exam, pid));
    }
}
