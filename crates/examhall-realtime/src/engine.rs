//! Top-level realtime engine wiring.

use std::sync::Arc;

use tracing::info;

use examhall_core::config::session::SessionConfig;

use crate::connection::gateway::TransportGateway;
use crate::presence::registry::PresenceRegistry;
use crate::session::registry::SessionRegistry;

/// The assembled proctoring engine: presence, sessions, and the
/// transport gateway, wired over one shared configuration.
#[derive(Debug)]
pub struct ProctorEngine {
    presence: Arc<PresenceRegistry>,
    sessions: Arc<SessionRegistry>,
    gateway: Arc<TransportGateway>,
}

impl ProctorEngine {
    /// Build the engine from session configuration.
    pub fn new(config: SessionConfig) -> Self {
        let presence = Arc::new(PresenceRegistry::new());
        let sessions = Arc::new(SessionRegistry::new(config.clone(), presence.clone()));
        let gateway = Arc::new(TransportGateway::new(
            presence.clone(),
            sessions.clone(),
            config.channel_buffer_size,
        ));

        info!(
            max_attempts = config.max_attempts,
            dedup_window_seconds = config.violation_dedup_window_seconds,
            "Proctor engine initialized"
        );

        Self {
            presence,
            sessions,
            gateway,
        }
    }

    /// Shared presence registry.
    pub fn presence(&self) -> &Arc<PresenceRegistry> {
        &self.presence
    }

    /// Session registry, used by the admin surface.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Transport gateway, used by the WebSocket layer.
    pub fn gateway(&self) -> &Arc<TransportGateway> {
        &self.gateway
    }
}
