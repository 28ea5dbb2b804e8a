//! # examhall-realtime
//!
//! Live proctoring engine for ExamHall. Provides:
//!
//! - Actor-per-session coordination with a serialized worker per exam
//! - Stateless signaling relay for peer media negotiation and chat
//! - Server-authoritative countdown timers with pause/resume/extend
//! - Violation ingestion with deduplication and a bounded attempt budget
//! - Presence tracking of connected participants and their media flags
//! - WebSocket transport gateway with per-connection outbound mailboxes

pub mod connection;
pub mod engine;
pub mod message;
pub mod presence;
pub mod session;
pub mod signaling;
pub mod timer;
pub mod violation;

pub use connection::gateway::TransportGateway;
pub use engine::ProctorEngine;
pub use presence::registry::PresenceRegistry;
pub use session::registry::SessionRegistry;
pub use timer::engine::TimerEngine;
pub use violation::tracker::ViolationTracker;
