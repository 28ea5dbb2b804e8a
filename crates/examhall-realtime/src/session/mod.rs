//! Session lifecycle, coordination, and registry.

pub mod coordinator;
pub mod idempotency;
pub mod registry;
pub mod state;

pub use registry::{SessionHandle, SessionRegistry};
pub use state::{
    ConnectionStatus, EndReason, ExamSession, MediaFlags, Participant, ParticipantView, Role,
    SessionSnapshot, SessionState, SnapshotScope,
};
