//! Presence: live transport handles per session member.

pub mod registry;

pub use registry::PresenceRegistry;
