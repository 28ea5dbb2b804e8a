//! WebSocket message taxonomy.

pub mod types;

pub use types::{InboundMessage, OutboundMessage};
