//! Transport connections: per-connection handles and the gateway.

pub mod gateway;
pub mod handle;

pub use gateway::TransportGateway;
pub use handle::{ConnectionHandle, ConnectionId};
