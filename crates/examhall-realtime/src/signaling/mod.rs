//! Signaling: stateless relay and per-pair negotiation bookkeeping.

pub mod negotiation;
pub mod relay;

pub use negotiation::{NegotiationState, NegotiationTable};
pub use relay::SignalingRelay;
