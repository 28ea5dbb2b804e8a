//! Server-authoritative countdown timers.

pub mod engine;
pub mod state;

pub use engine::{TimerEngine, TimerEvent};
pub use state::TimerState;
