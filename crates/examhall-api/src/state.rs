//! Application state shared across all handlers.

use std::sync::Arc;

use examhall_core::config::AppConfig;
use examhall_realtime::ProctorEngine;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Realtime proctoring engine
    pub engine: Arc<ProctorEngine>,
}

impl AppState {
    /// Assemble the state from configuration and a built engine.
    pub fn new(config: Arc<AppConfig>, engine: Arc<ProctorEngine>) -> Self {
        Self { config, engine }
    }
}
