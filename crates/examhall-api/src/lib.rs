//! # examhall-api
//!
//! HTTP API layer for ExamHall built on Axum.
//!
//! Provides the admin session endpoints, the WebSocket upgrade for the
//! realtime proctoring protocol, DTOs, and error mapping.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
