//! # examhall-core
//!
//! Shared foundation for the ExamHall proctoring server:
//!
//! - Unified [`AppError`]/[`ErrorKind`] error type used across all crates
//! - Typed UUID identifiers for domain entities
//! - Layered TOML + environment configuration schemas

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
