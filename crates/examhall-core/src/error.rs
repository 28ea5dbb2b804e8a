//! Unified application error types for ExamHall.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// No live session exists for the given exam id.
    UnknownSession,
    /// The referenced participant is not a member of the session.
    UnknownParticipant,
    /// A session lifecycle transition was attempted out of order.
    InvalidTransition,
    /// The signaling target has no live connection.
    TargetUnreachable,
    /// A timer was started while one is already running.
    TimerAlreadyRunning,
    /// A timer operation requires a running timer.
    TimerNotRunning,
    /// Resume was called on a timer that is not paused.
    NotPaused,
    /// The caller's role does not permit the operation.
    Forbidden,
    /// Input validation failed.
    Validation,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal server error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSession => write!(f, "UNKNOWN_SESSION"),
            Self::UnknownParticipant => write!(f, "UNKNOWN_PARTICIPANT"),
            Self::InvalidTransition => write!(f, "INVALID_TRANSITION"),
            Self::TargetUnreachable => write!(f, "TARGET_UNREACHABLE"),
            Self::TimerAlreadyRunning => write!(f, "TIMER_ALREADY_RUNNING"),
            Self::TimerNotRunning => write!(f, "TIMER_NOT_RUNNING"),
            Self::NotPaused => write!(f, "NOT_PAUSED"),
            Self::Forbidden => write!(f, "FORBIDDEN"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified application error used throughout ExamHall.
///
/// All crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls. This provides a single error type for
/// the entire application boundary.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an unknown-session error.
    pub fn unknown_session(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownSession, message)
    }

    /// Create an unknown-participant error.
    pub fn unknown_participant(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownParticipant, message)
    }

    /// Create an invalid-transition error.
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidTransition, message)
    }

    /// Create a target-unreachable error.
    pub fn target_unreachable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TargetUnreachable, message)
    }

    /// Create a timer-already-running error.
    pub fn timer_already_running(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TimerAlreadyRunning, message)
    }

    /// Create a timer-not-running error.
    pub fn timer_not_running(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TimerNotRunning, message)
    }

    /// Create a not-paused error.
    pub fn not_paused(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotPaused, message)
    }

    /// Create a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::UnknownSession.to_string(), "UNKNOWN_SESSION");
        assert_eq!(ErrorKind::NotPaused.to_string(), "NOT_PAUSED");
    }

    #[test]
    fn test_helper_sets_kind() {
        let err = AppError::invalid_transition("cannot start an ended session");
        assert_eq!(err.kind, ErrorKind::InvalidTransition);
        assert!(err.to_string().contains("INVALID_TRANSITION"));
    }

    #[test]
    fn test_clone_drops_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = AppError::with_source(ErrorKind::Internal, "wrapped", io);
        let cloned = err.clone();
        assert!(cloned.source.is_none());
        assert_eq!(cloned.message, "wrapped");
    }
}
