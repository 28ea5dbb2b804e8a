//! Violation record and report types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use examhall_core::types::id::{ParticipantId, ViolationId};

/// Severity of a detected rule infraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational, e.g. brief gaze deviation.
    Low,
    /// Suspicious behavior worth attention.
    Medium,
    /// Clear rule breach.
    High,
}

impl Severity {
    /// Return the severity as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// An incoming violation event produced by an external detector.
///
/// The engine never runs detection itself; it only ingests, deduplicates,
/// counts, and fans out events it is handed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationReport {
    /// The participant the violation was detected for.
    pub participant_id: ParticipantId,
    /// Free-form classification string (e.g. `"tab_switch"`, `"second_face"`).
    pub kind: String,
    /// Human-readable detail text; part of the dedup identity.
    pub detail: String,
    /// Detector-assigned severity.
    pub severity: Severity,
    /// Detector confidence in `0.0..=1.0`, when the detector provides one.
    pub confidence: Option<f64>,
    /// When the detector observed the infraction.
    pub occurred_at: DateTime<Utc>,
}

/// A stored, accepted violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// Unique record identifier.
    pub id: ViolationId,
    /// The participant the violation belongs to.
    pub participant_id: ParticipantId,
    /// Classification string.
    pub kind: String,
    /// Detail text.
    pub detail: String,
    /// Severity.
    pub severity: Severity,
    /// Detector confidence, if any.
    pub confidence: Option<f64>,
    /// When the infraction occurred.
    pub occurred_at: DateTime<Utc>,
}

impl ViolationRecord {
    /// Build a stored record from an accepted report.
    pub fn from_report(report: ViolationReport) -> Self {
        Self {
            id: ViolationId::new(),
            participant_id: report.participant_id,
            kind: report.kind,
            detail: report.detail,
            severity: report.severity,
            confidence: report.confidence,
            occurred_at: report.occurred_at,
        }
    }
}
