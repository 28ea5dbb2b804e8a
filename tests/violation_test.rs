//! Integration tests for violation ingestion and the attempt budget.

mod common;

use chrono::{Duration, Utc};
use common::Harness;
use examhall_core::config::session::SessionConfig;
use examhall_core::error::ErrorKind;
use examhall_core::types::id::{ExamId, ParticipantId};
use examhall_realtime::message::types::OutboundMessage;
use examhall_realtime::session::state::{Role, SnapshotScope};
use examhall_realtime::violation::record::{Severity, ViolationReport};

fn report(pid: ParticipantId, kind: &str, offset_seconds: i64) -> ViolationReport {
    ViolationReport {
        participant_id: pid,
        kind: kind.to_string(),
        detail: "detected".to_string(),
        severity: Severity::Medium,
        confidence: Some(0.9),
        occurred_at: Utc::now() + Duration::seconds(offset_seconds),
    }
}

#[tokio::test]
async fn test_duplicate_report_records_once_and_alerts_once() {
    let harness = Harness::new();
    let exam = ExamId::new();
    let mut host = harness.connect("prof");
    let mut attendee = harness.connect("ada");
    harness.join(&mut host, exam, Role::Host).await;
    harness.join(&mut attendee, exam, Role::Attendee).await;
    host.drain();

    let sessions = harness.engine.sessions();
    sessions
        .report_violation(exam, report(attendee.participant_id, "tab_switch", 0))
        .await
        .expect("first report");
    sessions
        .report_violation(exam, report(attendee.participant_id, "tab_switch", 3))
        .await
        .expect("duplicate report is a silent no-op");

    let alerts: Vec<_> = host
        .drain()
        .into_iter()
        .filter(|m| matches!(m, OutboundMessage::ViolationAlert { .. }))
        .collect();
    assert_eq!(alerts.len(), 1, "duplicate must not re-alert");

    let snapshot = sessions
        .snapshot(exam, SnapshotScope::Full)
        .await
        .expect("snapshot");
    let view = snapshot
        .participants
        .iter()
        .find(|p| p.participant_id == attendee.participant_id)
        .expect("attendee present");
    assert_eq!(view.violation_count, Some(1));
}

#[tokio::test]
async fn test_budget_counts_down_and_exhausts_once() {
    let config = SessionConfig {
        max_attempts: 3,
        ..SessionConfig::default()
    };
    let harness = Harness::with_config(config);
    let exam = ExamId::new();
    let mut host = harness.connect("prof");
    let mut attendee = harness.connect("ada");
    harness.join(&mut host, exam, Role::Host).await;
    harness.join(&mut attendee, exam, Role::Attendee).await;
    host.drain();

    let sessions = harness.engine.sessions();
    for i in 0..4 {
        sessions
            .report_violation(
                exam,
                report(attendee.participant_id, &format!("kind-{i}"), i * 10),
            )
            .await
            .expect("report");
    }

    let messages = host.drain();
    let remaining: Vec<u32> = messages
        .iter()
        .filter_map(|m| match m {
            OutboundMessage::ViolationAlert {
                attempts_remaining, ..
            } => Some(*attempts_remaining),
            _ => None,
        })
        .collect();
    assert_eq!(remaining, vec![2, 1, 0, 0]);

    let exhausted: Vec<_> = messages
        .iter()
        .filter(|m| matches!(m, OutboundMessage::AttemptsExhausted { .. }))
        .collect();
    assert_eq!(exhausted.len(), 1, "exhaustion signals exactly once");
}

#[tokio::test]
async fn test_alerts_go_to_host_only() {
    let harness = Harness::new();
    let exam = ExamId::new();
    let mut host = harness.connect("prof");
    let mut offender = harness.connect("ada");
    let mut bystander = harness.connect("bob");
    harness.join(&mut host, exam, Role::Host).await;
    harness.join(&mut offender, exam, Role::Attendee).await;
    harness.join(&mut bystander, exam, Role::Attendee).await;
    host.drain();
    offender.drain();
    bystander.drain();

    harness
        .engine
        .sessions()
        .report_violation(exam, report(offender.participant_id, "gaze_away", 0))
        .await
        .expect("report");

    assert!(
        host.drain()
            .iter()
            .any(|m| matches!(m, OutboundMessage::ViolationAlert { .. }))
    );
    assert!(offender.drain().is_empty(), "offender must not be alerted");
    assert!(bystander.drain().is_empty(), "peers must not be alerted");
}

#[tokio::test]
async fn test_rejoin_preserves_violation_count() {
    let harness = Harness::new();
    let exam = ExamId::new();
    let mut host = harness.connect("prof");
    let mut attendee = harness.connect("ada");
    harness.join(&mut host, exam, Role::Host).await;
    harness.join(&mut attendee, exam, Role::Attendee).await;

    let sessions = harness.engine.sessions();
    sessions
        .report_violation(exam, report(attendee.participant_id, "tab_switch", 0))
        .await
        .expect("report");
    sessions
        .leave(exam, attendee.participant_id)
        .await
        .expect("leave");

    let snapshot = sessions
        .join(
            exam,
            attendee.participant_id,
            attendee.name.clone(),
            Role::Attendee,
        )
        .await
        .expect("rejoin");

    let view = snapshot
        .participants
        .iter()
        .find(|p| p.participant_id == attendee.participant_id)
        .expect("attendee present");
    assert_eq!(view.violation_count, Some(1), "count survives reconnect");
}

#[tokio::test]
async fn test_snapshot_redacts_peer_counters_for_attendees() {
    let harness = Harness::new();
    let exam = ExamId::new();
    let mut host = harness.connect("prof");
    let mut offender = harness.connect("ada");
    let mut bystander = harness.connect("bob");
    harness.join(&mut host, exam, Role::Host).await;
    harness.join(&mut offender, exam, Role::Attendee).await;
    harness.join(&mut bystander, exam, Role::Attendee).await;

    let sessions = harness.engine.sessions();
    sessions
        .report_violation(exam, report(offender.participant_id, "tab_switch", 0))
        .await
        .expect("report");

    let snapshot = sessions
        .snapshot(exam, SnapshotScope::Viewer(bystander.participant_id))
        .await
        .expect("snapshot");
    let peer = snapshot
        .participants
        .iter()
        .find(|p| p.participant_id == offender.participant_id)
        .expect("offender present");
    assert_eq!(peer.violation_count, None, "peer counters are private");

    let own = snapshot
        .participants
        .iter()
        .find(|p| p.participant_id == bystander.participant_id)
        .expect("viewer present");
    assert!(own.violation_count.is_some(), "own counters are visible");
}

#[tokio::test]
async fn test_report_for_unknown_participant_fails() {
    let harness = Harness::new();
    let exam = ExamId::new();
    let mut host = harness.connect("prof");
    harness.join(&mut host, exam, Role::Host).await;

    let err = harness
        .engine
        .sessions()
        .report_violation(exam, report(ParticipantId::new(), "tab_switch", 0))
        .await
        .expect_err("unknown participant must be rejected");
    assert_eq!(err.kind, ErrorKind::UnknownParticipant);
}
