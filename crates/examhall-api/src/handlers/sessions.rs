//! Admin session endpoints.
//!
//! These bypass the host check: the admin surface is trusted and acts
//! with full authority over any session.

use axum::Json;
use axum::extract::{Path, State};

use examhall_core::types::id::ExamId;
use examhall_realtime::session::state::{EndReason, SessionSnapshot, SnapshotScope};

use crate::dto::request::{EndSessionRequest, TimerCommandRequest};
use crate::dto::response::TimerResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/sessions/{id} — unredacted session snapshot.
pub async fn get_session(
    State(state): State<AppState>,
    Path(exam_id): Path<ExamId>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let snapshot = state
        .engine
        .sessions()
        .snapshot(exam_id, SnapshotScope::Full)
        .await?;
    Ok(Json(snapshot))
}

/// POST /api/sessions/{id}/start — start the session.
pub async fn start_session(
    State(state): State<AppState>,
    Path(exam_id): Path<ExamId>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let snapshot = state.engine.sessions().start(exam_id, None).await?;
    Ok(Json(snapshot))
}

/// POST /api/sessions/{id}/end — end the session. Idempotent.
pub async fn end_session(
    State(state): State<AppState>,
    Path(exam_id): Path<ExamId>,
    body: Option<Json<EndSessionRequest>>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let reason = body
        .and_then(|Json(req)| req.reason)
        .unwrap_or(EndReason::HostRequested);
    let snapshot = state.engine.sessions().end(exam_id, reason, None).await?;
    Ok(Json(snapshot))
}

/// POST /api/sessions/{id}/timer — drive the countdown.
pub async fn timer_command(
    State(state): State<AppState>,
    Path(exam_id): Path<ExamId>,
    Json(command): Json<TimerCommandRequest>,
) -> Result<Json<TimerResponse>, ApiError> {
    let sessions = state.engine.sessions();
    let timer = match command {
        TimerCommandRequest::Start { duration_seconds } => {
            sessions.start_timer(exam_id, duration_seconds, None).await?
        }
        TimerCommandRequest::Pause => sessions.pause_timer(exam_id, None).await?,
        TimerCommandRequest::Resume => sessions.resume_timer(exam_id, None).await?,
        TimerCommandRequest::Extend { additional_seconds } => {
            sessions.extend_timer(exam_id, additional_seconds, None).await?
        }
    };
    Ok(Json(TimerResponse { timer }))
}
