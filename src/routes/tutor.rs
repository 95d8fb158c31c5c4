use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::response::{ok, AppError};
use crate::services::coordinator::SelectionOutcome;
use crate::services::selector::{Phase, SkillEstimate};
use crate::services::tutor::ResponseInput;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:course_id/user/:user_id", get(status))
        .route("/:course_id/user/:user_id/interaction", post(post_interaction))
        .route("/:course_id/user/:user_id/pageload", post(post_page_load))
        .route("/:course_id/user/:user_id/estimates", get(estimates))
}

/// Tutors send correctness either as a JSON bool or as 0/1.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Correctness {
    Flag(bool),
    Numeric(i64),
}

impl Correctness {
    fn is_correct(self) -> Result<bool, AppError> {
        match self {
            Self::Flag(flag) => Ok(flag),
            Self::Numeric(0) => Ok(false),
            Self::Numeric(1) => Ok(true),
            Self::Numeric(other) => Err(AppError::validation(format!("correct must be 0 or 1, got {other}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InteractionRequest {
    problem: String,
    correct: Correctness,
    attempt: i64,
    unix_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PageLoadRequest {
    problem: String,
    unix_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
struct EventResponse {
    stored: bool,
    finished: bool,
    /// Set when problem selection failed after the event was stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    selection_error: Option<String>,
}

#[derive(Debug, Serialize)]
struct EstimatesResponse {
    phase: Phase,
    skills: Vec<SkillEstimate>,
}

fn timestamp(unix_seconds: Option<i64>) -> Result<DateTime<Utc>, AppError> {
    match unix_seconds {
        None => Ok(Utc::now()),
        Some(secs) => DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| AppError::validation(format!("unix_seconds out of range: {secs}"))),
    }
}

fn selection_error(outcome: SelectionOutcome) -> Option<String> {
    match outcome {
        SelectionOutcome::Failed(message) => Some(message),
        _ => None,
    }
}

async fn status(
    State(state): State<AppState>,
    Path((course_id, user_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.tutor().status(&course_id, &user_id)?))
}

async fn post_interaction(
    State(state): State<AppState>,
    Path((course_id, user_id)): Path<(String, String)>,
    Json(payload): Json<InteractionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = u32::try_from(payload.attempt)
        .ok()
        .filter(|attempt| *attempt >= 1)
        .ok_or_else(|| AppError::validation("attempt numbers start at 1"))?;
    let input = ResponseInput {
        problem: payload.problem,
        correct: payload.correct.is_correct()?,
        attempt,
        timestamp: timestamp(payload.unix_seconds)?,
    };
    let receipt = state.tutor().record_response(&course_id, &user_id, input)?;
    Ok((
        StatusCode::CREATED,
        ok(EventResponse {
            stored: receipt.record.stored,
            finished: receipt.record.finished,
            selection_error: selection_error(receipt.selection),
        }),
    ))
}

async fn post_page_load(
    State(state): State<AppState>,
    Path((course_id, user_id)): Path<(String, String)>,
    Json(payload): Json<PageLoadRequest>,
) -> Result<impl IntoResponse, AppError> {
    let at = timestamp(payload.unix_seconds)?;
    let outcome = state
        .tutor()
        .record_page_load(&course_id, &user_id, &payload.problem, at)?;
    Ok((
        StatusCode::CREATED,
        ok(EventResponse {
            stored: true,
            finished: false,
            selection_error: selection_error(outcome),
        }),
    ))
}

async fn estimates(
    State(state): State<AppState>,
    Path((course_id, user_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let selector = state.tutor().selector();
    Ok(ok(EstimatesResponse {
        phase: selector.phase(&course_id, &user_id)?,
        skills: selector.estimates(&course_id, &user_id)?,
    }))
}
