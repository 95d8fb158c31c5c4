use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::{ModelParams, ParameterKey};
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_parameters).post(set_parameters))
        .route("/bulk", get(list_parameters).post(set_parameters_bulk))
}

#[derive(Debug, Deserialize)]
struct ParameterRequest {
    course_id: Option<String>,
    user_id: Option<String>,
    skill_name: Option<String>,
    params: ModelParams,
}

#[derive(Debug, Deserialize)]
struct BulkParameterRequest {
    course_id: String,
    user_id: String,
    params: Option<ModelParams>,
}

#[derive(Debug, Serialize)]
struct BulkParameterResponse {
    course_id: String,
    user_id: String,
    skills: Vec<String>,
}

async fn list_parameters(State(state): State<AppState>) -> impl IntoResponse {
    ok(state.tutor().parameters().all())
}

async fn set_parameters(
    State(state): State<AppState>,
    Json(payload): Json<ParameterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let key: ParameterKey = state.tutor().parameters().set_parameters(
        payload.course_id.as_deref(),
        payload.user_id.as_deref(),
        payload.skill_name.as_deref(),
        payload.params,
    )?;
    Ok((StatusCode::CREATED, ok(key)))
}

async fn set_parameters_bulk(
    State(state): State<AppState>,
    Json(payload): Json<BulkParameterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let skills = state
        .tutor()
        .parameters()
        .configure_learner(&payload.course_id, &payload.user_id, payload.params)?;
    tracing::info!(
        course_id = %payload.course_id,
        learner_id = %payload.user_id,
        skills = skills.len(),
        "learner parameters configured"
    );
    Ok((
        StatusCode::CREATED,
        ok(BulkParameterResponse {
            course_id: payload.course_id,
            user_id: payload.user_id,
            skills,
        }),
    ))
}
