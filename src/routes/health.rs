use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/live", get(live))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    courses: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LivenessResponse {
    status: &'static str,
    start_time: String,
    uptime: u64,
    active_learner_locks: usize,
}

async fn root(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        courses: state.tutor().catalog().course_ids().len(),
    })
}

async fn live(State(state): State<AppState>) -> Json<LivenessResponse> {
    let started: DateTime<Utc> = state.started_at_system().into();
    Json(LivenessResponse {
        status: "healthy",
        start_time: started.to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: state.uptime_seconds(),
        active_learner_locks: state.tutor().coordinator().active_locks(),
    })
}
