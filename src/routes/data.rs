use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/logs/course/:course_id", get(course_log))
        .route("/logs/course/:course_id/user/:user_id", get(user_log))
        .route("/logs/course/:course_id/user/:user_id/problem/:problem", get(problem_log))
        .route("/logs/course/:course_id/experiment/:experiment", get(experiment_log))
        .route("/subjects/course/:course_id/experiment/:experiment", get(experiment_subjects))
        .route("/trajectory/course/:course_id", get(course_trajectories))
        .route("/trajectory/course/:course_id/user/:user_id", get(user_trajectory))
        .route(
            "/trajectory/course/:course_id/experiment/:experiment",
            get(experiment_trajectories),
        )
}

async fn course_log(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.reports().course_log(&course_id)?))
}

async fn user_log(
    State(state): State<AppState>,
    Path((course_id, user_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.reports().user_log(&course_id, &user_id)?))
}

async fn problem_log(
    State(state): State<AppState>,
    Path((course_id, user_id, problem)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.reports().problem_log(&course_id, &user_id, &problem)?))
}

async fn experiment_log(
    State(state): State<AppState>,
    Path((course_id, experiment)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.reports().experiment_log(&course_id, &experiment)?))
}

async fn experiment_subjects(
    State(state): State<AppState>,
    Path((course_id, experiment)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.reports().experiment_subjects(&course_id, &experiment)?))
}

async fn course_trajectories(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.reports().course_trajectories(&course_id)?))
}

async fn user_trajectory(
    State(state): State<AppState>,
    Path((course_id, user_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.reports().user_trajectory(&course_id, &user_id)?))
}

async fn experiment_trajectories(
    State(state): State<AppState>,
    Path((course_id, experiment)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.reports().experiment_trajectories(&course_id, &experiment)?))
}
