use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::{Experiment, ModelParams, ProblemCategory};
use crate::response::{ok, AppError};
use crate::services::catalog::ProblemFilter;
use crate::services::coordinator::SelectionOutcome;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses).post(create_course))
        .route("/:course_id/skill", get(list_skills).post(create_skill))
        .route("/:course_id/skill/:skill_name", get(list_skill_problems))
        .route("/:course_id/problem", get(list_problems).post(create_problem))
        .route("/:course_id/user", get(list_users).post(enroll_user))
        .route("/:course_id/experiment", get(list_experiments).post(create_experiment))
        .route(
            "/:course_id/experiment/:experiment_name",
            get(get_experiment).delete(delete_experiment),
        )
        .route("/:course_id/model_params", get(get_model_params).post(set_model_params))
}

#[derive(Debug, Deserialize)]
struct CreateCourseRequest {
    course_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateSkillRequest {
    skill_name: String,
}

#[derive(Debug, Deserialize)]
struct CreateProblemRequest {
    problem_name: String,
    tutor_url: String,
    skills: Vec<String>,
    #[serde(default)]
    pretest: bool,
    #[serde(default)]
    posttest: bool,
}

#[derive(Debug, Deserialize)]
struct EnrollRequest {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateExperimentRequest {
    experiment_name: String,
    start_time: i64,
    end_time: i64,
}

#[derive(Debug, Deserialize)]
struct ModelParamsRequest {
    params: Vec<ModelParams>,
    #[serde(default)]
    replace: bool,
}

#[derive(Debug, Serialize)]
struct EnrollResponse {
    user_id: String,
    /// `false` when the first decision could not be made; the next event
    /// retries it.
    selected: bool,
}

fn required(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

async fn list_courses(State(state): State<AppState>) -> impl IntoResponse {
    ok(state.tutor().catalog().course_ids())
}

async fn create_course(
    State(state): State<AppState>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    required(&payload.course_id, "course_id")?;
    state.tutor().catalog().create_course(&payload.course_id)?;
    Ok((StatusCode::CREATED, ok(payload.course_id)))
}

async fn list_skills(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.tutor().catalog().skills(&course_id)?))
}

async fn create_skill(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Json(payload): Json<CreateSkillRequest>,
) -> Result<impl IntoResponse, AppError> {
    required(&payload.skill_name, "skill_name")?;
    state.tutor().catalog().register_skill(&course_id, &payload.skill_name)?;
    Ok((StatusCode::CREATED, ok(payload.skill_name)))
}

async fn list_skill_problems(
    State(state): State<AppState>,
    Path((course_id, skill_name)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let problems = state
        .tutor()
        .catalog()
        .problems(&course_id, ProblemFilter::skill(&skill_name))?;
    Ok(ok(problems))
}

async fn list_problems(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.tutor().catalog().problems(&course_id, ProblemFilter::default())?))
}

async fn create_problem(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Json(payload): Json<CreateProblemRequest>,
) -> Result<impl IntoResponse, AppError> {
    required(&payload.problem_name, "problem_name")?;
    let category = match (payload.pretest, payload.posttest) {
        (true, true) => return Err(AppError::validation("a problem cannot be both pretest and posttest")),
        (true, false) => ProblemCategory::Pretest,
        (false, true) => ProblemCategory::Posttest,
        (false, false) => ProblemCategory::Normal,
    };
    let problem = state.tutor().catalog().register_problem(
        &course_id,
        &payload.problem_name,
        &payload.tutor_url,
        payload.skills,
        category,
    )?;
    Ok((StatusCode::CREATED, ok(problem)))
}

async fn list_users(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.tutor().progress().membership(&course_id)?))
}

async fn enroll_user(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Json(payload): Json<EnrollRequest>,
) -> Result<impl IntoResponse, AppError> {
    required(&payload.user_id, "user_id")?;
    let outcome = state.tutor().enroll(&course_id, &payload.user_id)?;
    let selected = matches!(outcome, SelectionOutcome::Selected(_));
    Ok((
        StatusCode::CREATED,
        ok(EnrollResponse {
            user_id: payload.user_id,
            selected,
        }),
    ))
}

async fn list_experiments(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.tutor().catalog().experiments(&course_id)?))
}

async fn create_experiment(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Json(payload): Json<CreateExperimentRequest>,
) -> Result<impl IntoResponse, AppError> {
    required(&payload.experiment_name, "experiment_name")?;
    let experiment = Experiment {
        name: payload.experiment_name,
        start_time: payload.start_time,
        end_time: payload.end_time,
    };
    state.tutor().catalog().add_experiment(&course_id, experiment.clone())?;
    Ok((StatusCode::CREATED, ok(experiment)))
}

async fn get_experiment(
    State(state): State<AppState>,
    Path((course_id, experiment_name)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.tutor().catalog().experiment(&course_id, &experiment_name)?))
}

async fn delete_experiment(
    State(state): State<AppState>,
    Path((course_id, experiment_name)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    state.tutor().catalog().remove_experiment(&course_id, &experiment_name)?;
    Ok(ok(experiment_name))
}

async fn get_model_params(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.tutor().parameters().default_pool(&course_id)?))
}

async fn set_model_params(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Json(payload): Json<ModelParamsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let parameters = state.tutor().parameters();
    parameters.set_default_pool(&course_id, payload.params, payload.replace)?;
    Ok(ok(parameters.default_pool(&course_id)?))
}
