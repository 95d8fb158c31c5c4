use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::db::DataError;
use crate::services::progress::ProgressError;
use crate::services::selector::SelectionError;
use crate::services::tutor::TutorError;

#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<SuccessResponse<T>> {
    Json(SuccessResponse { success: true, data })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn operational(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        json_error(status, code, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: self.message,
            code: self.code,
        };

        (self.status, Json(body)).into_response()
    }
}

pub fn json_error(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: code.into(),
        message: message.into(),
    }
}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        tracing::warn!(error = %err, "data error");
        match err {
            DataError::NotFound(_) => Self::not_found(err.to_string()),
            DataError::DuplicateKey(_) => Self::conflict(err.to_string()),
            DataError::UnknownSkill(_) => Self::validation(err.to_string()),
            DataError::Constraint(_) => Self::validation(err.to_string()),
        }
    }
}

impl From<ProgressError> for AppError {
    fn from(err: ProgressError) -> Self {
        match err {
            ProgressError::InvalidTransition(message) => json_error(StatusCode::CONFLICT, "INVALID_TRANSITION", message),
            ProgressError::Data(err) => err.into(),
        }
    }
}

impl From<SelectionError> for AppError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::Data(err) => err.into(),
            SelectionError::InvalidScope(_) | SelectionError::InvalidParameters(_) => Self::validation(err.to_string()),
            SelectionError::UnresolvedParameters { .. } => {
                json_error(StatusCode::CONFLICT, "UNRESOLVED_PARAMETERS", err.to_string())
            }
        }
    }
}

impl From<TutorError> for AppError {
    fn from(err: TutorError) -> Self {
        match err {
            TutorError::Data(err) => err.into(),
            TutorError::Progress(err) => err.into(),
            TutorError::Selection(err) => err.into(),
        }
    }
}
