use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::submission_lifecycle::EngineError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::RetakeDenied(reason) => ApiError::Conflict(reason.as_str().to_string()),
            EngineError::MalformedAnswer(message) => {
                ApiError::BadRequest(format!("MalformedAnswer: {message}"))
            }
            EngineError::QuestionNotInPaper => {
                ApiError::NotFound("QuestionNotInPaper".to_string())
            }
            EngineError::SubmissionNotInProgress => {
                ApiError::Conflict("SubmissionNotInProgress".to_string())
            }
            EngineError::SubmissionNotFound => ApiError::NotFound("Submission not found".to_string()),
            EngineError::PaperNotFound => ApiError::NotFound("Exam paper not found".to_string()),
            EngineError::QuestionNotFound(id) => {
                ApiError::internal(format!("question {id} is missing"), "Question bank is inconsistent")
            }
            EngineError::StorageConflict(message) => {
                tracing::warn!(error = %message, "Storage conflict; caller may retry");
                ApiError::ServiceUnavailable("Concurrent update conflict, retry".to_string())
            }
            EngineError::Storage(err) => ApiError::internal(err, "Storage failure"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Conflict(message)
            | ApiError::ServiceUnavailable(message) => message,
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                message
            }
        };

        (status, Json(ErrorResponse { status: status.as_u16(), detail })).into_response()
    }
}
