use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::submission::{
    FinalizeResponse, SubmissionStateResponse, SubmitAnswerResponse,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:submission_id", get(get_submission))
        .route("/:submission_id/answers/:paper_question_id", put(submit_answer))
        .route("/:submission_id/finalize", post(finalize))
}

/// The request body is the answer payload itself.
async fn submit_answer(
    State(state): State<AppState>,
    Path((submission_id, paper_question_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<SubmitAnswerResponse>, ApiError> {
    let limit = state.settings().engine().answer_payload_max_chars;
    if body.len() > limit.saturating_mul(4) {
        return Err(ApiError::BadRequest(format!(
            "MalformedAnswer: answer payload exceeds {limit} characters"
        )));
    }
    let body = std::str::from_utf8(&body).map_err(|err| {
        ApiError::BadRequest(format!("MalformedAnswer: answer payload is not UTF-8 ({err})"))
    })?;

    let submitted =
        state.engine().submit_answer(&submission_id, &paper_question_id, body).await?;
    Ok(Json(SubmitAnswerResponse::from_submitted(submitted)))
}

async fn finalize(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
) -> Result<Json<FinalizeResponse>, ApiError> {
    let result = state.engine().finalize(&submission_id).await?;
    Ok(Json(FinalizeResponse::from_result(result)))
}

async fn get_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
) -> Result<Json<SubmissionStateResponse>, ApiError> {
    let snapshot = state.engine().submission_state(&submission_id).await?;
    Ok(Json(SubmissionStateResponse::from_state(snapshot)))
}
