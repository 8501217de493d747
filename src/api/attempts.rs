use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::attempt::{
    AttemptListResponse, ListAttemptsQuery, StartAttemptRequest, StartAttemptResponse,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:paper_id/attempts", post(start_attempt).get(list_attempts))
}

async fn start_attempt(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<(StatusCode, Json<StartAttemptResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let started = state.engine().start_attempt(&paper_id, &payload.user_id).await?;
    Ok((StatusCode::CREATED, Json(StartAttemptResponse::from_started(started))))
}

async fn list_attempts(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
    Query(params): Query<ListAttemptsQuery>,
) -> Result<Json<AttemptListResponse>, ApiError> {
    params.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let history = state.engine().list_attempts(&paper_id, &params.user_id).await?;
    Ok(Json(AttemptListResponse::from_history(params.user_id, history)))
}
