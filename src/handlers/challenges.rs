use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    error::ApiError,
    models::challenge::ChallengeView,
    services::{challenge_service::ChallengeService, AppState},
};

/// GET /api/challenges-list/get-all-challenges
pub async fn get_all_challenges(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let service = ChallengeService::new(state.mongo.clone());
    let challenges = service.get_all().await?;
    Ok(Json(challenges))
}

/// GET /api/challenges-list/get-challenge/{challenge_id}
pub async fn get_challenge(
    State(state): State<Arc<AppState>>,
    Path(challenge_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = ChallengeService::new(state.mongo.clone());
    let challenge = service
        .get_by_id(&challenge_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Challenge not found.".to_string()))?;

    Ok(Json(ChallengeView::from(challenge)))
}
