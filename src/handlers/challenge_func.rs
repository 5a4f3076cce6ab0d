use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::progress::{StartChallengeRequest, SubmitRequest, TrialSubmitRequest},
    services::{
        challenge_service::ChallengeService,
        image_service::RewardImageGenerator,
        scoring_service::ScoringGateway,
        workflow_service::{self, WorkflowService},
        AppState,
    },
};

fn workflow(state: &AppState) -> WorkflowService {
    WorkflowService::new(state.mongo.clone(), state.config.submit_interval_seconds)
}

/// POST /api/challenges-func/start-challenge
pub async fn start_challenge(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<StartChallengeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let challenge = ChallengeService::new(state.mongo.clone())
        .get_by_id(&req.challenge_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Challenge not found.".to_string()))?;

    let response = workflow(&state).start(&claims.sub, challenge).await?;
    Ok(Json(response))
}

/// POST /api/challenges-func/submit
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<SubmitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scoring = ScoringGateway::new(
        state.config.scoring_api_url.clone(),
        state.config.scoring_api_key.clone(),
        state.config.scoring_model.clone(),
    );
    let images = RewardImageGenerator::new(
        state.config.image_api_url.clone(),
        state.config.image_api_key.clone(),
        state.config.image_dir.clone(),
    );

    let response = workflow(&state)
        .submit(&claims.sub, &req.submission, &scoring, &images)
        .await?;
    Ok(Json(response))
}

/// POST /api/challenges-func/submit-for-trial (public, stateless)
pub async fn submit_for_trial(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<TrialSubmitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let challenge = ChallengeService::new(state.mongo.clone())
        .get_by_id(&req.challenge_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Challenge not found.".to_string()))?;

    let response = workflow_service::trial_evaluate(
        &challenge,
        &req.submission,
        state.config.score_magnification,
    )?;
    Ok(Json(response))
}

/// GET /api/challenges-func/get-challenge-progress
pub async fn get_challenge_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let response = workflow(&state).get_progress(&claims.sub).await?;
    Ok(Json(response))
}

/// GET /api/challenges-func/give-up-challenge
pub async fn give_up_challenge(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    workflow(&state).give_up(&claims.sub).await?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Challenge abandoned." })),
    ))
}

/// GET /api/challenges-func/complete-challenge
pub async fn complete_challenge(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let submission_id = workflow(&state).complete(&claims.sub).await?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Challenge completed!",
            "submission_id": submission_id,
        })),
    ))
}

/// GET /api/challenges-func/get-all-submission
pub async fn get_all_submissions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let summaries = workflow(&state).list_archived(&claims.sub).await?;
    Ok(Json(summaries))
}

/// GET /api/challenges-func/get-submission/{submission_id}
pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(submission_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = workflow(&state)
        .get_archived(&claims.sub, &submission_id)
        .await?;
    Ok(Json(record))
}
