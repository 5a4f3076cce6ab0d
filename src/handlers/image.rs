use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

use crate::{error::ApiError, services::AppState};

lazy_static! {
    // Also rules out traversal: no '.', '/' or '\' can appear in a valid id.
    static ref IMAGE_ID_RE: Regex = Regex::new(r"^[a-zA-Z0-9_-]{1,128}$").unwrap();
}

/// GET /api/img/{image_id} - serves a generated reward image.
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(image_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !IMAGE_ID_RE.is_match(&image_id) {
        return Err(ApiError::BadRequest("Invalid image id.".to_string()));
    }

    let path = std::path::Path::new(&state.config.image_dir).join(format!("{}.png", image_id));

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::NotFound("Image not found.".to_string()))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}
