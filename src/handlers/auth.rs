use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::{JwtClaims, JwtService},
    models::user::{AuthResponse, LoginRequest, RegisterRequest, UserProfile},
    services::{auth_service::AuthService, AppState},
};

const REFRESH_COOKIE: &str = "refresh_token";
const COOKIE_PATH: &str = "/api/auth";

fn auth_service(state: &AppState) -> AuthService {
    let jwt_service = JwtService::new(&state.config.jwt_secret);
    AuthService::new(state.mongo.clone(), jwt_service)
}

fn refresh_cookie(token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .path(COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(30))
        .build()
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let issued = auth_service(&state).register(req).await?;

    let jar = jar.add(refresh_cookie(issued.refresh_token));
    let body = AuthResponse {
        access_token: issued.access_token,
        user: issued.user,
    };

    Ok((StatusCode::CREATED, jar, Json(body)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let issued = auth_service(&state).login(req).await?;

    let jar = jar.add(refresh_cookie(issued.refresh_token));
    let body = AuthResponse {
        access_token: issued.access_token,
        user: issued.user,
    };

    Ok((StatusCode::OK, jar, Json(body)))
}

/// POST /api/auth/refresh - new access token from the refresh cookie
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let refresh_token = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or(ApiError::Unauthorized)?;

    let access_token = auth_service(&state).refresh(&refresh_token).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "access_token": access_token })),
    ))
}

/// POST /api/auth/logout - revoke the refresh token and clear the cookie
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE) {
        auth_service(&state).logout(cookie.value()).await?;
    }

    let expired = Cookie::build((REFRESH_COOKIE, ""))
        .path(COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build();

    Ok((StatusCode::NO_CONTENT, jar.add(expired)))
}

/// GET /api/auth/is-logged-in (protected; reaching it at all means the
/// token passed the auth layer)
pub async fn is_logged_in(Extension(claims): Extension<JwtClaims>) -> impl IntoResponse {
    Json(serde_json::json!({
        "logged_in": true,
        "user_id": claims.sub,
    }))
}

/// GET /api/auth/me (protected)
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = auth_service(&state).get_user_by_id(&claims.sub).await?;
    Ok(Json(UserProfile::from(user)))
}
