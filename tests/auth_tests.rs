use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;

async fn register_user(
    app: &axum::Router,
    email: &str,
    password: &str,
    name: &str,
) -> (StatusCode, serde_json::Value, Vec<String>) {
    let request_body = json!({
        "email": email,
        "password": password,
        "name": name,
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/register")
                .header("content-type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let cookies: Vec<String> = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(|s| s.to_string()))
        .collect();

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);

    (status, json, cookies)
}

fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, uuid::Uuid::new_v4())
}

fn extract_refresh_token_cookie(cookies: &[String]) -> Option<String> {
    cookies
        .iter()
        .find(|c| c.starts_with("refresh_token="))
        .and_then(|c| c.split(';').next())
        .and_then(|pair| pair.strip_prefix("refresh_token="))
        .map(|v| v.to_string())
}

#[tokio::test]
async fn register_returns_token_and_refresh_cookie() {
    let app = common::create_test_app().await;
    let email = unique_email("register");

    let (status, body, cookies) = register_user(&app, &email, "password-123", "Alice").await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["access_token"].as_str().is_some());
    assert_eq!(body["user"]["email"], email);
    // Password material never leaves the server
    assert!(body["user"].get("password_hash").is_none());

    let refresh = extract_refresh_token_cookie(&cookies).expect("refresh cookie missing");
    assert!(!refresh.is_empty());
    assert!(cookies.iter().any(|c| c.contains("HttpOnly")));
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = common::create_test_app().await;
    let email = unique_email("duplicate");

    let (first, _, _) = register_user(&app, &email, "password-123", "First").await;
    assert_eq!(first, StatusCode::CREATED);

    let (second, _, _) = register_user(&app, &email, "password-456", "Second").await;
    assert_eq!(second, StatusCode::CONFLICT);
}

#[tokio::test]
async fn register_rejects_invalid_payload() {
    let app = common::create_test_app().await;

    let (status, _, _) = register_user(&app, "not-an-email", "password-123", "Bob").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = register_user(&app, &unique_email("shortpw"), "short", "Bob").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_roundtrip() {
    let app = common::create_test_app().await;
    let email = unique_email("login");

    let (status, _, _) = register_user(&app, &email, "password-123", "Carol").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = common::post_json(
        &app,
        "/api/auth/login",
        None,
        json!({ "email": email, "password": "password-123" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].as_str().is_some());
    assert_eq!(body["user"]["email"], email);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = common::create_test_app().await;
    let email = unique_email("wrongpw");

    register_user(&app, &email, "password-123", "Dave").await;

    let (status, _) = common::post_json(
        &app,
        "/api/auth/login",
        None,
        json!({ "email": email, "password": "not-the-password" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_with_unknown_email_is_unauthorized() {
    let app = common::create_test_app().await;

    let (status, _) = common::post_json(
        &app,
        "/api/auth/login",
        None,
        json!({ "email": unique_email("ghost"), "password": "password-123" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_requires_token() {
    let app = common::create_test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_profile() {
    let app = common::create_test_app().await;
    let token = common::register_and_token(&app).await;

    let (status, body) = common::get_json(&app, "/api/auth/me", &token).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["email"].as_str().is_some());
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn is_logged_in_reflects_auth_layer() {
    let app = common::create_test_app().await;
    let token = common::register_and_token(&app).await;

    let (status, body) = common::get_json(&app, "/api/auth/is-logged-in", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["logged_in"], true);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/auth/is-logged-in")
                .header("authorization", "Bearer garbage-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_issues_new_access_token() {
    let app = common::create_test_app().await;
    let email = unique_email("refresh");

    let (_, _, cookies) = register_user(&app, &email, "password-123", "Erin").await;
    let refresh = extract_refresh_token_cookie(&cookies).unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header("cookie", format!("refresh_token={}", refresh))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["access_token"].as_str().is_some());
}

#[tokio::test]
async fn refresh_without_cookie_is_unauthorized() {
    let app = common::create_test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_refresh_token() {
    let app = common::create_test_app().await;
    let email = unique_email("logout");

    let (_, body, cookies) = register_user(&app, &email, "password-123", "Frank").await;
    let access_token = body["access_token"].as_str().unwrap().to_string();
    let refresh = extract_refresh_token_cookie(&cookies).unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header("authorization", format!("Bearer {}", access_token))
                .header("cookie", format!("refresh_token={}", refresh))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The revoked token can no longer mint access tokens
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header("cookie", format!("refresh_token={}", refresh))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
