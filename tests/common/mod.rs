#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use mongodb::bson::doc;
use std::sync::Arc;
use tower::ServiceExt;
use writing_contest_api::{config::Config, create_router, services::AppState};

pub const TEST_CHALLENGE_ID: &str = "test-challenge";
pub const TEST_RESULT_SAMPLE: &str = "word otherword foo bar";

pub async fn create_test_app() -> Router {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // The request-volume limiter would trip across parallel tests sharing
    // one Redis; the submission-interval limiter is what these tests cover.
    std::env::set_var("RATE_LIMIT_DISABLED", "1");

    dotenvy::from_filename(".env.test").ok();

    let config = Config::load().expect("Failed to load test configuration");

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to connect to test MongoDB");

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create test Redis client");

    let app_state = Arc::new(
        AppState::new(config.clone(), mongo_client.clone(), redis_client)
            .await
            .expect("Failed to initialize test app state"),
    );

    seed_test_data(&mongo_client, &config.mongo_database).await;

    create_router(app_state)
}

async fn seed_test_data(mongo_client: &mongodb::Client, db_name: &str) {
    let db = mongo_client.database(db_name);
    let challenges = db.collection::<mongodb::bson::Document>("challenges");

    let exists = challenges
        .find_one(doc! { "_id": TEST_CHALLENGE_ID })
        .await
        .unwrap();

    if exists.is_none() {
        let result = challenges
            .insert_one(doc! {
                "_id": TEST_CHALLENGE_ID,
                "title": "Test Challenge",
                "image_path": "/api/img/test-challenge-cover",
                "image_hash": "",
                "result_sample": TEST_RESULT_SAMPLE,
                "result_sample_image_paths": [
                    "/api/img/test-challenge-bronze",
                    "/api/img/test-challenge-silver",
                    "/api/img/test-challenge-gold",
                ],
                "created_at": mongodb::bson::DateTime::now(),
            })
            .await;

        match result {
            Ok(_) => {}
            Err(e) => {
                // Parallel test already inserted it (duplicate key)
                if let mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(
                    ref we,
                )) = *e.kind
                {
                    if we.code == 11000 {
                        return;
                    }
                }
                panic!("Failed to seed test challenge: {:?}", e);
            }
        }
    }
}

/// Registers a fresh user and returns its access token.
pub async fn register_and_token(app: &Router) -> String {
    let email = format!("test-{}@example.com", uuid::Uuid::new_v4());

    let request_body = serde_json::json!({
        "email": email,
        "password": "test-password-123",
        "name": "Test User",
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

    assert_eq!(response.status(), StatusCode::CREATED);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    json["access_token"].as_str().unwrap().to_string()
}

pub async fn get_json(app: &Router, uri: &str, token: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

pub async fn get_public(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");

    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }

    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}
