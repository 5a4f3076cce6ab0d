use axum::http::StatusCode;
use serde_json::json;

mod common;

use common::TEST_CHALLENGE_ID;

async fn trial_submit(app: &axum::Router, text: &str) -> (StatusCode, serde_json::Value) {
    common::post_json(
        app,
        "/api/challenges-func/submit-for-trial",
        None,
        json!({ "challenge_id": TEST_CHALLENGE_ID, "submission": text }),
    )
    .await
}

// The test challenge reference is "word otherword foo bar" (4 unique words)
// and the configured magnification is 150 percent, so each overlapping word
// is worth 37.5 points.

#[tokio::test]
async fn trial_requires_no_auth() {
    let app = common::create_test_app().await;

    let (status, body) = trial_submit(&app, "word").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Submission successful!");
    assert!(body["score"].is_i64());
}

#[tokio::test]
async fn trial_score_is_deterministic() {
    let app = common::create_test_app().await;

    // 2 of 4 reference words, x1.5 -> 75
    let (_, first) = trial_submit(&app, "word word otherword").await;
    let (_, second) = trial_submit(&app, "word word otherword").await;

    assert_eq!(first["score"], 75);
    assert_eq!(second["score"], 75);
}

#[tokio::test]
async fn trial_reward_image_tracks_score_band() {
    let app = common::create_test_app().await;

    // 0 overlap -> score 0, below every band
    let (_, body) = trial_submit(&app, "nothing matches here").await;
    assert_eq!(body["score"], 0);
    assert!(body.get("reward_image_url").is_none());

    // 2 of 4 -> 75, middle band
    let (_, body) = trial_submit(&app, "word otherword").await;
    assert_eq!(body["score"], 75);
    assert_eq!(body["reward_image_url"], "/api/img/test-challenge-silver");

    // 3 of 4 -> 112.5 clamped to 100, top band
    let (_, body) = trial_submit(&app, "word otherword foo").await;
    assert_eq!(body["score"], 100);
    assert_eq!(body["reward_image_url"], "/api/img/test-challenge-gold");
}

#[tokio::test]
async fn trial_rejects_invalid_text() {
    let app = common::create_test_app().await;

    for text in ["", "nope!", "текст"] {
        let (status, body) = trial_submit(&app, text).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "text {:?}", text);
        assert_eq!(body["message"], "Submission text is invalid.");
    }
}

#[tokio::test]
async fn trial_unknown_challenge_is_not_found() {
    let app = common::create_test_app().await;

    let (status, _) = common::post_json(
        &app,
        "/api/challenges-func/submit-for-trial",
        None,
        json!({ "challenge_id": "no-such-challenge", "submission": "word" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn trial_leaves_no_progress_behind() {
    let app = common::create_test_app().await;
    let token = common::register_and_token(&app).await;

    trial_submit(&app, "word otherword").await;

    let (status, body) =
        common::get_json(&app, "/api/challenges-func/get-challenge-progress", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);
}
