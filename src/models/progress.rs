use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::challenge::ChallengeView;

/// One accepted submission inside a progress record. Append-only,
/// insertion order is chronological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionEntry {
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub score: i32,
}

/// Per-user challenge progress stored in the "user_challenges" collection.
///
/// At most one record per user may have `completed_at == null` (enforced by
/// a partial unique index). `last_*` fields denormalize the submissions tail;
/// `last_submitted_at` (unix millis) is the rate-limit clock and only ever
/// advances via the conditional update in the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserChallengeProgress {
    pub user_id: String,
    pub challenge_id: String,
    pub challenge: ChallengeView,
    #[serde(default)]
    pub submissions: Vec<SubmissionEntry>,
    #[serde(default)]
    pub last_submitted_text: String,
    #[serde(default)]
    pub last_submitted_at: i64,
    #[serde(default)]
    pub last_submission_score: i32,
    #[serde(default)]
    pub generated_images: Vec<String>,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
    #[serde(with = "super::bson_datetime_as_chrono_option")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl UserChallengeProgress {
    pub fn new(user_id: &str, challenge: ChallengeView, now: DateTime<Utc>) -> Self {
        UserChallengeProgress {
            user_id: user_id.to_string(),
            challenge_id: challenge.id.clone(),
            challenge,
            submissions: Vec::new(),
            last_submitted_text: String::new(),
            last_submitted_at: 0,
            last_submission_score: 0,
            generated_images: Vec::new(),
            started_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartChallengeRequest {
    #[validate(length(min = 1, max = 128, message = "challenge_id must not be empty"))]
    pub challenge_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub submission: String,
}

#[derive(Debug, Deserialize)]
pub struct TrialSubmitRequest {
    pub challenge_id: String,
    pub submission: String,
}

/// Response for start-challenge and submit.
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub message: String,
    pub challenge: ChallengeView,
    pub submissions: Vec<SubmissionEntry>,
    pub last_submitted_text: String,
    pub last_submission_score: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_img_url: Option<String>,
}

impl ProgressResponse {
    pub fn from_progress(message: &str, progress: UserChallengeProgress) -> Self {
        ProgressResponse {
            message: message.to_string(),
            challenge: progress.challenge,
            submissions: progress.submissions,
            last_submitted_text: progress.last_submitted_text,
            last_submission_score: progress.last_submission_score,
            generated_img_url: None,
        }
    }
}

/// Response for get-challenge-progress. "No active challenge" is a valid
/// state, not an error, hence the explicit `active` flag.
#[derive(Debug, Serialize)]
pub struct ProgressStateResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<ChallengeView>,
    pub submissions: Vec<SubmissionEntry>,
    pub last_submitted_text: String,
    pub last_submission_score: i32,
}

impl ProgressStateResponse {
    pub fn none() -> Self {
        ProgressStateResponse {
            active: false,
            challenge: None,
            submissions: Vec::new(),
            last_submitted_text: String::new(),
            last_submission_score: 0,
        }
    }
}

impl From<UserChallengeProgress> for ProgressStateResponse {
    fn from(progress: UserChallengeProgress) -> Self {
        ProgressStateResponse {
            active: true,
            challenge: Some(progress.challenge),
            submissions: progress.submissions,
            last_submitted_text: progress.last_submitted_text,
            last_submission_score: progress.last_submission_score,
        }
    }
}

/// Response for the stateless trial flow.
#[derive(Debug, Serialize)]
pub struct TrialResponse {
    pub message: String,
    pub score: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_image_url: Option<String>,
}
