use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::progress::SubmissionEntry;

/// Immutable archive of a completed challenge, stored in the "submissions"
/// collection. Written exactly once by `complete`; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub challenge_id: String,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    pub images: Vec<String>,
    pub submissions: Vec<SubmissionEntry>,
}

/// List item for get-all-submission.
#[derive(Debug, Serialize)]
pub struct SubmissionSummary {
    pub id: String,
    pub challenge_id: String,
    pub created_at: DateTime<Utc>,
    pub submission_count: usize,
    pub best_score: i32,
}

impl From<&SubmissionRecord> for SubmissionSummary {
    fn from(record: &SubmissionRecord) -> Self {
        SubmissionSummary {
            id: record.id.clone(),
            challenge_id: record.challenge_id.clone(),
            created_at: record.created_at,
            submission_count: record.submissions.len(),
            best_score: record
                .submissions
                .iter()
                .map(|s| s.score)
                .max()
                .unwrap_or(0),
        }
    }
}
