use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Challenge definition stored in the MongoDB "challenges" collection.
///
/// Created by the administrative seed process; read-only to the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub image_path: String,
    #[serde(default)]
    pub image_hash: String,
    /// Reference answer the scoring gateway evaluates submissions against.
    pub result_sample: String,
    /// Ordered milestone reward images for the trial flow bands
    /// ([50,75), [75,90), [90,100]).
    pub result_sample_image_paths: Vec<String>,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "super::bson_datetime_as_chrono_option"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Public projection of a challenge, embedded in progress records and
/// returned by the catalog endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeView {
    pub id: String,
    pub title: String,
    #[serde(rename = "imgUrl")]
    pub img_url: String,
    #[serde(default)]
    pub description: String,
    pub result_sample: String,
    pub result_sample_image_paths: Vec<String>,
}

impl From<Challenge> for ChallengeView {
    fn from(challenge: Challenge) -> Self {
        ChallengeView {
            id: challenge.id,
            title: challenge.title,
            img_url: challenge.image_path,
            description: String::new(),
            result_sample: challenge.result_sample,
            result_sample_image_paths: challenge.result_sample_image_paths,
        }
    }
}
