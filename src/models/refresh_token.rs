use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Refresh token document ("refresh_tokens" collection). Only the SHA-256
/// hash of the opaque token is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub token_hash: String,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub revoked: bool,
}
