use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;

pub fn chrono_to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

/// Unix milliseconds, the unit of the rate-limit clock (`last_submitted_at`).
pub fn unix_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}
