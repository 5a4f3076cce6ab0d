use anyhow::{Context, Result};
use chrono::Utc;
use mongodb::bson::doc;
use mongodb::Database;

use crate::models::challenge::{Challenge, ChallengeView};
use crate::utils::time::chrono_to_bson;

/// Read-only challenge catalog plus the administrative seed loader.
pub struct ChallengeService {
    mongo: Database,
}

impl ChallengeService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn collection(&self) -> mongodb::Collection<Challenge> {
        self.mongo.collection("challenges")
    }

    pub async fn get_all(&self) -> Result<Vec<ChallengeView>> {
        let mut cursor = self
            .collection()
            .find(doc! {})
            .await
            .context("Failed to query challenges")?;

        let mut challenges = Vec::new();
        while cursor.advance().await? {
            let challenge = cursor.deserialize_current()?;
            challenges.push(ChallengeView::from(challenge));
        }
        Ok(challenges)
    }

    pub async fn get_by_id(&self, challenge_id: &str) -> Result<Option<Challenge>> {
        self.collection()
            .find_one(doc! { "_id": challenge_id })
            .await
            .context("Failed to query challenge")
    }

    /// Loads the initial challenge definitions from a JSON file, replacing
    /// any existing document with the same id. Invoked at startup when a
    /// seed path is configured.
    pub async fn seed_from_file(&self, path: &str) -> Result<usize> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read challenge seed file: {}", path))?;

        let seeds: Vec<ChallengeSeed> =
            serde_json::from_str(&raw).context("Failed to parse challenge seed file")?;

        let collection = self.mongo.collection::<mongodb::bson::Document>("challenges");
        let now = chrono_to_bson(Utc::now());
        let count = seeds.len();

        for seed in seeds {
            collection.delete_one(doc! { "_id": &seed.id }).await?;
            collection
                .insert_one(doc! {
                    "_id": &seed.id,
                    "title": &seed.title,
                    "image_path": &seed.image_path,
                    "image_hash": seed.image_hash.as_deref().unwrap_or(""),
                    "result_sample": &seed.result_sample,
                    "result_sample_image_paths": &seed.result_sample_image_paths,
                    "created_at": now,
                })
                .await
                .with_context(|| format!("Failed to seed challenge {}", seed.id))?;
        }

        tracing::info!("Seeded {} challenges from {}", count, path);
        Ok(count)
    }
}

#[derive(Debug, serde::Deserialize)]
struct ChallengeSeed {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    image_path: String,
    #[serde(default)]
    image_hash: Option<String>,
    result_sample: String,
    result_sample_image_paths: Vec<String>,
}
