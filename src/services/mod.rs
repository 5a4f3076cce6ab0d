use crate::config::Config;
use mongodb::bson::{doc, Bson};
use mongodb::options::IndexOptions;
use mongodb::{Client as MongoClient, Database, IndexModel};
use redis::aio::ConnectionManager;

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    pub redis: ConnectionManager,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        ensure_indexes(&mongo).await?;

        Ok(Self {
            config,
            mongo,
            redis,
        })
    }
}

/// Creates the indexes the workflow invariants rely on. Idempotent.
pub async fn ensure_indexes(mongo: &Database) -> anyhow::Result<()> {
    let users = mongo.collection::<mongodb::bson::Document>("users");
    users
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;

    let progress = mongo.collection::<mongodb::bson::Document>("user_challenges");

    progress
        .create_index(
            IndexModel::builder()
                .keys(doc! { "user_id": 1, "challenge_id": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;

    // At most one active (completed_at == null) progress record per user.
    // The workflow treats a duplicate-key error on insert as "another start
    // won the race" and re-reads the winner.
    progress
        .create_index(
            IndexModel::builder()
                .keys(doc! { "user_id": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name("one_active_challenge_per_user".to_string())
                        .partial_filter_expression(
                            doc! { "completed_at": { "$type": Bson::String("null".into()) } },
                        )
                        .build(),
                )
                .build(),
        )
        .await?;

    let tokens = mongo.collection::<mongodb::bson::Document>("refresh_tokens");
    tokens
        .create_index(
            IndexModel::builder()
                .keys(doc! { "token_hash": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        )
        .await?;

    tracing::info!("MongoDB indexes ensured");
    Ok(())
}

pub mod auth_service;
pub mod challenge_service;
pub mod image_service;
pub mod scoring_service;
pub mod workflow_service;
