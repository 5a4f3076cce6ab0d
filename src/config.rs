use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub redis_uri: String,
    pub jwt_secret: String,
    pub scoring_api_url: String,
    pub scoring_api_key: String,
    pub scoring_model: String,
    pub image_api_url: String,
    pub image_api_key: String,
    pub image_dir: String,
    pub challenge_seed_path: Option<String>,
    /// Minimum seconds between two accepted submissions by the same user.
    pub submit_interval_seconds: i64,
    /// Percent multiplier applied to the trial lexical-overlap score.
    pub score_magnification: i64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| {
                let user = env::var("MONGO_USER").expect("MONGO_USER must be set");
                let password = env::var("MONGO_PASSWORD").expect("MONGO_PASSWORD must be set");
                let db = env::var("MONGO_DB").unwrap_or_else(|_| "challenges_db".to_string());
                eprintln!("WARNING: Building MongoDB URI from MONGO_USER/MONGO_PASSWORD env vars");
                format!(
                    "mongodb://{}:{}@localhost:27017/{}?authSource=admin",
                    user, password, db
                )
            });

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "challenges_db".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());

        let jwt_secret = settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
            .unwrap_or_else(|_| {
                if env == "prod" {
                    panic!("FATAL: JWT_SECRET must be set in production!");
                }
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            });

        let scoring_api_url = settings
            .get_string("scoring.url")
            .or_else(|_| env::var("SCORING_API_URL"))
            .unwrap_or_else(|_| "http://localhost:8000/v1/chat/completions".to_string());

        let scoring_api_key = settings
            .get_string("scoring.api_key")
            .or_else(|_| env::var("SCORING_API_KEY"))
            .unwrap_or_default();

        let scoring_model = settings
            .get_string("scoring.model")
            .or_else(|_| env::var("SCORING_MODEL"))
            .unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let image_api_url = settings
            .get_string("image.url")
            .or_else(|_| env::var("IMAGE_API_URL"))
            .unwrap_or_else(|_| {
                "https://api.segmind.com/v1/sdxl1.0-newreality-lightning".to_string()
            });

        let image_api_key = settings
            .get_string("image.api_key")
            .or_else(|_| env::var("IMAGE_API_KEY"))
            .unwrap_or_default();

        let image_dir = settings
            .get_string("image.dir")
            .or_else(|_| env::var("IMAGE_DIR"))
            .unwrap_or_else(|_| "data/images".to_string());

        let challenge_seed_path = settings
            .get_string("challenges.seed_path")
            .ok()
            .or_else(|| env::var("CHALLENGE_SEED_PATH").ok());

        let submit_interval_seconds = settings
            .get_int("challenges.submit_interval_seconds")
            .ok()
            .or_else(|| {
                env::var("SUBMIT_INTERVAL_SECONDS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
            })
            .filter(|v| *v >= 0)
            .unwrap_or(60);

        let score_magnification = settings
            .get_int("challenges.score_magnification")
            .ok()
            .or_else(|| {
                env::var("SCORE_MAGNIFICATION")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
            })
            .filter(|v| *v > 0)
            .unwrap_or(150);

        Ok(Config {
            mongo_uri,
            mongo_database,
            redis_uri,
            jwt_secret,
            scoring_api_url,
            scoring_api_key,
            scoring_model,
            image_api_url,
            image_api_key,
            image_dir,
            challenge_seed_path,
            submit_interval_seconds,
            score_magnification,
        })
    }
}
