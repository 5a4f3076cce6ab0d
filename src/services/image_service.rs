use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::metrics::REWARD_IMAGES_TOTAL;

const IMAGE_TIMEOUT_SECONDS: u64 = 30;

/// Best-effort reward image generator. Failures are logged and swallowed;
/// callers treat `None` as "no reward image this time".
pub struct RewardImageGenerator {
    http_client: Client,
    url: String,
    api_key: String,
    image_dir: String,
}

impl RewardImageGenerator {
    pub fn new(url: String, api_key: String, image_dir: String) -> Self {
        Self {
            http_client: Client::new(),
            url,
            api_key,
            image_dir,
        }
    }

    /// Generates a reward image for a submission and stores it under the
    /// image root. Returns the stable image identifier (filename without
    /// extension) on success.
    pub async fn generate(&self, user_id: &str, submission: &str) -> Option<String> {
        let filename = generate_filename(user_id);
        let prompt = format!(
            "Create an image that represents the following text: {}",
            submission
        );

        match self.generate_inner(&prompt, &filename).await {
            Ok(()) => {
                REWARD_IMAGES_TOTAL.with_label_values(&["generated"]).inc();
                tracing::info!("Reward image generated: {}", filename);
                Some(filename)
            }
            Err(e) => {
                REWARD_IMAGES_TOTAL.with_label_values(&["failed"]).inc();
                tracing::warn!("Reward image generation failed: {:#}", e);
                None
            }
        }
    }

    async fn generate_inner(&self, prompt: &str, filename: &str) -> anyhow::Result<()> {
        let payload = json!({
            "prompt": prompt,
            "negative_prompt": "((close up)),(octane render, render, drawing, bad photo, bad photography:1.3)",
            "samples": 1,
            "scheduler": "DPM++ SDE",
            "num_inference_steps": 7,
            "guidance_scale": 1,
            "img_width": 1024,
            "img_height": 1024,
            "base64": false,
        });

        let response = self
            .http_client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .json(&payload)
            .timeout(std::time::Duration::from_secs(IMAGE_TIMEOUT_SECONDS))
            .send()
            .await?
            .error_for_status()?;

        let bytes = response.bytes().await?;

        tokio::fs::create_dir_all(&self.image_dir).await?;
        let path = std::path::Path::new(&self.image_dir).join(format!("{}.png", filename));
        tokio::fs::write(&path, &bytes).await?;

        Ok(())
    }
}

/// Stable content identifier for a generated image: `gen_` + sha256 of
/// user id and timestamp. Matches the `/api/img/{image_id}` charset rule.
fn generate_filename(user_id: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S%3f");
    let mut hasher = Sha256::new();
    hasher.update(format!("{}_{}", user_id, timestamp).as_bytes());
    format!("gen_{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_match_image_id_charset() {
        let name = generate_filename("user-1");
        assert!(name.starts_with("gen_"));
        assert_eq!(name.len(), 4 + 64);
        assert!(name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn filenames_differ_per_user() {
        assert_ne!(generate_filename("user-a"), generate_filename("user-b"));
    }
}
