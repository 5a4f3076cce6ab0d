use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::metrics::SCORING_REQUESTS_TOTAL;

const SCORING_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Gateway to the external text-evaluation service.
///
/// Evaluation degrades to score 0 on any failure; a submission is always
/// recorded even when the scoring backend is down.
pub struct ScoringGateway {
    http_client: Client,
    url: String,
    api_key: String,
    model: String,
}

impl ScoringGateway {
    pub fn new(url: String, api_key: String, model: String) -> Self {
        Self {
            http_client: Client::new(),
            url,
            api_key,
            model,
        }
    }

    /// Scores a submission against the challenge's reference answer.
    /// Returns an integer clamped to [0, 100]; 0 on any service failure.
    pub async fn evaluate(&self, submission: &str, result_sample: &str) -> i32 {
        match self.evaluate_inner(submission, result_sample).await {
            Ok(score) => {
                SCORING_REQUESTS_TOTAL.with_label_values(&["ok"]).inc();
                score
            }
            Err(e) => {
                SCORING_REQUESTS_TOTAL.with_label_values(&["degraded"]).inc();
                tracing::warn!("Scoring service failed, degrading to score 0: {:#}", e);
                0
            }
        }
    }

    async fn evaluate_inner(&self, submission: &str, result_sample: &str) -> anyhow::Result<i32> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: evaluation_prompt(submission, result_sample),
            }],
        };

        let response = self
            .http_client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .timeout(std::time::Duration::from_secs(SCORING_TIMEOUT_SECONDS))
            .send()
            .await?
            .error_for_status()?;

        let body: ChatCompletionResponse = response.json().await?;
        let content = body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or("");

        Ok(parse_score(content))
    }
}

fn evaluation_prompt(submission: &str, result_sample: &str) -> String {
    format!(
        "As an AI evaluator, analyze the English text within the <Submission> tags and assess \
         how comprehensively it covers the content provided in the <Result> tags. Output only a \
         single integer score from 0 to 100, where:\n\
         - 100 indicates the submission fully covers all key points and details from the result\n\
         - 75 indicates most key points are covered with some minor omissions\n\
         - 50 indicates roughly half of the important content is covered\n\
         - 25 indicates only basic or surface-level coverage\n\
         - 0 indicates no relevant content coverage\n\n\
         Do not provide any explanation or additional text - output only the integer score.\n\n\
         <Result>\n{result_sample}\n</Result>\n\n\
         <Submission>\n{submission}\n</Submission>"
    )
}

/// Extracts the digits from the model reply and clamps to [0, 100].
fn parse_score(reply: &str) -> i32 {
    let digits: String = reply.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse::<i32>().unwrap_or(0).clamp(0, 100)
}

/// Deterministic fallback scorer used by the trial (unauthenticated) path:
/// `100 * |unique lowercased words shared with the reference| / |unique
/// reference words|`, scaled by `magnification` percent, clamped to [0, 100].
pub fn lexical_overlap_score(submission: &str, result_sample: &str, magnification: i64) -> i32 {
    let submission_words: HashSet<String> = submission
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect();
    let reference_words: HashSet<String> = result_sample
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect();

    if reference_words.is_empty() {
        return 0;
    }

    let overlap = submission_words.intersection(&reference_words).count();
    let raw = 100.0 * overlap as f64 / reference_words.len() as f64;
    let scaled = (raw * magnification as f64 / 100.0).round() as i32;
    scaled.clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_score_plain_integer() {
        assert_eq!(parse_score("85"), 85);
    }

    #[test]
    fn parse_score_with_noise() {
        assert_eq!(parse_score("Score: 42."), 42);
    }

    #[test]
    fn parse_score_clamps_to_100() {
        assert_eq!(parse_score("12345"), 100);
    }

    #[test]
    fn parse_score_empty_degrades_to_zero() {
        assert_eq!(parse_score(""), 0);
        assert_eq!(parse_score("no digits here"), 0);
    }

    #[test]
    fn overlap_score_is_deterministic() {
        // 2 of 4 reference words covered, x1.5 magnification
        let a = lexical_overlap_score("word word otherword", "word otherword foo bar", 150);
        let b = lexical_overlap_score("word word otherword", "word otherword foo bar", 150);
        assert_eq!(a, 75);
        assert_eq!(a, b);
    }

    #[test]
    fn overlap_score_full_match_caps_at_100() {
        let score = lexical_overlap_score("foo bar", "foo bar", 150);
        assert_eq!(score, 100);
    }

    #[test]
    fn overlap_score_no_match() {
        assert_eq!(lexical_overlap_score("alpha beta", "gamma delta", 150), 0);
    }

    #[test]
    fn overlap_score_empty_reference() {
        assert_eq!(lexical_overlap_score("anything", "", 150), 0);
    }

    #[test]
    fn overlap_score_is_case_insensitive() {
        assert_eq!(
            lexical_overlap_score("WORD", "word", 100),
            lexical_overlap_score("word", "word", 100)
        );
    }
}
