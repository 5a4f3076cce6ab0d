use anyhow::anyhow;
use chrono::Utc;
use lazy_static::lazy_static;
use mongodb::bson::{doc, Bson};
use mongodb::Database;
use regex::Regex;

use crate::error::ApiError;
use crate::metrics::{
    CHALLENGES_CLOSED_TOTAL, CHALLENGES_STARTED_TOTAL, SUBMISSIONS_TOTAL, TRIAL_SUBMISSIONS_TOTAL,
};
use crate::models::challenge::{Challenge, ChallengeView};
use crate::models::progress::{
    ProgressResponse, ProgressStateResponse, SubmissionEntry, TrialResponse, UserChallengeProgress,
};
use crate::models::submission::{SubmissionRecord, SubmissionSummary};
use crate::utils::retry::{retry_async_with_config, RetryConfig};
use crate::utils::time::{chrono_to_bson, unix_millis};

use super::image_service::RewardImageGenerator;
use super::scoring_service::{lexical_overlap_score, ScoringGateway};

/// Reward thresholds, ascending. An image is generated when the most recent
/// score crosses one of these from below.
pub const SCORE_THRESHOLDS: [i32; 3] = [50, 75, 90];

const MAX_SUBMISSION_CHARS: usize = 1000;

// MongoDB duplicate key error
const DUPLICATE_KEY_CODE: i32 = 11000;

lazy_static! {
    // Letters, digits, '.', ',', half-width and full-width spaces.
    static ref SUBMISSION_RE: Regex = Regex::new(r"^[a-zA-Z0-9., \x{3000}]+$").unwrap();
}

/// The challenge-submission lifecycle: start -> submit* -> complete/give-up.
///
/// Stateless by design: every invariant (one active record per user, the
/// rate-limit clock) is enforced by conditional MongoDB updates so that
/// concurrent requests from the same user on different connections cannot
/// observe torn state.
pub struct WorkflowService {
    mongo: Database,
    submit_interval_ms: i64,
}

impl WorkflowService {
    pub fn new(mongo: Database, submit_interval_seconds: i64) -> Self {
        Self {
            mongo,
            submit_interval_ms: submit_interval_seconds * 1000,
        }
    }

    fn progress_collection(&self) -> mongodb::Collection<UserChallengeProgress> {
        self.mongo.collection("user_challenges")
    }

    fn archive_collection(&self) -> mongodb::Collection<SubmissionRecord> {
        self.mongo.collection("submissions")
    }

    async fn active_progress(
        &self,
        user_id: &str,
    ) -> Result<Option<UserChallengeProgress>, ApiError> {
        let progress = self
            .progress_collection()
            .find_one(doc! { "user_id": user_id, "completed_at": Bson::Null })
            .await?;
        Ok(progress)
    }

    /// Starts a challenge. Idempotent: if the user already has an active
    /// progress record it is returned unchanged, regardless of which
    /// challenge was requested - a user never has two concurrent challenges.
    pub async fn start(
        &self,
        user_id: &str,
        challenge: Challenge,
    ) -> Result<ProgressResponse, ApiError> {
        if let Some(existing) = self.active_progress(user_id).await? {
            CHALLENGES_STARTED_TOTAL.with_label_values(&["resumed"]).inc();
            return Ok(ProgressResponse::from_progress(
                "Challenge already in progress.",
                existing,
            ));
        }

        let progress =
            UserChallengeProgress::new(user_id, ChallengeView::from(challenge), Utc::now());

        match self.progress_collection().insert_one(&progress).await {
            Ok(_) => {
                CHALLENGES_STARTED_TOTAL.with_label_values(&["created"]).inc();
                tracing::info!(
                    user_id = %user_id,
                    challenge_id = %progress.challenge_id,
                    "Challenge started"
                );
                Ok(ProgressResponse::from_progress(
                    "Challenge started successfully!",
                    progress,
                ))
            }
            Err(e) if is_duplicate_key(&e) => {
                // Another start for this user won the race; return its record.
                let existing = self
                    .active_progress(user_id)
                    .await?
                    .ok_or(ApiError::ServiceUnavailable)?;
                CHALLENGES_STARTED_TOTAL.with_label_values(&["resumed"]).inc();
                Ok(ProgressResponse::from_progress(
                    "Challenge already in progress.",
                    existing,
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Accepts a submission: validate, score, append - with the rate-limit
    /// check and clock advance folded into one conditional update so two
    /// near-simultaneous submissions cannot both pass.
    pub async fn submit(
        &self,
        user_id: &str,
        text: &str,
        scoring: &ScoringGateway,
        images: &RewardImageGenerator,
    ) -> Result<ProgressResponse, ApiError> {
        let current = self
            .active_progress(user_id)
            .await?
            .ok_or(ApiError::NoActiveChallenge)?;

        // Fail fast, before any external call.
        if let Err(e) = validate_submission(text) {
            SUBMISSIONS_TOTAL.with_label_values(&["invalid"]).inc();
            return Err(e);
        }

        let now = Utc::now();
        let now_ms = unix_millis(now);
        let cutoff = now_ms - self.submit_interval_ms;

        // Cheap precheck from the read; the conditional update below is
        // authoritative.
        if current.last_submitted_at > cutoff {
            SUBMISSIONS_TOTAL.with_label_values(&["too_frequent"]).inc();
            return Err(ApiError::TooFrequent);
        }

        let score = scoring
            .evaluate(text, &current.challenge.result_sample)
            .await;

        let entry = SubmissionEntry {
            timestamp: now,
            content: text.to_string(),
            score,
        };
        let entry_bson =
            mongodb::bson::to_bson(&entry).map_err(|e| ApiError::Internal(anyhow!(e)))?;

        // Interval check and clock advance as a single step: only matches
        // while the record is still active AND the previous submission is
        // old enough. Returns the pre-update document, so the previous
        // score used for threshold detection is race-free.
        let previous = self
            .progress_collection()
            .find_one_and_update(
                doc! {
                    "user_id": user_id,
                    "completed_at": Bson::Null,
                    "last_submitted_at": { "$lte": cutoff },
                },
                doc! {
                    "$push": { "submissions": entry_bson },
                    "$set": {
                        "last_submitted_text": text,
                        "last_submitted_at": now_ms,
                        "last_submission_score": score,
                        "updated_at": chrono_to_bson(now),
                    },
                },
            )
            .await?;

        let previous = match previous {
            Some(p) => p,
            None => {
                // Lost the conditional update: either a concurrent submit
                // advanced the clock, or the record was completed/abandoned.
                return if self.active_progress(user_id).await?.is_some() {
                    SUBMISSIONS_TOTAL.with_label_values(&["too_frequent"]).inc();
                    Err(ApiError::TooFrequent)
                } else {
                    Err(ApiError::NoActiveChallenge)
                };
            }
        };

        SUBMISSIONS_TOTAL.with_label_values(&["accepted"]).inc();
        tracing::info!(
            user_id = %user_id,
            challenge_id = %previous.challenge_id,
            score = score,
            "Submission accepted"
        );

        // Build the response projection from the accepted update.
        let mut progress = previous.clone();
        progress.submissions.push(entry);
        progress.last_submitted_text = text.to_string();
        progress.last_submitted_at = now_ms;
        progress.last_submission_score = score;

        let mut response =
            ProgressResponse::from_progress("Submission successful!", progress);

        // One reward image per submission at most, attributed to the highest
        // threshold newly crossed. Best-effort: failure only omits the URL.
        if highest_crossed_threshold(previous.last_submission_score, score).is_some() {
            if let Some(filename) = images.generate(user_id, text).await {
                match self
                    .record_generated_image(user_id, &previous.challenge_id, now_ms, &filename)
                    .await
                {
                    Ok(true) => {
                        response.generated_img_url = Some(format!("/api/img/{}", filename));
                    }
                    Ok(false) => {
                        // Record completed or restarted between the accepted
                        // submit and this push; nothing to attach the image to.
                        tracing::warn!(
                            user_id = %user_id,
                            "Progress record changed before image {} could be attached",
                            filename
                        );
                    }
                    Err(e) => {
                        tracing::warn!("Failed to record generated image {}: {}", filename, e);
                    }
                }
            }
        }

        Ok(response)
    }

    /// Attaches a generated image to the progress record that produced it.
    /// The filter pins the exact submission (challenge id plus the rate-limit
    /// clock value the submit wrote), so if the record was completed or the
    /// challenge restarted in the meantime the push matches nothing. Returns
    /// whether the image was attached.
    pub async fn record_generated_image(
        &self,
        user_id: &str,
        challenge_id: &str,
        submitted_at_ms: i64,
        filename: &str,
    ) -> Result<bool, ApiError> {
        let result = self
            .progress_collection()
            .update_one(
                doc! {
                    "user_id": user_id,
                    "challenge_id": challenge_id,
                    "completed_at": Bson::Null,
                    "last_submitted_at": submitted_at_ms,
                },
                doc! {
                    "$push": { "generated_images": filename },
                    "$set": { "updated_at": chrono_to_bson(Utc::now()) },
                },
            )
            .await?;

        Ok(result.modified_count > 0)
    }

    /// Read-only projection; "no active challenge" is a sentinel, not an error.
    pub async fn get_progress(&self, user_id: &str) -> Result<ProgressStateResponse, ApiError> {
        Ok(self
            .active_progress(user_id)
            .await?
            .map(ProgressStateResponse::from)
            .unwrap_or_else(ProgressStateResponse::none))
    }

    /// Discards the active progress record. No archival.
    pub async fn give_up(&self, user_id: &str) -> Result<(), ApiError> {
        let result = self
            .progress_collection()
            .delete_one(doc! { "user_id": user_id, "completed_at": Bson::Null })
            .await?;

        if result.deleted_count == 0 {
            return Err(ApiError::NotFound("No active challenge found.".into()));
        }

        CHALLENGES_CLOSED_TOTAL.with_label_values(&["abandoned"]).inc();
        tracing::info!(user_id = %user_id, "Challenge abandoned");
        Ok(())
    }

    /// Archives the active record into an immutable submission record and
    /// removes it. `find_one_and_delete` guarantees a single winner under
    /// concurrent completes; a failed archive insert restores the record so
    /// the caller observes either both effects or neither.
    pub async fn complete(&self, user_id: &str) -> Result<String, ApiError> {
        let progress = self
            .progress_collection()
            .find_one_and_delete(doc! { "user_id": user_id, "completed_at": Bson::Null })
            .await?
            .ok_or_else(|| ApiError::NotFound("No active challenge found.".into()))?;

        let record = SubmissionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: progress.user_id.clone(),
            challenge_id: progress.challenge_id.clone(),
            created_at: Utc::now(),
            images: progress.generated_images.clone(),
            submissions: progress.submissions.clone(),
        };

        let archive = self.archive_collection();
        let inserted = retry_async_with_config(RetryConfig::aggressive(), || async {
            archive.insert_one(&record).await
        })
        .await;

        if let Err(e) = inserted {
            tracing::error!("Archive insert failed, restoring progress record: {}", e);
            let collection = self.progress_collection();
            let restored = retry_async_with_config(RetryConfig::aggressive(), || async {
                collection.insert_one(&progress).await
            })
            .await;
            if let Err(restore_err) = restored {
                tracing::error!(
                    user_id = %user_id,
                    "Failed to restore progress record after archive failure: {}",
                    restore_err
                );
            }
            return Err(ApiError::ServiceUnavailable);
        }

        CHALLENGES_CLOSED_TOTAL.with_label_values(&["completed"]).inc();
        tracing::info!(
            user_id = %user_id,
            submission_id = %record.id,
            "Challenge completed and archived"
        );
        Ok(record.id)
    }

    pub async fn list_archived(&self, user_id: &str) -> Result<Vec<SubmissionSummary>, ApiError> {
        let mut cursor = self
            .archive_collection()
            .find(doc! { "user_id": user_id })
            .await?;

        let mut summaries = Vec::new();
        while cursor.advance().await? {
            let record = cursor
                .deserialize_current()
                .map_err(|e| ApiError::Internal(anyhow!(e)))?;
            summaries.push(SubmissionSummary::from(&record));
        }
        Ok(summaries)
    }

    pub async fn get_archived(
        &self,
        user_id: &str,
        submission_id: &str,
    ) -> Result<SubmissionRecord, ApiError> {
        self.archive_collection()
            .find_one(doc! { "_id": submission_id, "user_id": user_id })
            .await?
            .ok_or_else(|| ApiError::NotFound("Submission not found.".into()))
    }
}

/// The trial flow has no state machine: a pure function of the challenge and
/// the submitted text. No persistence, no rate limiting, no generation.
pub fn trial_evaluate(
    challenge: &Challenge,
    submission: &str,
    magnification: i64,
) -> Result<TrialResponse, ApiError> {
    if let Err(e) = validate_submission(submission) {
        TRIAL_SUBMISSIONS_TOTAL.with_label_values(&["invalid"]).inc();
        return Err(e);
    }

    let score = lexical_overlap_score(submission, &challenge.result_sample, magnification);
    let reward_image_url = trial_band_index(score)
        .and_then(|i| challenge.result_sample_image_paths.get(i))
        .cloned();

    TRIAL_SUBMISSIONS_TOTAL.with_label_values(&["scored"]).inc();
    Ok(TrialResponse {
        message: "Submission successful!".to_string(),
        score,
        reward_image_url,
    })
}

/// Index into the pre-rendered reward images by score band:
/// [50,75) -> 0, [75,90) -> 1, [90,100] -> 2.
fn trial_band_index(score: i32) -> Option<usize> {
    match score {
        90..=100 => Some(2),
        75..=89 => Some(1),
        50..=74 => Some(0),
        _ => None,
    }
}

/// Validation runs before any external scoring call: non-empty, at most 1000
/// characters, restricted charset.
pub fn validate_submission(text: &str) -> Result<(), ApiError> {
    if text.is_empty() || text.chars().count() > MAX_SUBMISSION_CHARS {
        return Err(ApiError::InvalidSubmission);
    }
    if !SUBMISSION_RE.is_match(text) {
        return Err(ApiError::InvalidSubmission);
    }
    Ok(())
}

/// Returns the highest threshold newly crossed by this submission
/// (`prev < t <= new`), if any.
pub fn highest_crossed_threshold(prev: i32, new: i32) -> Option<i32> {
    SCORE_THRESHOLDS
        .iter()
        .rev()
        .copied()
        .find(|&t| prev < t && t <= new)
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    if let mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we)) =
        *e.kind
    {
        return we.code == DUPLICATE_KEY_CODE;
    }
    false
}
