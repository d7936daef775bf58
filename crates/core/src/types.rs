//! Challenge domain types — challenges, user contexts and observed outcomes.

use serde::{Deserialize, Serialize};

use crate::error::{ChallengeError, ChallengeResult};
use crate::segment::Segment;

/// Identifier of a challenge in the catalog.
pub type ChallengeId = String;

// ─── Challenge ──────────────────────────────────────────────────────────────

/// A gamified micro-task with a completion threshold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Challenge {
    pub id: ChallengeId,
    pub description: String,
    /// Progress needed to complete the challenge. Always positive.
    pub max_progress: u32,
}

impl Challenge {
    pub fn new(id: impl Into<String>, description: impl Into<String>, max_progress: u32) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            max_progress,
        }
    }

    /// Whether the id or description mentions reviews (case-insensitive).
    pub fn is_review_challenge(&self) -> bool {
        self.id.to_lowercase().contains("review")
            || self.description.to_lowercase().contains("review")
    }

    pub fn is_purchase_challenge(&self) -> bool {
        self.id.contains("Purchase")
    }

    /// Whether the id itself names a review. Case-sensitive and ignores the
    /// description, unlike `is_review_challenge`.
    pub fn has_review_id(&self) -> bool {
        self.id.contains("Review")
    }
}

// ─── User Context ───────────────────────────────────────────────────────────

/// Behavioral counters and challenge state for one user. Owned and mutated
/// by the caller; the engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserContext {
    pub user_id: String,
    #[serde(default)]
    pub lifetime_purchases: u32,
    #[serde(default)]
    pub reviews_written: u32,
    #[serde(default)]
    pub active_challenge: Option<ChallengeId>,
    #[serde(default)]
    pub challenge_progress: u32,
}

/// Where a user is in a single challenge's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ChallengeLifecycle {
    Unassigned,
    Active { challenge_id: ChallengeId, progress: u32 },
    Completed { challenge_id: ChallengeId },
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            lifetime_purchases: 0,
            reviews_written: 0,
            active_challenge: None,
            challenge_progress: 0,
        }
    }

    pub fn segment(&self) -> Segment {
        Segment::classify(self)
    }

    /// Adopt a selected challenge. Progress restarts at zero.
    pub fn assign_challenge(&mut self, challenge_id: impl Into<ChallengeId>) {
        self.active_challenge = Some(challenge_id.into());
        self.challenge_progress = 0;
    }

    pub fn clear_active_challenge(&mut self) {
        self.active_challenge = None;
        self.challenge_progress = 0;
    }

    /// Advance progress on the active challenge. Returns true once the
    /// threshold is reached; the caller must then clear the challenge.
    pub fn apply_progress(&mut self, challenge: &Challenge, delta: u32) -> bool {
        self.challenge_progress = self.challenge_progress.saturating_add(delta);
        self.challenge_progress >= challenge.max_progress
    }

    /// Fold an outcome's purchase/review side effects into the counters.
    pub fn record_outcome(&mut self, outcome: &Outcome) {
        if outcome.purchase_made {
            self.lifetime_purchases += 1;
        }
        if outcome.review_written {
            self.reviews_written += 1;
        }
    }

    pub fn lifecycle(&self, max_progress: Option<u32>) -> ChallengeLifecycle {
        match (&self.active_challenge, max_progress) {
            (None, _) => ChallengeLifecycle::Unassigned,
            (Some(id), Some(max)) if self.challenge_progress >= max => {
                ChallengeLifecycle::Completed {
                    challenge_id: id.clone(),
                }
            }
            (Some(id), _) => ChallengeLifecycle::Active {
                challenge_id: id.clone(),
                progress: self.challenge_progress,
            },
        }
    }
}

// ─── Outcome ────────────────────────────────────────────────────────────────

/// What happened after a challenge was offered. Produced once per decision
/// by an outcome oracle and consumed immediately by the reward model.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Outcome {
    #[serde(default)]
    pub progress_delta: u32,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub purchase_made: bool,
    #[serde(default)]
    pub review_written: bool,
    /// Review length in characters. Signed so that malformed telemetry can
    /// be detected and rejected instead of wrapping.
    #[serde(default)]
    pub review_length: i64,
}

impl Outcome {
    /// An interaction where the user did not engage at all.
    pub fn disengaged() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> ChallengeResult<()> {
        if self.review_length < 0 {
            return Err(ChallengeError::MalformedOutcome(format!(
                "review_length must be non-negative, got {}",
                self.review_length
            )));
        }
        Ok(())
    }
}
