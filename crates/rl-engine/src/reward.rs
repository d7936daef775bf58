//! Reward shaping — turns an observed outcome into a scalar training signal.

use challenge_core::{Challenge, ChallengeResult, Outcome};

/// Review length (characters) at which the length bonus saturates.
pub const MAX_REVIEW_LENGTH: i64 = 500;

const COMPLETION_REWARD: f64 = 1.0;
const PURCHASE_REWARD: f64 = 2.0;
const REVIEW_REWARD: f64 = 1.5;
const REVIEW_LENGTH_BONUS: f64 = 1.0;
const REVIEW_CHALLENGE_REWARD: f64 = 1.0;
const REVIEW_CHALLENGE_LENGTH_BONUS: f64 = 1.5;

/// Reward for `outcome` on `challenge`. Additive, never negative, and zero
/// only when nothing was completed, bought or reviewed.
pub fn compute_reward(outcome: &Outcome, challenge: &Challenge) -> ChallengeResult<f64> {
    outcome.validate()?;

    let mut reward = 0.0;
    if outcome.completed {
        reward += COMPLETION_REWARD;
    }
    if outcome.purchase_made {
        reward += PURCHASE_REWARD;
    }
    if outcome.review_written {
        let length_share = length_share(outcome.review_length);
        reward += REVIEW_REWARD + length_share * REVIEW_LENGTH_BONUS;

        // Review challenges pay a second, larger length bonus.
        if challenge.is_review_challenge() {
            reward += REVIEW_CHALLENGE_REWARD + length_share * REVIEW_CHALLENGE_LENGTH_BONUS;
        }
    }
    Ok(reward)
}

fn length_share(review_length: i64) -> f64 {
    review_length.min(MAX_REVIEW_LENGTH) as f64 / MAX_REVIEW_LENGTH as f64
}
