//! Outcome oracles — where observed outcomes come from. The simulated oracle
//! stands in for users during testing and offline runs; the telemetry oracle
//! drains outcomes reported by production clients.

use std::collections::VecDeque;

use challenge_core::{Challenge, ChallengeId, Outcome, Segment, UserContext};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Source of outcomes for an offered challenge.
pub trait OutcomeOracle: Send + Sync {
    /// Outcome of `user` interacting with `challenge`, or `None` when no
    /// outcome is available yet.
    fn observe(&self, user: &UserContext, challenge: &Challenge) -> Option<Outcome>;
}

// ─── Simulated ──────────────────────────────────────────────────────────────

/// Engagement assumed for users the simulator was never told about.
const DEFAULT_ENGAGEMENT: f64 = 0.5;

/// Purchase and review propensities for a segment before challenge boosts.
fn base_propensities(segment: Segment) -> (f64, f64) {
    match segment {
        Segment::HighValue => (0.3, 0.2),
        Segment::Purchaser => (0.2, 0.15),
        Segment::Engaged => (0.1, 0.25),
        Segment::New => (0.1, 0.1),
    }
}

/// Randomized user model. Every call advances the challenge by one step,
/// draws purchase/review events from segment propensities (doubled for the
/// matching challenge kind) and a review length driven by engagement.
pub struct SimulatedOracle {
    rng: Mutex<StdRng>,
    engagement: DashMap<String, f64>,
}

impl SimulatedOracle {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            engagement: DashMap::new(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            engagement: DashMap::new(),
        }
    }

    /// Record how engaged a user is; longer reviews come from engaged users.
    pub fn set_engagement(&self, user_id: &str, probability: f64) {
        self.engagement.insert(user_id.to_string(), probability);
    }

    pub fn engagement(&self, user_id: &str) -> f64 {
        self.engagement
            .get(user_id)
            .map(|p| *p)
            .unwrap_or(DEFAULT_ENGAGEMENT)
    }

    /// Purchase and review probabilities for this user on this challenge.
    pub fn propensities(user: &UserContext, challenge: &Challenge) -> (f64, f64) {
        let (mut purchase, mut review) = base_propensities(user.segment());
        if challenge.is_purchase_challenge() {
            purchase *= 2.0;
        } else if challenge.has_review_id() {
            review *= 2.0;
        }
        (purchase, review)
    }
}

impl Default for SimulatedOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeOracle for SimulatedOracle {
    fn observe(&self, user: &UserContext, challenge: &Challenge) -> Option<Outcome> {
        let progress_delta = challenge.max_progress.min(1);
        let completed =
            user.challenge_progress.saturating_add(progress_delta) >= challenge.max_progress;
        let (purchase_prob, review_prob) = Self::propensities(user, challenge);
        let engagement = self.engagement(&user.user_id);

        let mut rng = self.rng.lock();
        let purchase_made = rng.gen::<f64>() < purchase_prob;
        let review_written = rng.gen::<f64>() < review_prob;
        let review_length = if review_written {
            let base = if challenge.is_review_challenge() { 200.0 } else { 100.0 };
            let jitter = rng.gen_range(-50.0..150.0);
            ((base + engagement * 300.0 + jitter) as i64).max(20)
        } else {
            0
        };

        Some(Outcome {
            progress_delta,
            completed,
            purchase_made,
            review_written,
            review_length,
        })
    }
}

// ─── Telemetry ──────────────────────────────────────────────────────────────

/// Outcomes reported by clients, queued per user until the engine asks.
#[derive(Default)]
pub struct TelemetryOracle {
    pending: DashMap<String, VecDeque<(ChallengeId, Outcome)>>,
}

impl TelemetryOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, user_id: &str, challenge_id: &str, outcome: Outcome) {
        self.pending
            .entry(user_id.to_string())
            .or_default()
            .push_back((challenge_id.to_string(), outcome));
    }

    pub fn pending(&self, user_id: &str) -> usize {
        self.pending.get(user_id).map(|q| q.len()).unwrap_or(0)
    }
}

impl OutcomeOracle for TelemetryOracle {
    /// Oldest outcome this user reported for `challenge`. Reports for other
    /// challenges stay queued.
    fn observe(&self, user: &UserContext, challenge: &Challenge) -> Option<Outcome> {
        let mut queue = self.pending.get_mut(&user.user_id)?;
        let pos = queue.iter().position(|(id, _)| *id == challenge.id)?;
        let (_, outcome) = queue.remove(pos)?;
        debug!(user_id = %user.user_id, challenge = %challenge.id, "Telemetry outcome consumed");
        Some(outcome)
    }
}
