//! Challenge recommendation engine — owns the catalog, the three-tier value
//! store and the per-challenge counters, and exposes the select / reward /
//! update / insights operations over them.
//!
//! Construct once at startup and share through `Arc`; every method takes
//! `&self` and is safe to call from many worker threads at once.

use std::sync::Arc;

use challenge_core::config::EngineConfig;
use challenge_core::{
    ChallengeCatalog, ChallengeError, ChallengeId, ChallengeResult, Outcome, Segment, UserContext,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::insights::{self, ChallengeInsights};
use crate::oracle::OutcomeOracle;
use crate::policy::{self, ScoredChallenge, Selection};
use crate::reward;
use crate::stats::{ChallengeCounters, ChallengeStats};
use crate::value_store::{InMemoryValueStore, Scope, ValueStore, LEARNING_RATE};

/// Result of a single applied update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateReceipt {
    pub user_id: String,
    pub challenge_id: ChallengeId,
    pub segment: Segment,
    pub reward: f64,
    pub user_value: f64,
    pub segment_value: f64,
    pub global_value: f64,
    pub counters: ChallengeCounters,
    pub applied_at: DateTime<Utc>,
}

pub struct ChallengeEngine {
    catalog: Arc<ChallengeCatalog>,
    store: Arc<dyn ValueStore>,
    stats: ChallengeStats,
    config: EngineConfig,
}

impl ChallengeEngine {
    /// Engine backed by an in-memory store seeded with the configured priors.
    pub fn new(catalog: ChallengeCatalog, config: &EngineConfig) -> Self {
        let store = Arc::new(InMemoryValueStore::with_priors(config.priors.clone()));
        Self::with_store(Arc::new(catalog), store, config)
    }

    pub fn with_store(
        catalog: Arc<ChallengeCatalog>,
        store: Arc<dyn ValueStore>,
        config: &EngineConfig,
    ) -> Self {
        info!(
            challenges = catalog.len(),
            exploration_rate = config.exploration_rate,
            global_prior = config.priors.global,
            "Challenge engine initialized"
        );
        Self {
            stats: ChallengeStats::for_catalog(&catalog),
            catalog,
            store,
            config: config.clone(),
        }
    }

    pub fn classify_segment(&self, user: &UserContext) -> Segment {
        Segment::classify(user)
    }

    /// Epsilon-greedy pick using the thread-local RNG.
    pub fn select_challenge(
        &self,
        user: &UserContext,
        exploration_rate: f64,
    ) -> ChallengeResult<ChallengeId> {
        self.select_challenge_with_rng(user, exploration_rate, &mut rand::thread_rng())
            .map(|selection| selection.challenge_id)
    }

    /// Same as `select_challenge` with the configured exploration rate.
    pub fn select_default(&self, user: &UserContext) -> ChallengeResult<ChallengeId> {
        self.select_challenge(user, self.config.exploration_rate)
    }

    pub fn select_challenge_with_rng<R: Rng>(
        &self,
        user: &UserContext,
        exploration_rate: f64,
        rng: &mut R,
    ) -> ChallengeResult<Selection> {
        let selection = policy::select(
            &self.catalog,
            self.store.as_ref(),
            user,
            exploration_rate,
            rng,
        )?;

        metrics::counter!("challenge.selections").increment(1);
        debug!(
            user_id = %user.user_id,
            segment = %selection.segment,
            challenge = %selection.challenge_id,
            method = ?selection.method,
            score = ?selection.score,
            "Challenge selected"
        );
        Ok(selection)
    }

    /// Reward for an outcome on a catalog challenge.
    pub fn compute_reward(&self, outcome: &Outcome, challenge_id: &str) -> ChallengeResult<f64> {
        let challenge = self.catalog.require(challenge_id)?;
        reward::compute_reward(outcome, challenge).map_err(|e| {
            metrics::counter!("challenge.rewards_rejected").increment(1);
            warn!(challenge = %challenge_id, error = %e, "Outcome rejected");
            e
        })
    }

    /// The single mutating entry point: one EMA step on the user, segment
    /// and global tiers, plus one attempt (and a completion when
    /// `completed`). Call exactly once per observed outcome.
    pub fn apply_update(
        &self,
        user: &UserContext,
        challenge_id: &str,
        reward: f64,
        completed: bool,
    ) -> ChallengeResult<UpdateReceipt> {
        self.catalog.require(challenge_id)?;
        if !reward.is_finite() || reward < 0.0 {
            metrics::counter!("challenge.rewards_rejected").increment(1);
            return Err(ChallengeError::InvalidReward(reward));
        }

        let segment = user.segment();
        let user_value = self.store.update(
            &Scope::User(user.user_id.clone()),
            challenge_id,
            reward,
            LEARNING_RATE,
        );
        let segment_value =
            self.store
                .update(&Scope::Segment(segment), challenge_id, reward, LEARNING_RATE);
        let global_value = self
            .store
            .update(&Scope::Global, challenge_id, reward, LEARNING_RATE);
        let counters = self.stats.record(challenge_id, completed);

        metrics::counter!("challenge.updates").increment(1);
        if completed {
            metrics::counter!("challenge.completions").increment(1);
        }
        debug!(
            user_id = %user.user_id,
            segment = %segment,
            challenge = %challenge_id,
            reward = reward,
            user_value = user_value,
            segment_value = segment_value,
            global_value = global_value,
            "Values updated"
        );

        Ok(UpdateReceipt {
            user_id: user.user_id.clone(),
            challenge_id: challenge_id.to_string(),
            segment,
            reward,
            user_value,
            segment_value,
            global_value,
            counters,
            applied_at: Utc::now(),
        })
    }

    /// Reward an outcome and apply the resulting update in one step.
    pub fn observe(
        &self,
        user: &UserContext,
        challenge_id: &str,
        outcome: &Outcome,
    ) -> ChallengeResult<UpdateReceipt> {
        let reward = self.compute_reward(outcome, challenge_id)?;
        self.apply_update(user, challenge_id, reward, outcome.completed)
    }

    /// Pull an outcome from `oracle` and learn from it. `None` when the
    /// oracle has nothing for this user yet; nothing is updated then.
    pub fn observe_from(
        &self,
        oracle: &dyn OutcomeOracle,
        user: &UserContext,
        challenge_id: &str,
    ) -> ChallengeResult<Option<(Outcome, UpdateReceipt)>> {
        let challenge = self.catalog.require(challenge_id)?;
        let Some(outcome) = oracle.observe(user, challenge) else {
            return Ok(None);
        };
        let receipt = self.observe(user, challenge_id, &outcome)?;
        Ok(Some((outcome, receipt)))
    }

    pub fn get_insights(&self) -> ChallengeInsights {
        insights::collect(&self.catalog, self.store.as_ref(), &self.stats)
    }

    /// Top `n` challenges by blended score without exploration.
    pub fn recommend_top_n(&self, user: &UserContext, n: usize) -> ChallengeResult<Vec<ChallengeId>> {
        Ok(self
            .ranked(user, n)?
            .into_iter()
            .map(|s| s.challenge_id)
            .collect())
    }

    pub fn ranked(&self, user: &UserContext, n: usize) -> ChallengeResult<Vec<ScoredChallenge>> {
        policy::rank(&self.catalog, self.store.as_ref(), user, n)
    }

    pub fn recommend(&self, user: &UserContext) -> ChallengeResult<Vec<ChallengeId>> {
        self.recommend_top_n(user, self.config.default_recommendations)
    }

    pub fn value(&self, scope: &Scope, challenge_id: &str) -> f64 {
        self.store.get(scope, challenge_id)
    }

    pub fn counters(&self, challenge_id: &str) -> ChallengeCounters {
        self.stats.get(challenge_id)
    }

    pub fn catalog(&self) -> &ChallengeCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &dyn ValueStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::TelemetryOracle;
    use challenge_core::config::PriorConfig;

    fn engine() -> ChallengeEngine {
        ChallengeEngine::new(ChallengeCatalog::standard(), &EngineConfig::default())
    }

    fn new_user(id: &str) -> UserContext {
        UserContext::new(id)
    }

    #[test]
    fn test_first_update_initializes_all_tiers() {
        let engine = engine();
        let user = new_user("user_new");
        let receipt = engine.apply_update(&user, "Write a Review", 4.0, true).unwrap();

        assert!((receipt.user_value - 0.4).abs() < 1e-12);
        assert!((receipt.segment_value - 0.4).abs() < 1e-12);
        assert!((receipt.global_value - 0.4).abs() < 1e-12);
        assert_eq!(receipt.segment, Segment::New);
        assert_eq!(receipt.counters.attempts, 1);
        assert_eq!(receipt.counters.completions, 1);
    }

    #[test]
    fn test_update_unknown_challenge_rejected() {
        let engine = engine();
        let err = engine
            .apply_update(&new_user("u"), "Climb Everest", 1.0, false)
            .unwrap_err();
        assert!(matches!(err, ChallengeError::UnknownChallenge(_)));
        assert!(engine.store().is_empty());
        assert!(!engine.catalog().contains("Climb Everest"));
    }

    #[test]
    fn test_update_invalid_reward_rejected() {
        let engine = engine();
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                engine.apply_update(&new_user("u"), "Refer a Friend", bad, false),
                Err(ChallengeError::InvalidReward(_))
            ));
        }
        assert_eq!(engine.counters("Refer a Friend").attempts, 0);
    }

    #[test]
    fn test_counts_once_per_update() {
        let engine = engine();
        let user = new_user("u");
        engine.apply_update(&user, "Add to Wishlist", 0.0, false).unwrap();
        engine.apply_update(&user, "Add to Wishlist", 1.0, true).unwrap();

        let insights = engine.get_insights();
        let wishlist = insights
            .challenges
            .iter()
            .find(|c| c.challenge_id == "Add to Wishlist")
            .unwrap();
        assert_eq!(wishlist.attempts, 2);
        assert_eq!(wishlist.completions, 1);
        assert_eq!(insights.completion_rate("Add to Wishlist"), Some(0.5));
        assert_eq!(insights.completion_rate("Complete a Survey"), Some(0.0));
    }

    #[test]
    fn test_compute_reward_unknown_challenge() {
        let engine = engine();
        assert!(matches!(
            engine.compute_reward(&Outcome::default(), "Nope"),
            Err(ChallengeError::UnknownChallenge(_))
        ));
    }

    #[test]
    fn test_observe_uses_segment_at_update_time() {
        let engine = engine();
        let mut user = new_user("buyer");
        user.lifetime_purchases = 1;
        let outcome = Outcome {
            purchase_made: true,
            ..Outcome::default()
        };
        let receipt = engine.observe(&user, "First Purchase", &outcome).unwrap();
        assert_eq!(receipt.reward, 2.0);
        assert_eq!(receipt.segment, Segment::Purchaser);
        assert!(
            (engine.value(&Scope::Segment(Segment::Purchaser), "First Purchase") - 0.2).abs()
                < 1e-12
        );
        assert_eq!(engine.value(&Scope::Segment(Segment::New), "First Purchase"), 0.0);
    }

    #[test]
    fn test_learned_preference_drives_selection() {
        let engine = engine();
        let user = new_user("reviewer");
        let outcome = Outcome {
            completed: true,
            review_written: true,
            review_length: 500,
            ..Outcome::default()
        };
        engine.observe(&user, "Write a Review", &outcome).unwrap();

        assert_eq!(engine.select_challenge(&user, 0.0).unwrap(), "Write a Review");
        let top = engine.recommend(&user).unwrap();
        assert_eq!(top.len(), 3);
        assert_eq!(top[0], "Write a Review");
        assert_eq!(top[1], "First Purchase");
    }

    #[test]
    fn test_tiered_priors_shift_scores() {
        let config = EngineConfig {
            priors: PriorConfig::tiered(),
            ..EngineConfig::default()
        };
        let engine = ChallengeEngine::new(ChallengeCatalog::standard(), &config);
        let mut user = new_user("vip");
        user.lifetime_purchases = 10;

        let ranked = engine.ranked(&user, 1).unwrap();
        // 0.3 * 0.5 + 0.1 * 0.2
        assert!((ranked[0].score - 0.17).abs() < 1e-12);
        assert_eq!(ranked[0].challenge_id, "First Purchase");
    }

    #[test]
    fn test_observe_from_telemetry() {
        let engine = engine();
        let oracle = TelemetryOracle::new();
        let user = new_user("user_t");

        assert!(engine
            .observe_from(&oracle, &user, "Complete a Survey")
            .unwrap()
            .is_none());
        assert_eq!(engine.counters("Complete a Survey").attempts, 0);

        oracle.report(
            "user_t",
            "Complete a Survey",
            Outcome {
                completed: true,
                ..Outcome::default()
            },
        );
        let (outcome, receipt) = engine
            .observe_from(&oracle, &user, "Complete a Survey")
            .unwrap()
            .unwrap();
        assert!(outcome.completed);
        assert_eq!(receipt.reward, 1.0);
        assert_eq!(receipt.counters.completions, 1);
    }

    #[test]
    fn test_empty_catalog_errors() {
        let engine = ChallengeEngine::new(
            ChallengeCatalog::new(Vec::new()).unwrap(),
            &EngineConfig::default(),
        );
        let user = new_user("u");
        assert!(matches!(
            engine.select_challenge(&user, 0.5),
            Err(ChallengeError::EmptyCatalog)
        ));
        assert!(matches!(
            engine.recommend_top_n(&user, 3),
            Err(ChallengeError::EmptyCatalog)
        ));
        assert!(engine.get_insights().challenges.is_empty());
    }
}
