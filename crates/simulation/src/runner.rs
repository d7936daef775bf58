//! Simulation runner: drives a population through repeated
//! select / interact / reward / update cycles against a shared engine.

use std::sync::Arc;

use anyhow::{Context, Result};
use challenge_core::config::SimulationConfig;
use challenge_core::{ChallengeId, Outcome, Segment};
use challenge_rl_engine::{ChallengeEngine, OutcomeOracle, SimulatedOracle};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::population::{create_population, PopulationSummary, SimulatedUser};

/// One user's interaction in one iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub iteration: usize,
    pub user_id: String,
    pub segment: Segment,
    pub challenge_id: ChallengeId,
    pub engaged: bool,
    pub completed: bool,
    pub purchase_made: bool,
    pub review_written: bool,
    pub review_length: i64,
    pub reward: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRun {
    pub run_id: Uuid,
    pub iterations: usize,
    pub initial: PopulationSummary,
    pub users: Vec<SimulatedUser>,
    pub records: Vec<InteractionRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct Simulation {
    engine: Arc<ChallengeEngine>,
    oracle: Arc<SimulatedOracle>,
    config: SimulationConfig,
}

impl Simulation {
    pub fn new(engine: Arc<ChallengeEngine>, config: SimulationConfig) -> Self {
        let oracle = match config.seed {
            Some(seed) => SimulatedOracle::seeded(seed.wrapping_add(1)),
            None => SimulatedOracle::new(),
        };
        Self {
            engine,
            oracle: Arc::new(oracle),
            config,
        }
    }

    pub fn engine(&self) -> &Arc<ChallengeEngine> {
        &self.engine
    }

    fn rng(&self, stream: u64) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream.wrapping_mul(0x9e37_79b9))),
            None => StdRng::from_entropy(),
        }
    }

    /// Run the configured number of iterations over a fresh population.
    /// Users are split across `workers` threads; with one worker and a seed
    /// the run is fully reproducible.
    pub fn run(&self) -> Result<SimulationRun> {
        let started_at = Utc::now();
        let mut population_rng = self.rng(0);
        let mut users = create_population(&self.config, &mut population_rng);
        for user in &users {
            self.oracle
                .set_engagement(&user.context.user_id, user.engagement_probability);
        }
        let initial = PopulationSummary::of(&users);

        let workers = self.config.workers.max(1);
        let chunk_size = users.len().div_ceil(workers).max(1);
        let mut rngs: Vec<StdRng> = (0..workers as u64).map(|w| self.rng(w + 1)).collect();
        let mut records = Vec::with_capacity(users.len() * self.config.iterations);

        info!(
            users = users.len(),
            iterations = self.config.iterations,
            workers = workers,
            exploration_rate = self.config.exploration_rate,
            "Simulation started"
        );

        for iteration in 1..=self.config.iterations {
            let batches: Vec<Result<Vec<InteractionRecord>>> = std::thread::scope(|s| {
                let handles: Vec<_> = users
                    .chunks_mut(chunk_size)
                    .zip(rngs.iter_mut())
                    .map(|(chunk, rng)| {
                        s.spawn(move || {
                            chunk
                                .iter_mut()
                                .map(|user| self.step(iteration, user, rng))
                                .collect::<Result<Vec<_>>>()
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| {
                        h.join()
                            .unwrap_or_else(|_| Err(anyhow::anyhow!("simulation worker panicked")))
                    })
                    .collect()
            });
            for batch in batches {
                records.extend(batch.with_context(|| format!("iteration {iteration} failed"))?);
            }
            debug!(iteration = iteration, records = records.len(), "Iteration complete");
        }

        info!(records = records.len(), "Simulation complete");
        Ok(SimulationRun {
            run_id: Uuid::new_v4(),
            iterations: self.config.iterations,
            initial,
            users,
            records,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// One iteration for one user.
    fn step(
        &self,
        iteration: usize,
        user: &mut SimulatedUser,
        rng: &mut StdRng,
    ) -> Result<InteractionRecord> {
        let catalog = self.engine.catalog();
        let needs_challenge = match &user.context.active_challenge {
            None => true,
            Some(id) => user.context.challenge_progress >= catalog.require(id)?.max_progress,
        };
        if needs_challenge {
            let selection = self.engine.select_challenge_with_rng(
                &user.context,
                self.config.exploration_rate,
                rng,
            )?;
            debug!(
                user_id = %user.context.user_id,
                segment = %selection.segment,
                challenge = %selection.challenge_id,
                "Challenge assigned"
            );
            user.context.assign_challenge(selection.challenge_id);
        }

        let challenge_id = user
            .context
            .active_challenge
            .clone()
            .context("user has no active challenge after assignment")?;
        let challenge = catalog.require(&challenge_id)?.clone();
        let segment = user.context.segment();

        if rng.gen::<f64>() > user.engagement_probability {
            // Disengaged: learn a zero reward, count an attempt, no progress.
            let receipt = self
                .engine
                .apply_update(&user.context, &challenge_id, 0.0, false)?;
            debug!(user_id = %user.context.user_id, "User did not engage");
            return Ok(record(
                iteration,
                user,
                segment,
                &challenge_id,
                false,
                &Outcome::disengaged(),
                receipt.reward,
            ));
        }

        let outcome = self
            .oracle
            .observe(&user.context, &challenge)
            .context("simulated oracle produced no outcome")?;
        // Reward and update are attributed to the segment the user was in
        // when the challenge was offered.
        let receipt = self.engine.observe(&user.context, &challenge_id, &outcome)?;

        let completed = user.context.apply_progress(&challenge, outcome.progress_delta);
        user.context.record_outcome(&outcome);
        if completed {
            user.completed_challenges += 1;
            user.context.clear_active_challenge();
            debug!(user_id = %user.context.user_id, challenge = %challenge_id, "Challenge completed");
        }

        Ok(record(iteration, user, segment, &challenge_id, true, &outcome, receipt.reward))
    }
}

fn record(
    iteration: usize,
    user: &SimulatedUser,
    segment: Segment,
    challenge_id: &str,
    engaged: bool,
    outcome: &Outcome,
    reward: f64,
) -> InteractionRecord {
    InteractionRecord {
        iteration,
        user_id: user.context.user_id.clone(),
        segment,
        challenge_id: challenge_id.to_string(),
        engaged,
        completed: outcome.completed,
        purchase_made: outcome.purchase_made,
        review_written: outcome.review_written,
        review_length: outcome.review_length,
        reward,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use challenge_core::config::EngineConfig;
    use challenge_core::ChallengeCatalog;

    fn simulation(config: SimulationConfig) -> Simulation {
        let engine = Arc::new(ChallengeEngine::new(
            ChallengeCatalog::standard(),
            &EngineConfig::default(),
        ));
        Simulation::new(engine, config)
    }

    #[test]
    fn test_one_record_per_user_per_iteration() {
        let config = SimulationConfig {
            users: 10,
            iterations: 5,
            ..SimulationConfig::default()
        };
        let sim = simulation(config);
        let run = sim.run().unwrap();

        assert_eq!(run.records.len(), 50);
        assert_eq!(run.users.len(), 10);
        let attempts: u64 = sim
            .engine()
            .get_insights()
            .challenges
            .iter()
            .map(|c| c.attempts)
            .sum();
        assert_eq!(attempts, 50);
    }

    #[test]
    fn test_disengaged_records_have_zero_reward() {
        let config = SimulationConfig {
            users: 5,
            iterations: 10,
            min_engagement: 0.0,
            max_engagement: 0.01,
            inactive_fraction: 0.0,
            ..SimulationConfig::default()
        };
        let run = simulation(config).run().unwrap();
        for r in run.records.iter().filter(|r| !r.engaged) {
            assert_eq!(r.reward, 0.0);
            assert!(!r.completed);
        }
        assert!(run.records.iter().filter(|r| !r.engaged).count() > 40);
    }

    #[test]
    fn test_seeded_single_worker_runs_match() {
        let config = SimulationConfig {
            users: 8,
            iterations: 6,
            ..SimulationConfig::default()
        };
        let a = simulation(config.clone()).run().unwrap();
        let b = simulation(config).run().unwrap();

        let key = |r: &InteractionRecord| {
            (r.user_id.clone(), r.challenge_id.clone(), r.engaged, r.completed, r.review_length)
        };
        let left: Vec<_> = a.records.iter().map(key).collect();
        let right: Vec<_> = b.records.iter().map(key).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn test_multiple_workers_record_everything() {
        let config = SimulationConfig {
            users: 12,
            iterations: 4,
            workers: 3,
            seed: None,
            ..SimulationConfig::default()
        };
        let run = simulation(config).run().unwrap();
        assert_eq!(run.records.len(), 48);
        for user in &run.users {
            assert_eq!(
                run.records.iter().filter(|r| r.user_id == user.context.user_id).count(),
                4
            );
        }
    }

    #[test]
    fn test_completions_clear_active_challenge() {
        let config = SimulationConfig {
            users: 6,
            iterations: 15,
            min_engagement: 0.95,
            max_engagement: 1.0,
            inactive_fraction: 0.0,
            ..SimulationConfig::default()
        };
        let run = simulation(config).run().unwrap();
        let completed = run.records.iter().filter(|r| r.completed).count() as u32;
        let per_user: u32 = run.users.iter().map(|u| u.completed_challenges).sum();
        assert_eq!(completed, per_user);
        assert!(completed > 0);
    }
}
