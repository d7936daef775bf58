//! Per-challenge attempt and completion counters.

use challenge_core::ChallengeCatalog;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeCounters {
    pub attempts: u64,
    pub completions: u64,
}

impl ChallengeCounters {
    /// `completions / max(1, attempts)`, so never-attempted challenges
    /// report 0.0 instead of dividing by zero.
    pub fn completion_rate(&self) -> f64 {
        self.completions as f64 / self.attempts.max(1) as f64
    }
}

/// Monotonic counters keyed by challenge id. Never reset.
pub struct ChallengeStats {
    counters: DashMap<String, ChallengeCounters>,
}

impl ChallengeStats {
    pub fn for_catalog(catalog: &ChallengeCatalog) -> Self {
        let counters = DashMap::with_capacity(catalog.len());
        for challenge in catalog.iter() {
            counters.insert(challenge.id.clone(), ChallengeCounters::default());
        }
        Self { counters }
    }

    /// Count one attempt, and one completion if `completed`.
    pub fn record(&self, challenge_id: &str, completed: bool) -> ChallengeCounters {
        let mut entry = self
            .counters
            .entry(challenge_id.to_string())
            .or_default();
        entry.attempts += 1;
        if completed {
            entry.completions += 1;
        }
        *entry
    }

    pub fn get(&self, challenge_id: &str) -> ChallengeCounters {
        self.counters
            .get(challenge_id)
            .map(|c| *c)
            .unwrap_or_default()
    }

    pub fn total_attempts(&self) -> u64 {
        self.counters.iter().map(|c| c.attempts).sum()
    }
}
