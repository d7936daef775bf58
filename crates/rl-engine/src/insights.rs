//! Insights over accumulated counters and the segment tier — completion
//! rates, learned segment preferences, and the best challenge per segment.

use std::collections::BTreeMap;

use challenge_core::{ChallengeCatalog, ChallengeId, Segment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stats::ChallengeStats;
use crate::value_store::{Scope, ValueStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengePerformance {
    pub challenge_id: ChallengeId,
    pub attempts: u64,
    pub completions: u64,
    pub completion_rate: f64,
    pub global_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeInsights {
    pub completion_rates: BTreeMap<ChallengeId, f64>,
    pub segment_preferences: BTreeMap<Segment, BTreeMap<ChallengeId, f64>>,
    /// Every segment is listed; `None` when nothing was recorded for it.
    pub best_challenges: BTreeMap<Segment, Option<ChallengeId>>,
    /// Catalog-ordered per-challenge breakdown.
    pub challenges: Vec<ChallengePerformance>,
    pub generated_at: DateTime<Utc>,
}

impl ChallengeInsights {
    pub fn completion_rate(&self, challenge_id: &str) -> Option<f64> {
        self.completion_rates.get(challenge_id).copied()
    }

    pub fn best_challenge(&self, segment: Segment) -> Option<&str> {
        self.best_challenges
            .get(&segment)
            .and_then(|best| best.as_deref())
    }
}

/// Highest recorded value for a segment. Catalog order breaks ties.
pub fn best_challenge(
    catalog: &ChallengeCatalog,
    preferences: &BTreeMap<ChallengeId, f64>,
) -> Option<ChallengeId> {
    let mut best: Option<(&str, f64)> = None;
    for challenge in catalog.iter() {
        let Some(&value) = preferences.get(&challenge.id) else {
            continue;
        };
        match best {
            Some((_, b)) if value <= b => {}
            _ => best = Some((&challenge.id, value)),
        }
    }
    best.map(|(id, _)| id.to_string())
}

/// Read-only pass over counters and the value store.
pub fn collect(
    catalog: &ChallengeCatalog,
    store: &dyn ValueStore,
    stats: &ChallengeStats,
) -> ChallengeInsights {
    let challenges: Vec<ChallengePerformance> = catalog
        .iter()
        .map(|challenge| {
            let counters = stats.get(&challenge.id);
            ChallengePerformance {
                challenge_id: challenge.id.clone(),
                attempts: counters.attempts,
                completions: counters.completions,
                completion_rate: counters.completion_rate(),
                global_value: store.get(&Scope::Global, &challenge.id),
            }
        })
        .collect();

    let completion_rates = challenges
        .iter()
        .map(|p| (p.challenge_id.clone(), p.completion_rate))
        .collect();

    let segment_preferences = store.segment_values();
    let best_challenges = Segment::ALL
        .iter()
        .map(|&segment| {
            let best = segment_preferences
                .get(&segment)
                .and_then(|prefs| best_challenge(catalog, prefs));
            (segment, best)
        })
        .collect();

    ChallengeInsights {
        completion_rates,
        segment_preferences,
        best_challenges,
        challenges,
        generated_at: Utc::now(),
    }
}
