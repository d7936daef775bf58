//! Three-tier value store — per-user, per-segment and global estimates for
//! every challenge, each maintained as an exponential moving average.

use std::collections::BTreeMap;

use challenge_core::config::PriorConfig;
use challenge_core::Segment;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Fixed EMA learning rate applied to every tier.
pub const LEARNING_RATE: f64 = 0.1;

/// Which tier an estimate belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "tier", content = "key")]
pub enum Scope {
    User(String),
    Segment(Segment),
    Global,
}

/// `v' = (1 - alpha) * v + alpha * reward`
pub fn ema(current: f64, reward: f64, alpha: f64) -> f64 {
    (1.0 - alpha) * current + alpha * reward
}

/// Storage seam for value estimates. Implementations must serialize
/// read-modify-write on a single `(scope, challenge)` key while letting
/// updates to different keys proceed independently.
pub trait ValueStore: Send + Sync {
    /// Current estimate, or the tier default when the key was never updated.
    fn get(&self, scope: &Scope, challenge_id: &str) -> f64;

    /// Apply one EMA step and return the new value.
    fn update(&self, scope: &Scope, challenge_id: &str, reward: f64, alpha: f64) -> f64;

    /// Recorded (updated at least once) estimates for one scope.
    fn snapshot(&self, scope: &Scope) -> BTreeMap<String, f64>;

    /// Number of recorded keys across all tiers.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Segment tier as segment -> challenge -> value. Segments without any
    /// recorded value are omitted.
    fn segment_values(&self) -> BTreeMap<Segment, BTreeMap<String, f64>> {
        Segment::ALL
            .iter()
            .filter_map(|&segment| {
                let values = self.snapshot(&Scope::Segment(segment));
                (!values.is_empty()).then_some((segment, values))
            })
            .collect()
    }
}

/// Sharded in-process store. Each key lives in one DashMap shard, so the
/// entry guard taken in `update` serializes writers of that key only.
pub struct InMemoryValueStore {
    values: DashMap<(Scope, String), f64>,
    priors: PriorConfig,
}

impl InMemoryValueStore {
    pub fn new() -> Self {
        Self::with_priors(PriorConfig::default())
    }

    pub fn with_priors(priors: PriorConfig) -> Self {
        Self {
            values: DashMap::new(),
            priors,
        }
    }

    fn default_for(&self, scope: &Scope) -> f64 {
        match scope {
            Scope::User(_) => 0.0,
            Scope::Segment(segment) => self.priors.for_segment(*segment),
            Scope::Global => self.priors.global,
        }
    }
}

impl Default for InMemoryValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueStore for InMemoryValueStore {
    fn get(&self, scope: &Scope, challenge_id: &str) -> f64 {
        self.values
            .get(&(scope.clone(), challenge_id.to_string()))
            .map(|v| *v)
            .unwrap_or_else(|| self.default_for(scope))
    }

    fn update(&self, scope: &Scope, challenge_id: &str, reward: f64, alpha: f64) -> f64 {
        let initial = self.default_for(scope);
        let mut entry = self
            .values
            .entry((scope.clone(), challenge_id.to_string()))
            .or_insert(initial);
        *entry = ema(*entry, reward, alpha);
        *entry
    }

    fn snapshot(&self, scope: &Scope) -> BTreeMap<String, f64> {
        self.values
            .iter()
            .filter(|e| &e.key().0 == scope)
            .map(|e| (e.key().1.clone(), *e.value()))
            .collect()
    }

    fn len(&self) -> usize {
        self.values.len()
    }
}
