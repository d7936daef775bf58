//! Epsilon-greedy selection over a blend of the three value tiers.

use challenge_core::config::check_rate;
use challenge_core::{ChallengeCatalog, ChallengeError, ChallengeId, ChallengeResult, Segment, UserContext};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::value_store::{Scope, ValueStore};

/// Blend weights for the user, segment and global tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    pub user: f64,
    pub segment: f64,
    pub global: f64,
}

pub const BLEND_WEIGHTS: BlendWeights = BlendWeights {
    user: 0.6,
    segment: 0.3,
    global: 0.1,
};

impl BlendWeights {
    pub fn sum(&self) -> f64 {
        self.global + self.segment + self.user
    }

    pub fn blend(&self, tiers: TierValues) -> f64 {
        self.user * tiers.user + self.segment * tiers.segment + self.global * tiers.global
    }
}

/// Raw tier estimates for one (user, challenge) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierValues {
    pub user: f64,
    pub segment: f64,
    pub global: f64,
}

impl TierValues {
    pub fn read(store: &dyn ValueStore, user_id: &str, segment: Segment, challenge_id: &str) -> Self {
        Self {
            user: store.get(&Scope::User(user_id.to_string()), challenge_id),
            segment: store.get(&Scope::Segment(segment), challenge_id),
            global: store.get(&Scope::Global, challenge_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    Explore,
    Exploit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub challenge_id: ChallengeId,
    pub segment: Segment,
    pub method: SelectionMethod,
    /// Blended score of the pick. Absent for exploration.
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChallenge {
    pub challenge_id: ChallengeId,
    pub score: f64,
    pub tiers: TierValues,
}

/// Blended score of every challenge, in catalog order.
pub fn score_all(
    catalog: &ChallengeCatalog,
    store: &dyn ValueStore,
    user: &UserContext,
) -> Vec<ScoredChallenge> {
    let segment = user.segment();
    catalog
        .iter()
        .map(|challenge| {
            let tiers = TierValues::read(store, &user.user_id, segment, &challenge.id);
            ScoredChallenge {
                challenge_id: challenge.id.clone(),
                score: BLEND_WEIGHTS.blend(tiers),
                tiers,
            }
        })
        .collect()
}

/// Choose a challenge for `user`. Explores uniformly with probability
/// `exploration_rate`, otherwise returns the highest blended score with the
/// earliest catalog entry winning ties.
pub fn select<R: Rng>(
    catalog: &ChallengeCatalog,
    store: &dyn ValueStore,
    user: &UserContext,
    exploration_rate: f64,
    rng: &mut R,
) -> ChallengeResult<Selection> {
    let exploration_rate = check_rate(exploration_rate)?;
    if catalog.is_empty() {
        return Err(ChallengeError::EmptyCatalog);
    }

    let segment = user.segment();
    if rng.gen::<f64>() < exploration_rate {
        let idx = rng.gen_range(0..catalog.len());
        return Ok(Selection {
            challenge_id: catalog.as_slice()[idx].id.clone(),
            segment,
            method: SelectionMethod::Explore,
            score: None,
        });
    }

    let mut best: Option<ScoredChallenge> = None;
    for scored in score_all(catalog, store, user) {
        match &best {
            Some(b) if scored.score <= b.score => {}
            _ => best = Some(scored),
        }
    }
    let best = best.ok_or(ChallengeError::EmptyCatalog)?;

    Ok(Selection {
        challenge_id: best.challenge_id,
        segment,
        method: SelectionMethod::Exploit,
        score: Some(best.score),
    })
}

/// Top `n` challenges by blended score, descending. Stable sort keeps
/// catalog order among equal scores.
pub fn rank(
    catalog: &ChallengeCatalog,
    store: &dyn ValueStore,
    user: &UserContext,
    n: usize,
) -> ChallengeResult<Vec<ScoredChallenge>> {
    if catalog.is_empty() {
        return Err(ChallengeError::EmptyCatalog);
    }
    let mut scored = score_all(catalog, store, user);
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(n);
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_store::{InMemoryValueStore, LEARNING_RATE};
    use challenge_core::Challenge;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn user() -> UserContext {
        UserContext::new("user_0")
    }

    #[test]
    fn test_weights_sum_to_one() {
        assert!((BLEND_WEIGHTS.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fresh_state_picks_first_challenge() {
        let catalog = ChallengeCatalog::standard();
        let store = InMemoryValueStore::new();
        let mut rng = StdRng::seed_from_u64(7);

        let selection = select(&catalog, &store, &user(), 0.0, &mut rng).unwrap();
        assert_eq!(selection.challenge_id, "First Purchase");
        assert_eq!(selection.method, SelectionMethod::Exploit);
        assert_eq!(selection.segment, Segment::New);
    }

    #[test]
    fn test_exploit_is_deterministic() {
        let catalog = ChallengeCatalog::standard();
        let store = InMemoryValueStore::new();
        store.update(&Scope::Segment(Segment::New), "Refer a Friend", 3.0, LEARNING_RATE);
        store.update(&Scope::Global, "Add to Wishlist", 3.0, LEARNING_RATE);

        let mut rng = StdRng::seed_from_u64(1);
        let first = select(&catalog, &store, &user(), 0.0, &mut rng).unwrap();
        for _ in 0..50 {
            let again = select(&catalog, &store, &user(), 0.0, &mut rng).unwrap();
            assert_eq!(again.challenge_id, first.challenge_id);
        }
        // Segment weight 0.3 beats global weight 0.1 for the same raw value.
        assert_eq!(first.challenge_id, "Refer a Friend");
    }

    #[test]
    fn test_user_tier_dominates() {
        let catalog = ChallengeCatalog::standard();
        let store = InMemoryValueStore::new();
        store.update(&Scope::User("user_0".into()), "Watch Product Video", 1.0, LEARNING_RATE);
        store.update(&Scope::Segment(Segment::New), "Refer a Friend", 1.5, LEARNING_RATE);

        let mut rng = StdRng::seed_from_u64(3);
        let selection = select(&catalog, &store, &user(), 0.0, &mut rng).unwrap();
        // 0.6 * 0.1 = 0.06 vs 0.3 * 0.15 = 0.045
        assert_eq!(selection.challenge_id, "Watch Product Video");
    }

    #[test]
    fn test_full_exploration_is_uniform() {
        let catalog = ChallengeCatalog::standard();
        let store = InMemoryValueStore::new();
        store.update(&Scope::Global, "First Purchase", 5.0, LEARNING_RATE);
        let mut rng = StdRng::seed_from_u64(42);

        let trials = 12_000;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..trials {
            let s = select(&catalog, &store, &user(), 1.0, &mut rng).unwrap();
            assert_eq!(s.method, SelectionMethod::Explore);
            *counts.entry(s.challenge_id).or_default() += 1;
        }

        assert_eq!(counts.len(), catalog.len());
        let expected = trials as f64 / catalog.len() as f64;
        for (challenge, count) in counts {
            let deviation = (count as f64 - expected).abs() / expected;
            assert!(deviation < 0.2, "{challenge} chosen {count} times");
        }
    }

    #[test]
    fn test_empty_catalog_fails() {
        let catalog = ChallengeCatalog::new(Vec::new()).unwrap();
        let store = InMemoryValueStore::new();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            select(&catalog, &store, &user(), 0.0, &mut rng),
            Err(ChallengeError::EmptyCatalog)
        ));
        assert!(matches!(
            rank(&catalog, &store, &user(), 3),
            Err(ChallengeError::EmptyCatalog)
        ));
    }

    #[test]
    fn test_invalid_exploration_rate() {
        let catalog = ChallengeCatalog::standard();
        let store = InMemoryValueStore::new();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            select(&catalog, &store, &user(), -0.1, &mut rng),
            Err(ChallengeError::InvalidExplorationRate(_))
        ));
    }

    #[test]
    fn test_rank_orders_by_score_then_catalog() {
        let catalog = ChallengeCatalog::new(vec![
            Challenge::new("A", "a", 1),
            Challenge::new("B", "b", 1),
            Challenge::new("C", "c", 1),
            Challenge::new("D", "d", 1),
        ])
        .unwrap();
        let store = InMemoryValueStore::new();
        store.update(&Scope::Global, "C", 2.0, LEARNING_RATE);

        let ranked: Vec<_> = rank(&catalog, &store, &user(), 3)
            .unwrap()
            .into_iter()
            .map(|s| s.challenge_id)
            .collect();
        assert_eq!(ranked, vec!["C", "A", "B"]);

        assert_eq!(rank(&catalog, &store, &user(), 10).unwrap().len(), 4);
        assert!(rank(&catalog, &store, &user(), 0).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_blend_is_convex(
            user_v in -10.0f64..10.0,
            segment_v in -10.0f64..10.0,
            global_v in -10.0f64..10.0,
        ) {
            let score = BLEND_WEIGHTS.blend(TierValues { user: user_v, segment: segment_v, global: global_v });
            let lo = user_v.min(segment_v).min(global_v);
            let hi = user_v.max(segment_v).max(global_v);
            prop_assert!(score >= lo - 1e-9 && score <= hi + 1e-9);
        }
    }
}
