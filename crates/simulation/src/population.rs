//! Synthetic user population for offline simulation runs.

use challenge_core::config::SimulationConfig;
use challenge_core::UserContext;
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedUser {
    pub context: UserContext,
    /// Chance per iteration that the user engages with their challenge.
    pub engagement_probability: f64,
    pub inactive: bool,
    pub completed_challenges: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationSummary {
    pub users: usize,
    pub avg_purchases: f64,
    pub avg_reviews: f64,
}

impl PopulationSummary {
    pub fn of(users: &[SimulatedUser]) -> Self {
        if users.is_empty() {
            return Self::default();
        }
        let n = users.len() as f64;
        Self {
            users: users.len(),
            avg_purchases: users
                .iter()
                .map(|u| u.context.lifetime_purchases as f64)
                .sum::<f64>()
                / n,
            avg_reviews: users
                .iter()
                .map(|u| u.context.reviews_written as f64)
                .sum::<f64>()
                / n,
        }
    }
}

/// Build `config.users` users named `user_{i}` with 0..5 purchases, 0..3
/// reviews and uniform engagement, then force a share of them inactive.
pub fn create_population<R: Rng>(config: &SimulationConfig, rng: &mut R) -> Vec<SimulatedUser> {
    let mut users: Vec<SimulatedUser> = (0..config.users)
        .map(|i| SimulatedUser {
            context: UserContext {
                lifetime_purchases: rng.gen_range(0..5),
                reviews_written: rng.gen_range(0..3),
                ..UserContext::new(format!("user_{i}"))
            },
            engagement_probability: rng.gen_range(config.min_engagement..config.max_engagement),
            inactive: false,
            completed_challenges: 0,
        })
        .collect();

    let inactive = (users.len() as f64 * config.inactive_fraction) as usize;
    for idx in index::sample(rng, users.len(), inactive) {
        let user = &mut users[idx];
        user.engagement_probability = config.inactive_engagement;
        user.inactive = true;
        info!(user_id = %user.context.user_id, "User set as inactive (low engagement)");
    }

    users
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_population_shape() {
        let config = SimulationConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let users = create_population(&config, &mut rng);

        assert_eq!(users.len(), 15);
        assert_eq!(users.iter().filter(|u| u.inactive).count(), 3);
        for user in &users {
            assert!(user.context.lifetime_purchases < 5);
            assert!(user.context.reviews_written < 3);
            assert!(user.context.active_challenge.is_none());
            if user.inactive {
                assert_eq!(user.engagement_probability, 0.05);
            } else {
                assert!((0.1..0.9).contains(&user.engagement_probability));
            }
        }
        assert_eq!(users[3].context.user_id, "user_3");
    }

    #[test]
    fn test_summary_averages() {
        let mut a = UserContext::new("a");
        a.lifetime_purchases = 2;
        a.reviews_written = 1;
        let b = UserContext::new("b");
        let users: Vec<_> = [a, b]
            .into_iter()
            .map(|context| SimulatedUser {
                context,
                engagement_probability: 0.5,
                inactive: false,
                completed_challenges: 0,
            })
            .collect();

        let summary = PopulationSummary::of(&users);
        assert_eq!(summary.users, 2);
        assert_eq!(summary.avg_purchases, 1.0);
        assert_eq!(summary.avg_reviews, 0.5);
        assert_eq!(PopulationSummary::of(&[]), PopulationSummary::default());
    }
}
