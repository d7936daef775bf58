//! Ordered, immutable challenge catalog.
//!
//! Insertion order is significant: it is the tie-break order for every
//! argmax in the engine, so the first-defined challenge wins on equal scores.

use std::collections::HashMap;

use crate::error::{ChallengeError, ChallengeResult};
use crate::types::Challenge;

#[derive(Debug, Clone, Default)]
pub struct ChallengeCatalog {
    challenges: Vec<Challenge>,
    index: HashMap<String, usize>,
}

impl ChallengeCatalog {
    /// Build a catalog, rejecting duplicate ids and zero thresholds.
    /// An empty catalog is allowed; selection on it fails explicitly.
    pub fn new(challenges: Vec<Challenge>) -> ChallengeResult<Self> {
        let mut index = HashMap::with_capacity(challenges.len());
        for (pos, challenge) in challenges.iter().enumerate() {
            if challenge.max_progress == 0 {
                return Err(ChallengeError::InvalidCatalog(format!(
                    "challenge '{}' has max_progress 0",
                    challenge.id
                )));
            }
            if index.insert(challenge.id.clone(), pos).is_some() {
                return Err(ChallengeError::InvalidCatalog(format!(
                    "duplicate challenge id '{}'",
                    challenge.id
                )));
            }
        }
        Ok(Self { challenges, index })
    }

    /// The loyalty program's standard challenge set.
    pub fn standard() -> Self {
        let challenges = vec![
            Challenge::new("First Purchase", "Make your first purchase", 1),
            Challenge::new("Write a Review", "Write a review for a product", 1),
            Challenge::new("Complete Your Profile", "Fill out all profile information", 5),
            Challenge::new("Browse Five Products", "View details of five different products", 5),
            Challenge::new("Add to Wishlist", "Add three products to your wishlist", 3),
            Challenge::new("Share on Social Media", "Share a product on social media", 1),
            Challenge::new("Refer a Friend", "Refer a friend to our platform", 1),
            Challenge::new("Complete a Survey", "Fill out our customer satisfaction survey", 1),
            Challenge::new("Download Our App", "Download and log in to our mobile app", 2),
            Challenge::new("Make a Repeat Purchase", "Make another purchase within 30 days", 1),
            Challenge::new(
                "Write an In-depth Review",
                "Write a detailed review with pros and cons",
                1,
            ),
            Challenge::new("Watch Product Video", "Watch our product demonstration videos", 3),
        ];
        let index = challenges
            .iter()
            .enumerate()
            .map(|(pos, c)| (c.id.clone(), pos))
            .collect();
        Self { challenges, index }
    }

    pub fn get(&self, id: &str) -> Option<&Challenge> {
        self.index.get(id).map(|&pos| &self.challenges[pos])
    }

    /// Like `get`, but an absent id is an `UnknownChallenge` error.
    pub fn require(&self, id: &str) -> ChallengeResult<&Challenge> {
        self.get(id)
            .ok_or_else(|| ChallengeError::UnknownChallenge(id.to_string()))
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Challenge> {
        self.challenges.iter()
    }

    pub fn as_slice(&self) -> &[Challenge] {
        &self.challenges
    }

    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}
