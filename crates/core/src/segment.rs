//! Behavioral segments derived from a user's purchase and review counters.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::UserContext;

/// Coarse behavioral bucket. Recomputed on every decision, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    New,
    Engaged,
    Purchaser,
    HighValue,
}

impl Segment {
    pub const ALL: [Segment; 4] = [
        Segment::New,
        Segment::Engaged,
        Segment::Purchaser,
        Segment::HighValue,
    ];

    /// Classify a user. First matching rule wins:
    /// more than three purchases, any purchase, any review, otherwise new.
    pub fn classify(user: &UserContext) -> Self {
        if user.lifetime_purchases > 3 {
            Segment::HighValue
        } else if user.lifetime_purchases > 0 {
            Segment::Purchaser
        } else if user.reviews_written > 0 {
            Segment::Engaged
        } else {
            Segment::New
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::New => "new",
            Segment::Engaged => "engaged",
            Segment::Purchaser => "purchaser",
            Segment::HighValue => "high_value",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(purchases: u32, reviews: u32) -> UserContext {
        UserContext {
            lifetime_purchases: purchases,
            reviews_written: reviews,
            ..UserContext::new("u-1")
        }
    }

    #[test]
    fn test_classify_priority_order() {
        assert_eq!(Segment::classify(&user(0, 0)), Segment::New);
        assert_eq!(Segment::classify(&user(0, 2)), Segment::Engaged);
        assert_eq!(Segment::classify(&user(1, 0)), Segment::Purchaser);
        assert_eq!(Segment::classify(&user(3, 5)), Segment::Purchaser);
        assert_eq!(Segment::classify(&user(4, 0)), Segment::HighValue);
    }

    #[test]
    fn test_purchases_outrank_reviews() {
        assert_eq!(Segment::classify(&user(2, 10)), Segment::Purchaser);
    }

    #[test]
    fn test_segment_serializes_snake_case() {
        let json = serde_json::to_string(&Segment::HighValue).unwrap();
        assert_eq!(json, "\"high_value\"");
        assert_eq!(Segment::HighValue.to_string(), "high_value");
    }
}
