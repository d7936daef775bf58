pub mod catalog;
pub mod config;
pub mod error;
pub mod segment;
pub mod types;

pub use catalog::ChallengeCatalog;
pub use config::AppConfig;
pub use error::{ChallengeError, ChallengeResult};
pub use segment::Segment;
pub use types::{Challenge, ChallengeId, ChallengeLifecycle, Outcome, UserContext};
