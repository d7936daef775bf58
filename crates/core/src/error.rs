use thiserror::Error;

pub type ChallengeResult<T> = Result<T, ChallengeError>;

#[derive(Error, Debug)]
pub enum ChallengeError {
    #[error("Unknown challenge: {0}")]
    UnknownChallenge(String),

    #[error("Challenge catalog is empty, no challenge to offer")]
    EmptyCatalog,

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Malformed outcome: {0}")]
    MalformedOutcome(String),

    #[error("Invalid reward {0}: rewards must be finite and non-negative")]
    InvalidReward(f64),

    #[error("Invalid exploration rate {0}: expected a value in [0, 1]")]
    InvalidExplorationRate(f64),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
