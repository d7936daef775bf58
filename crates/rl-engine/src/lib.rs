//! Challenge recommendation engine — hierarchical epsilon-greedy bandit over
//! per-user, per-segment and global value estimates, with reward shaping,
//! EMA updates, outcome oracles and performance insights.

pub mod engine;
pub mod insights;
pub mod oracle;
pub mod policy;
pub mod reward;
pub mod stats;
pub mod value_store;

pub use engine::{ChallengeEngine, UpdateReceipt};
pub use insights::ChallengeInsights;
pub use oracle::{OutcomeOracle, SimulatedOracle, TelemetryOracle};
pub use policy::{Selection, SelectionMethod};
pub use value_store::{InMemoryValueStore, Scope, ValueStore};
