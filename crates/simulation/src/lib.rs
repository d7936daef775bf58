//! Offline simulation harness for the challenge engine: a synthetic user
//! population, a multi-iteration runner and a post-run report.

pub mod analysis;
pub mod population;
pub mod runner;

pub use analysis::{analyze, log_summary, ChallengeRate, SimulationReport};
pub use population::{create_population, PopulationSummary, SimulatedUser};
pub use runner::{InteractionRecord, Simulation, SimulationRun};
