use serde::Deserialize;

use crate::error::{ChallengeError, ChallengeResult};
use crate::segment::Segment;

/// Root application configuration. Loaded from environment variables
/// with the prefix `CHALLENGE_EXPRESS__` and an optional TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

// ─── Engine Config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Exploration rate used when a caller does not supply one.
    #[serde(default = "default_exploration_rate")]
    pub exploration_rate: f64,
    #[serde(default = "default_recommendations")]
    pub default_recommendations: usize,
    #[serde(default)]
    pub priors: PriorConfig,
}

/// Starting values returned for segment/global keys that have never been
/// updated. The user tier always starts at 0.0.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriorConfig {
    #[serde(default)]
    pub global: f64,
    #[serde(default)]
    pub new: f64,
    #[serde(default)]
    pub engaged: f64,
    #[serde(default)]
    pub purchaser: f64,
    #[serde(default)]
    pub high_value: f64,
}

fn default_exploration_rate() -> f64 { 0.1 }
fn default_recommendations() -> usize { 3 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exploration_rate: default_exploration_rate(),
            default_recommendations: default_recommendations(),
            priors: PriorConfig::default(),
        }
    }
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            global: 0.0,
            new: 0.0,
            engaged: 0.0,
            purchaser: 0.0,
            high_value: 0.0,
        }
    }
}

impl PriorConfig {
    /// Optimistic priors favoring higher-value segments, as used by the
    /// request-serving deployment.
    pub fn tiered() -> Self {
        Self {
            global: 0.2,
            new: 0.1,
            engaged: 0.2,
            purchaser: 0.3,
            high_value: 0.5,
        }
    }

    pub fn for_segment(&self, segment: Segment) -> f64 {
        match segment {
            Segment::New => self.new,
            Segment::Engaged => self.engaged,
            Segment::Purchaser => self.purchaser,
            Segment::HighValue => self.high_value,
        }
    }
}

// ─── Simulation Config ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_sim_users")]
    pub users: usize,
    #[serde(default = "default_sim_iterations")]
    pub iterations: usize,
    #[serde(default = "default_sim_exploration_rate")]
    pub exploration_rate: f64,
    /// Share of the population forced to near-zero engagement.
    #[serde(default = "default_inactive_fraction")]
    pub inactive_fraction: f64,
    #[serde(default = "default_inactive_engagement")]
    pub inactive_engagement: f64,
    #[serde(default = "default_min_engagement")]
    pub min_engagement: f64,
    #[serde(default = "default_max_engagement")]
    pub max_engagement: f64,
    #[serde(default = "default_seed")]
    pub seed: Option<u64>,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_sim_users() -> usize { 15 }
fn default_sim_iterations() -> usize { 20 }
fn default_sim_exploration_rate() -> f64 { 0.2 }
fn default_inactive_fraction() -> f64 { 0.2 }
fn default_inactive_engagement() -> f64 { 0.05 }
fn default_min_engagement() -> f64 { 0.1 }
fn default_max_engagement() -> f64 { 0.9 }
fn default_seed() -> Option<u64> { Some(42) }
fn default_workers() -> usize { 1 }

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            users: default_sim_users(),
            iterations: default_sim_iterations(),
            exploration_rate: default_sim_exploration_rate(),
            inactive_fraction: default_inactive_fraction(),
            inactive_engagement: default_inactive_engagement(),
            min_engagement: default_min_engagement(),
            max_engagement: default_max_engagement(),
            seed: default_seed(),
            workers: default_workers(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and an optional config file.
    pub fn load(path: Option<&str>) -> ChallengeResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("CHALLENGE_EXPRESS")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        tracing::debug!(
            file = path.unwrap_or("<none>"),
            exploration_rate = config.engine.exploration_rate,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> ChallengeResult<()> {
        check_rate(self.engine.exploration_rate)?;
        check_rate(self.simulation.exploration_rate)?;

        let sim = &self.simulation;
        let invalid = |msg: String| ChallengeError::Config(config::ConfigError::Message(msg));
        if sim.workers == 0 {
            return Err(invalid("simulation.workers must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&sim.inactive_fraction) {
            return Err(invalid(format!(
                "simulation.inactive_fraction {} outside [0, 1]",
                sim.inactive_fraction
            )));
        }
        if !(0.0..=1.0).contains(&sim.min_engagement)
            || !(0.0..=1.0).contains(&sim.max_engagement)
            || sim.min_engagement >= sim.max_engagement
        {
            return Err(invalid(format!(
                "simulation engagement range [{}, {}) is invalid",
                sim.min_engagement, sim.max_engagement
            )));
        }
        if !(0.0..=1.0).contains(&sim.inactive_engagement) {
            return Err(invalid(format!(
                "simulation.inactive_engagement {} outside [0, 1]",
                sim.inactive_engagement
            )));
        }
        Ok(())
    }
}

/// Exploration rates are probabilities; NaN fails the range check too.
pub fn check_rate(rate: f64) -> ChallengeResult<f64> {
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(ChallengeError::InvalidExplorationRate(rate))
    }
}
