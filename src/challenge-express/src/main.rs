//! Challenge Express: hierarchical epsilon-greedy challenge recommendation
//! for loyalty programs.
//!
//! Entry point that loads configuration, builds the shared engine and drives
//! the offline simulation harness.

use anyhow::Context;
use challenge_core::config::AppConfig;
use challenge_core::{ChallengeCatalog, UserContext};
use challenge_rl_engine::ChallengeEngine;
use challenge_simulation::{analyze, log_summary, Simulation, SimulationRun};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "challenge-express")]
#[command(about = "Hierarchical epsilon-greedy challenge recommendation")]
#[command(version)]
struct Cli {
    /// Optional configuration file (TOML, YAML or JSON)
    #[arg(long, env = "CHALLENGE_EXPRESS_CONFIG")]
    config: Option<String>,

    #[command(flatten)]
    overrides: SimulationOverrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct SimulationOverrides {
    /// Number of simulated users (overrides config)
    #[arg(long, global = true)]
    users: Option<usize>,

    /// Number of iterations (overrides config)
    #[arg(long, global = true)]
    iterations: Option<usize>,

    /// Worker threads sharing the engine (overrides config)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// RNG seed for reproducible runs (overrides config)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Exploration rate used while simulating (overrides config)
    #[arg(long, global = true)]
    exploration_rate: Option<f64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the simulation and print the full report as JSON
    Simulate,
    /// Warm the engine up with a simulation, then recommend for one profile
    Recommend {
        #[arg(long, default_value = "user_cli")]
        user_id: String,
        #[arg(long, default_value_t = 0)]
        purchases: u32,
        #[arg(long, default_value_t = 0)]
        reviews: u32,
        /// Number of recommendations (defaults to the engine setting)
        #[arg(short, long)]
        n: Option<usize>,
    },
    /// Run the simulation and print only the engine insights
    Insights,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "challenge_express=info,challenge_rl_engine=info,challenge_simulation=info".into()
            }),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("Challenge Express starting up");

    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    let overrides = cli.overrides;
    if let Some(users) = overrides.users {
        config.simulation.users = users;
    }
    if let Some(iterations) = overrides.iterations {
        config.simulation.iterations = iterations;
    }
    if let Some(workers) = overrides.workers {
        config.simulation.workers = workers;
    }
    if let Some(seed) = overrides.seed {
        config.simulation.seed = Some(seed);
    }
    if let Some(rate) = overrides.exploration_rate {
        config.simulation.exploration_rate = rate;
    }
    config.validate().context("invalid configuration")?;

    info!(
        users = config.simulation.users,
        iterations = config.simulation.iterations,
        workers = config.simulation.workers,
        exploration_rate = config.simulation.exploration_rate,
        "Configuration loaded"
    );

    let engine = Arc::new(ChallengeEngine::new(
        ChallengeCatalog::standard(),
        &config.engine,
    ));
    let simulation = Simulation::new(engine.clone(), config.simulation.clone());

    match cli.command {
        Command::Simulate => {
            let run = simulate(&simulation)?;
            let report = analyze(&run, engine.get_insights());
            log_summary(&report);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Recommend {
            user_id,
            purchases,
            reviews,
            n,
        } => {
            simulate(&simulation)?;
            let user = UserContext {
                lifetime_purchases: purchases,
                reviews_written: reviews,
                ..UserContext::new(user_id)
            };
            let n = n.unwrap_or(config.engine.default_recommendations);
            let ranked = engine.ranked(&user, n)?;
            info!(
                user_id = %user.user_id,
                segment = %engine.classify_segment(&user),
                recommendations = ranked.len(),
                "Recommendations ready"
            );
            println!("{}", serde_json::to_string_pretty(&ranked)?);
        }
        Command::Insights => {
            simulate(&simulation)?;
            println!("{}", serde_json::to_string_pretty(&engine.get_insights())?);
        }
    }

    Ok(())
}

fn simulate(simulation: &Simulation) -> anyhow::Result<SimulationRun> {
    simulation.run().context("simulation run failed")
}
