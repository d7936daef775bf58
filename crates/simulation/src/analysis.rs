//! Post-run analysis: growth, engagement, abandonment, purchase and review
//! statistics over a simulation run, combined with the engine's insights.

use std::collections::BTreeMap;

use challenge_core::{ChallengeId, Segment};
use challenge_rl_engine::ChallengeInsights;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::population::PopulationSummary;
use crate::runner::{InteractionRecord, SimulationRun};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRate {
    pub challenge_id: ChallengeId,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub run_id: Uuid,
    pub iterations: usize,
    pub initial_population: PopulationSummary,
    pub final_population: PopulationSummary,
    pub purchase_growth: f64,
    pub review_growth: f64,
    /// Fractions in [0, 1]. `None` when nothing was recorded.
    pub overall_engagement: Option<f64>,
    pub segment_engagement: BTreeMap<Segment, f64>,
    pub challenge_engagement: BTreeMap<ChallengeId, f64>,
    pub users_never_completed: usize,
    /// Top three challenges by share of engaged attempts not completed.
    pub highest_abandonment: Vec<ChallengeRate>,
    pub purchase_rates: BTreeMap<ChallengeId, f64>,
    pub avg_review_length: Option<f64>,
    pub challenge_review_lengths: BTreeMap<ChallengeId, f64>,
    pub segment_review_lengths: BTreeMap<Segment, f64>,
    pub review_length_reward_correlation: Option<f64>,
    /// Global-tier values, highest first.
    pub global_values: Vec<ChallengeRate>,
    pub insights: ChallengeInsights,
}

fn mean_by<'a, K, I>(
    records: I,
    key: impl Fn(&InteractionRecord) -> K,
    value: impl Fn(&InteractionRecord) -> f64,
) -> BTreeMap<K, f64>
where
    K: Ord,
    I: IntoIterator<Item = &'a InteractionRecord>,
{
    let mut sums: BTreeMap<K, (f64, usize)> = BTreeMap::new();
    for r in records {
        let entry = sums.entry(key(r)).or_insert((0.0, 0));
        entry.0 += value(r);
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(k, (sum, n))| (k, sum / n as f64))
        .collect()
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Pearson correlation. `None` with fewer than two points or no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let mx = xs[..n].iter().sum::<f64>() / n as f64;
    let my = ys[..n].iter().sum::<f64>() / n as f64;
    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some(cov / (vx.sqrt() * vy.sqrt()))
}

fn sorted_desc(map: BTreeMap<ChallengeId, f64>) -> Vec<ChallengeRate> {
    let mut rates: Vec<_> = map
        .into_iter()
        .map(|(challenge_id, rate)| ChallengeRate { challenge_id, rate })
        .collect();
    rates.sort_by(|a, b| b.rate.total_cmp(&a.rate));
    rates
}

pub fn analyze(run: &SimulationRun, insights: ChallengeInsights) -> SimulationReport {
    let records = &run.records;
    let final_summary = PopulationSummary::of(&run.users);

    let engaged: Vec<&InteractionRecord> = records.iter().filter(|r| r.engaged).collect();
    let mut highest_abandonment = sorted_desc(mean_by(
        engaged.iter().copied(),
        |r| r.challenge_id.clone(),
        |r| 1.0 - flag(r.completed),
    ));
    highest_abandonment.truncate(3);

    let reviews: Vec<&InteractionRecord> = records.iter().filter(|r| r.review_written).collect();
    let lengths: Vec<f64> = reviews.iter().map(|r| r.review_length as f64).collect();
    let rewards: Vec<f64> = reviews.iter().map(|r| r.reward).collect();

    let global_values = sorted_desc(
        insights
            .challenges
            .iter()
            .map(|c| (c.challenge_id.clone(), c.global_value))
            .collect(),
    );

    SimulationReport {
        run_id: run.run_id,
        iterations: run.iterations,
        initial_population: run.initial,
        final_population: final_summary,
        purchase_growth: final_summary.avg_purchases - run.initial.avg_purchases,
        review_growth: final_summary.avg_reviews - run.initial.avg_reviews,
        overall_engagement: mean(records.iter().map(|r| flag(r.engaged))),
        segment_engagement: mean_by(records, |r| r.segment, |r| flag(r.engaged)),
        challenge_engagement: mean_by(records, |r| r.challenge_id.clone(), |r| flag(r.engaged)),
        users_never_completed: run
            .users
            .iter()
            .filter(|u| u.completed_challenges == 0)
            .count(),
        highest_abandonment,
        purchase_rates: mean_by(records, |r| r.challenge_id.clone(), |r| flag(r.purchase_made)),
        avg_review_length: mean(lengths.iter().copied()),
        challenge_review_lengths: mean_by(
            reviews.iter().copied(),
            |r| r.challenge_id.clone(),
            |r| r.review_length as f64,
        ),
        segment_review_lengths: mean_by(
            reviews.iter().copied(),
            |r| r.segment,
            |r| r.review_length as f64,
        ),
        review_length_reward_correlation: pearson(&lengths, &rewards),
        global_values,
        insights,
    }
}

/// Human-readable summary through the tracing pipeline.
pub fn log_summary(report: &SimulationReport) {
    info!(
        run_id = %report.run_id,
        iterations = report.iterations,
        purchase_growth = report.purchase_growth,
        review_growth = report.review_growth,
        overall_engagement = ?report.overall_engagement,
        users_never_completed = report.users_never_completed,
        avg_review_length = ?report.avg_review_length,
        "Simulation results"
    );
    for (segment, best) in &report.insights.best_challenges {
        if let Some(best) = best {
            let value = report
                .insights
                .segment_preferences
                .get(segment)
                .and_then(|prefs| prefs.get(best))
                .copied()
                .unwrap_or_default();
            info!(segment = %segment, challenge = %best, value = value, "Best challenge for segment");
        }
    }
    for rate in &report.highest_abandonment {
        info!(challenge = %rate.challenge_id, abandonment = rate.rate, "High abandonment");
    }
}
