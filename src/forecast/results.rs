//! Forecast output structures

use serde::{Deserialize, Serialize};

use crate::unit::Unit;

/// Aggregate metrics read off a tree's root
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RootMetrics {
    pub revenue: f64,
    pub margin: f64,
    pub volatility: f64,
    pub margin_dollars: f64,
}

impl RootMetrics {
    pub fn from_unit(root: &Unit) -> Self {
        Self {
            revenue: root.revenue(),
            margin: root.margin(),
            volatility: root.volatility(),
            margin_dollars: root.profit(),
        }
    }
}

/// Root metrics from every run of a forecast, in run order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResult {
    /// Run `i` was seeded with `base_seed + i`
    pub base_seed: u64,
    pub years: u32,
    pub target_layer: usize,

    /// Units perturbed in each run
    pub perturbed_units: usize,

    pub runs: Vec<RootMetrics>,
}

impl ForecastResult {
    pub fn revenues(&self) -> Vec<f64> {
        self.runs.iter().map(|m| m.revenue).collect()
    }

    pub fn margin_dollars(&self) -> Vec<f64> {
        self.runs.iter().map(|m| m.margin_dollars).collect()
    }

    pub fn margins(&self) -> Vec<f64> {
        self.runs.iter().map(|m| m.margin).collect()
    }

    /// Distribution of root revenue across runs
    pub fn revenue_summary(&self) -> Option<DistributionSummary> {
        DistributionSummary::from_samples(&self.revenues())
    }

    /// Distribution of root margin dollars across runs
    pub fn margin_dollars_summary(&self) -> Option<DistributionSummary> {
        DistributionSummary::from_samples(&self.margin_dollars())
    }
}

/// Descriptive statistics of a sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (0 for a single observation)
    pub std_dev: f64,
    pub min: f64,
    pub p5: f64,
    pub median: f64,
    pub p95: f64,
    pub max: f64,
}

impl DistributionSummary {
    /// Summarize a sample; `None` if it is empty
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let std_dev = if count > 1 {
            let ss: f64 = sorted.iter().map(|x| (x - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        } else {
            0.0
        };

        Some(Self {
            count,
            mean,
            std_dev,
            min: sorted[0],
            p5: percentile(&sorted, 5.0),
            median: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            max: sorted[count - 1],
        })
    }
}

/// Linear-interpolated percentile of an ascending, non-empty slice
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
