//! Weighted multi-factor objective for one level of the hierarchy

use serde::{Deserialize, Serialize};

use super::solver::Objective;
use crate::error::{Result, StrategyError};
use crate::unit::Unit;

fn default_alpha() -> f64 {
    0.5
}

fn default_beta() -> f64 {
    0.5
}

fn default_gamma() -> f64 {
    0.2
}

fn default_delta() -> f64 {
    0.1
}

/// Factor weights for the allocation objective.
///
/// Revenue, margin and growth are rewarded; volatility is penalized.
/// Keys missing from a serialized config take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    /// Revenue weight
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Margin weight
    #[serde(default = "default_beta")]
    pub beta: f64,

    /// Growth-spread weight
    #[serde(default = "default_gamma")]
    pub gamma: f64,

    /// Volatility penalty
    #[serde(default = "default_delta")]
    pub delta: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            beta: default_beta(),
            gamma: default_gamma(),
            delta: default_delta(),
        }
    }
}

impl ObjectiveWeights {
    /// Reject weights that would turn every score into NaN or infinity
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("gamma", self.gamma),
            ("delta", self.delta),
        ] {
            if !value.is_finite() {
                return Err(StrategyError::invalid_config(format!(
                    "objective weight {} must be finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Standardize to zero mean and unit (population) variance.
/// A constant array is returned unchanged.
pub fn standardize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    if std_dev > 0.0 {
        values.iter().map(|v| (v - mean) / std_dev).collect()
    } else {
        values.to_vec()
    }
}

/// Linear objective over one level's contribution vector:
/// `Σ cᵢ (α·revᵢ + β·marᵢ + γ·growᵢ − δ·volᵢ)` with every factor
/// standardized across the level.
#[derive(Debug, Clone)]
pub struct LevelObjective {
    scores: Vec<f64>,
}

impl LevelObjective {
    /// Build the objective from the children's current (already rolled up)
    /// values.
    pub fn from_children(children: &[Unit], weights: &ObjectiveWeights) -> Self {
        let revenues: Vec<f64> = children.iter().map(Unit::revenue).collect();
        let margins: Vec<f64> = children.iter().map(Unit::margin).collect();
        let spreads: Vec<f64> = children.iter().map(Unit::trend_spread).collect();

        // Volatility proxy is the magnitude of the raw growth spread
        let magnitudes: Vec<f64> = spreads.iter().map(|s| s.abs()).collect();

        let revenues = standardize(&revenues);
        let margins = standardize(&margins);
        let growth = standardize(&spreads);
        let volatility = standardize(&magnitudes);

        let scores = (0..children.len())
            .map(|i| {
                weights.alpha * revenues[i] + weights.beta * margins[i] + weights.gamma * growth[i]
                    - weights.delta * volatility[i]
            })
            .collect();

        Self { scores }
    }

    /// Per-child weighted factor score (the objective's coefficients)
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }
}

impl Objective for LevelObjective {
    fn value(&self, x: &[f64]) -> f64 {
        x.iter().zip(&self.scores).map(|(c, s)| c * s).sum()
    }

    fn gradient(&self, _x: &[f64], out: &mut [f64]) {
        out.copy_from_slice(&self.scores);
    }
}
