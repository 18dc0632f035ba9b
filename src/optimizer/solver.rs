//! Bounded, budget-constrained solver for a level's contribution vector
//!
//! Maximizes a smooth objective over
//! `{ x : Σ xᵢ = budget, loᵢ ≤ xᵢ ≤ hiᵢ }` by projected gradient ascent.
//! Each step moves along the gradient and projects back onto the feasible
//! set. The projection is `xᵢ = clamp(yᵢ − λ, loᵢ, hiᵢ)` with the shift `λ`
//! found by bisection, since the clamped sum is monotone in `λ`.

use crate::error::{Result, StrategyError};

/// Objective to maximize over a contribution vector
pub trait Objective {
    /// Objective value at `x`
    fn value(&self, x: &[f64]) -> f64;

    /// Gradient at `x`, written into `out` (same length as `x`)
    fn gradient(&self, x: &[f64], out: &mut [f64]);
}

/// Solver settings
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Maximum ascent steps before giving up
    pub max_iterations: usize,

    /// Converged once no coordinate moves more than this in one step
    pub tolerance: f64,

    /// Gradient step length
    pub step_size: f64,

    /// Value the contributions must sum to
    pub budget: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-10,
            step_size: 0.1,
            budget: 1.0,
        }
    }
}

impl SolverConfig {
    /// Reject settings under which the ascent cannot produce a valid allocation
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(StrategyError::invalid_config("max_iterations must be at least 1"));
        }
        for (name, value) in [
            ("tolerance", self.tolerance),
            ("step_size", self.step_size),
            ("budget", self.budget),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(StrategyError::invalid_config(format!(
                    "solver {} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Slack allowed when deciding whether the bounds can meet the budget, and
/// on the final sum of a converged solution
const FEASIBILITY_TOLERANCE: f64 = 1e-9;

/// Bisection steps for the projection shift
const PROJECTION_ITERATIONS: usize = 200;

/// Result of a solve
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    /// A stationary point within the feasible set
    Converged { solution: Vec<f64>, iterations: usize },

    /// The box bounds cannot sum to the budget
    Infeasible { min_total: f64, max_total: f64 },

    /// Iteration cap reached before the steps settled
    MaxIterations { iterations: usize },

    /// The steps settled on a point that is non-finite or misses the budget
    OffBudget { total: f64, iterations: usize },
}

/// Projected gradient ascent solver
#[derive(Debug, Clone, Default)]
pub struct BoundedSolver {
    config: SolverConfig,
}

impl BoundedSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Maximize `objective` starting from `seed`.
    ///
    /// `seed` is projected onto the feasible set first, so it need not sum to
    /// the budget.
    pub fn solve<O: Objective>(&self, objective: &O, seed: &[f64], bounds: &[(f64, f64)]) -> SolveOutcome {
        let budget = self.config.budget;
        let Some(mut x) = project_onto_budget(seed, bounds, budget) else {
            let (min_total, max_total) = totals(bounds);
            return SolveOutcome::Infeasible { min_total, max_total };
        };

        let mut gradient = vec![0.0; x.len()];
        let mut trial = vec![0.0; x.len()];

        for iteration in 1..=self.config.max_iterations {
            objective.gradient(&x, &mut gradient);
            for ((t, xi), gi) in trial.iter_mut().zip(&x).zip(&gradient) {
                *t = xi + self.config.step_size * gi;
            }

            let next = match project_onto_budget(&trial, bounds, budget) {
                Some(next) => next,
                None => {
                    let (min_total, max_total) = totals(bounds);
                    return SolveOutcome::Infeasible { min_total, max_total };
                }
            };

            let movement = next
                .iter()
                .zip(&x)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            x = next;

            if movement < self.config.tolerance {
                let total: f64 = x.iter().sum();
                if !total.is_finite() || (total - budget).abs() > FEASIBILITY_TOLERANCE {
                    return SolveOutcome::OffBudget {
                        total,
                        iterations: iteration,
                    };
                }
                return SolveOutcome::Converged {
                    solution: x,
                    iterations: iteration,
                };
            }
        }

        SolveOutcome::MaxIterations {
            iterations: self.config.max_iterations,
        }
    }
}

fn totals(bounds: &[(f64, f64)]) -> (f64, f64) {
    bounds
        .iter()
        .fold((0.0, 0.0), |(lo_sum, hi_sum), (lo, hi)| (lo_sum + lo, hi_sum + hi))
}

/// Euclidean projection of `point` onto `{ Σ xᵢ = budget, loᵢ ≤ xᵢ ≤ hiᵢ }`.
///
/// Returns `None` when the bounds cannot reach the budget.
pub fn project_onto_budget(point: &[f64], bounds: &[(f64, f64)], budget: f64) -> Option<Vec<f64>> {
    if point.is_empty() || point.len() != bounds.len() {
        return None;
    }
    let (min_total, max_total) = totals(bounds);
    if min_total > budget + FEASIBILITY_TOLERANCE || max_total < budget - FEASIBILITY_TOLERANCE {
        return None;
    }

    let shifted = |lambda: f64| -> Vec<f64> {
        point
            .iter()
            .zip(bounds)
            .map(|(y, (lo, hi))| (y - lambda).min(*hi).max(*lo))
            .collect()
    };

    // Every coordinate at its ceiling for `low`, at its floor for `high`
    let mut low = point
        .iter()
        .zip(bounds)
        .map(|(y, (_, hi))| y - hi)
        .fold(f64::INFINITY, f64::min);
    let mut high = point
        .iter()
        .zip(bounds)
        .map(|(y, (lo, _))| y - lo)
        .fold(f64::NEG_INFINITY, f64::max);

    for _ in 0..PROJECTION_ITERATIONS {
        let mid = (low + high) / 2.0;
        let sum: f64 = shifted(mid).iter().sum();
        if sum > budget {
            low = mid;
        } else {
            high = mid;
        }
        if high - low < f64::EPSILON * (1.0 + mid.abs()) {
            break;
        }
    }

    Some(shifted((low + high) / 2.0))
}
