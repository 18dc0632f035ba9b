//! Bottom-up contribution optimization over a unit tree

use log::{debug, info, warn};

use super::objective::{LevelObjective, ObjectiveWeights};
use super::solver::{BoundedSolver, Objective, SolveOutcome, SolverConfig};
use crate::error::{Result, StrategyError};
use crate::unit::Unit;

/// Why a level kept its pre-optimization contributions
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// The children's bounds cannot sum to the budget
    Infeasible { min_total: f64, max_total: f64 },

    /// The solver hit its iteration cap
    NotConverged { iterations: usize },

    /// The solver settled on contributions that do not sum to the budget
    OffBudget { total: f64 },
}

/// What happened at one level
#[derive(Debug, Clone, PartialEq)]
pub enum LevelOutcome {
    /// Sole child pinned to the full budget
    SingleChild,

    /// Contributions replaced by the solver's allocation
    Solved { iterations: usize, objective: f64 },

    /// Contributions left at their seed values
    Fallback(FallbackReason),
}

/// A level that fell back, named by its parent unit
#[derive(Debug, Clone, PartialEq)]
pub struct LevelFallback {
    pub unit: String,
    pub reason: FallbackReason,
}

/// Summary of an optimization pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizationReport {
    /// Levels with two or more children that the solver allocated
    pub levels_solved: usize,

    /// Levels with exactly one child
    pub single_child_levels: usize,

    /// Levels that kept their seed contributions
    pub fallbacks: Vec<LevelFallback>,
}

impl OptimizationReport {
    /// True when every level was allocated without falling back
    pub fn is_clean(&self) -> bool {
        self.fallbacks.is_empty()
    }

    fn record(&mut self, unit: &str, outcome: LevelOutcome) {
        match outcome {
            LevelOutcome::SingleChild => self.single_child_levels += 1,
            LevelOutcome::Solved { .. } => self.levels_solved += 1,
            LevelOutcome::Fallback(reason) => self.fallbacks.push(LevelFallback {
                unit: unit.to_string(),
                reason,
            }),
        }
    }
}

/// Chooses each internal node's contribution vector over its direct children,
/// bottom-up, maximizing the weighted factor objective.
///
/// Each level is optimal on its own given its children's rolled-up values;
/// the tree as a whole is not jointly optimized.
#[derive(Debug, Clone, Default)]
pub struct ContributionOptimizer {
    weights: ObjectiveWeights,
    solver: BoundedSolver,
}

impl ContributionOptimizer {
    /// Rejects non-finite weights and unusable solver settings
    pub fn new(weights: ObjectiveWeights, solver_config: SolverConfig) -> Result<Self> {
        weights.validate()?;
        solver_config.validate()?;
        Ok(Self {
            weights,
            solver: BoundedSolver::new(solver_config),
        })
    }

    /// Optimizer with the given weights and default solver settings
    pub fn with_weights(weights: ObjectiveWeights) -> Result<Self> {
        Self::new(weights, SolverConfig::default())
    }

    /// Optimize every level of the tree in post-order and refresh rollups on
    /// the way up. Never fails: levels the solver cannot handle keep their
    /// current contributions and are listed in the report.
    pub fn optimize(&self, root: &mut Unit) -> OptimizationReport {
        let mut report = OptimizationReport::default();
        self.optimize_subtree(root, &mut report);

        info!(
            "Optimized '{}': {} levels solved, {} single-child, {} fallbacks",
            root.name(),
            report.levels_solved,
            report.single_child_levels,
            report.fallbacks.len()
        );
        report
    }

    fn optimize_subtree(&self, node: &mut Unit, report: &mut OptimizationReport) {
        if node.is_leaf() {
            return;
        }
        for child in node.sub_units_mut() {
            self.optimize_subtree(child, report);
        }

        let outcome = self.allocate_level(node);
        report.record(node.name(), outcome);
    }

    /// Optimize only the direct children of `parent` (which must already be
    /// rolled up) and refresh `parent`'s rollup.
    pub fn optimize_level(&self, parent: &mut Unit) -> Result<LevelOutcome> {
        if parent.is_leaf() {
            return Err(StrategyError::empty_level(parent.name()));
        }
        Ok(self.allocate_level(parent))
    }

    /// Assumes `parent` has at least one child
    fn allocate_level(&self, parent: &mut Unit) -> LevelOutcome {
        let outcome = if parent.sub_units().len() == 1 {
            parent.sub_units_mut()[0].pin_full_contribution();
            LevelOutcome::SingleChild
        } else {
            self.solve_children(parent)
        };

        parent.recompute_rollup();
        outcome
    }

    fn solve_children(&self, parent: &mut Unit) -> LevelOutcome {
        let children = parent.sub_units();
        let objective = LevelObjective::from_children(children, &self.weights);
        let seed: Vec<f64> = children.iter().map(Unit::contribution).collect();
        let bounds: Vec<(f64, f64)> = children
            .iter()
            .map(|c| (c.min_contribution(), c.max_contribution()))
            .collect();

        match self.solver.solve(&objective, &seed, &bounds) {
            SolveOutcome::Converged { solution, iterations } => {
                let value = objective.value(&solution);
                for (child, contribution) in parent.sub_units_mut().iter_mut().zip(&solution) {
                    child.set_contribution(*contribution);
                }
                debug!(
                    "Allocated {} children of '{}' in {} iterations (objective {:.6})",
                    solution.len(),
                    parent.name(),
                    iterations,
                    value
                );
                LevelOutcome::Solved {
                    iterations,
                    objective: value,
                }
            }
            SolveOutcome::Infeasible { min_total, max_total } => {
                warn!(
                    "Bounds under '{}' cannot meet the budget (min total {:.4}, max total {:.4}); keeping current contributions",
                    parent.name(),
                    min_total,
                    max_total
                );
                LevelOutcome::Fallback(FallbackReason::Infeasible { min_total, max_total })
            }
            SolveOutcome::MaxIterations { iterations } => {
                warn!(
                    "Allocation under '{}' did not converge in {} iterations; keeping current contributions",
                    parent.name(),
                    iterations
                );
                LevelOutcome::Fallback(FallbackReason::NotConverged { iterations })
            }
            SolveOutcome::OffBudget { total, iterations } => {
                warn!(
                    "Allocation under '{}' settled off budget (total {:.6}) after {} iterations; keeping current contributions",
                    parent.name(),
                    total,
                    iterations
                );
                LevelOutcome::Fallback(FallbackReason::OffBudget { total })
            }
        }
    }
}
