//! Strategy runner for repeated optimize/forecast passes
//!
//! Validates a hierarchy description once, then builds a fresh tree for every
//! operation so passes with different weights or horizons never see each
//! other's contributions.

use log::info;
use std::path::Path;

use crate::error::Result;
use crate::forecast::{ForecastConfig, ForecastResult, MonteCarloForecaster};
use crate::hierarchy::build_tree;
use crate::optimizer::{ContributionOptimizer, ObjectiveWeights, OptimizationReport, SolverConfig};
use crate::unit::{Unit, UnitSpec};

/// An optimized tree with the report from its optimization pass
#[derive(Debug, Clone)]
pub struct OptimizedTree {
    pub tree: Unit,
    pub report: OptimizationReport,
}

/// Result of one named weight set
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub name: String,
    pub weights: ObjectiveWeights,
    pub optimized: OptimizedTree,
    pub forecast: ForecastResult,
}

/// Pre-validated hierarchy runner
///
/// # Example
/// ```ignore
/// let runner = StrategyRunner::from_path("data/acme.json")?;
///
/// for (name, weights) in strategies {
///     let optimized = runner.optimize(&weights);
///     let result = runner.forecast(&optimized.tree, config.clone())?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct StrategyRunner {
    spec: UnitSpec,
    solver: SolverConfig,
}

impl StrategyRunner {
    /// Create a runner, rejecting descriptions that cannot be built
    pub fn new(spec: UnitSpec) -> Result<Self> {
        build_tree(&spec)?;
        Ok(Self {
            spec,
            solver: SolverConfig::default(),
        })
    }

    /// Create a runner from a JSON hierarchy file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(UnitSpec::from_path(path)?)
    }

    /// Replace the solver settings used by every optimization pass
    pub fn with_solver(mut self, solver: SolverConfig) -> Result<Self> {
        solver.validate()?;
        self.solver = solver;
        Ok(self)
    }

    /// Freshly built tree (trends propagated, contributions normalized, rolled up)
    pub fn build(&self) -> Result<Unit> {
        build_tree(&self.spec)
    }

    /// Build a fresh tree and optimize its contributions
    pub fn optimize(&self, weights: &ObjectiveWeights) -> Result<OptimizedTree> {
        let optimizer = ContributionOptimizer::new(*weights, self.solver.clone())?;
        let mut tree = self.build()?;
        let report = optimizer.optimize(&mut tree);
        Ok(OptimizedTree { tree, report })
    }

    /// Forecast an already optimized tree
    pub fn forecast(&self, tree: &Unit, config: ForecastConfig) -> Result<ForecastResult> {
        let forecaster = MonteCarloForecaster::new(config)?;
        Ok(forecaster.forecast(tree))
    }

    /// Forecast the same tree at every horizon from 1 to `config.years`,
    /// one result per horizon in ascending order
    pub fn forecast_horizons(&self, tree: &Unit, config: &ForecastConfig) -> Result<Vec<ForecastResult>> {
        config.validate()?;
        (1..=config.years)
            .map(|years| {
                let horizon = ForecastConfig {
                    years,
                    ..config.clone()
                };
                self.forecast(tree, horizon)
            })
            .collect()
    }

    /// Optimize and forecast once per named weight set
    pub fn run_strategies(
        &self,
        strategies: &[(String, ObjectiveWeights)],
        config: &ForecastConfig,
    ) -> Result<Vec<StrategyOutcome>> {
        config.validate()?;
        let mut outcomes = Vec::with_capacity(strategies.len());
        for (name, weights) in strategies {
            let optimized = self.optimize(weights)?;
            let forecast = self.forecast(&optimized.tree, config.clone())?;
            info!(
                "Strategy '{}': root revenue {:.4}, {} fallbacks",
                name,
                optimized.tree.revenue(),
                optimized.report.fallbacks.len()
            );
            outcomes.push(StrategyOutcome {
                name: name.clone(),
                weights: *weights,
                optimized,
                forecast,
            });
        }
        Ok(outcomes)
    }
}
