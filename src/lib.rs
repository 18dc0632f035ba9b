//! Hierarchy Strategy - contribution optimization and revenue forecasting for business hierarchies
//!
//! This library provides:
//! - A weighted unit tree with bottom-up rollup of revenue, margin and volatility
//! - Tree construction with trend compounding and contribution-bound repair
//! - Per-level contribution optimization under budget and bound constraints
//! - Monte Carlo revenue forecasting from a chosen layer of the tree
//! - A strategy runner for comparing weight sets and forecast horizons

pub mod error;
pub mod unit;
pub mod hierarchy;
pub mod optimizer;
pub mod forecast;
pub mod scenario;

// Re-export commonly used types
pub use error::{Result, StrategyError};
pub use unit::{Unit, UnitSpec};
pub use hierarchy::{build_tree, snapshot, write_snapshot_csv, NodeSnapshot};
pub use optimizer::{ContributionOptimizer, ObjectiveWeights, OptimizationReport, SolverConfig};
pub use forecast::{DistributionSummary, ForecastConfig, ForecastResult, MonteCarloForecaster, StepUnit, TailRisk};
pub use scenario::{OptimizedTree, StrategyOutcome, StrategyRunner};
