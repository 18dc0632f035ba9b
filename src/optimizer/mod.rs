//! Per-level contribution optimization
//!
//! For every internal node, bottom-up, picks contributions for its direct
//! children that stay within each child's bounds, sum to the allocation
//! budget, and maximize a weighted score of standardized revenue, margin,
//! growth spread and volatility.

mod engine;
mod objective;
pub mod solver;

pub use engine::{ContributionOptimizer, FallbackReason, LevelFallback, LevelOutcome, OptimizationReport};
pub use objective::{standardize, LevelObjective, ObjectiveWeights};
pub use solver::{BoundedSolver, Objective, SolveOutcome, SolverConfig};
