//! Monte Carlo forecasting over an optimized tree

mod engine;
mod results;
mod walk;

pub use engine::{units_at_layer, ForecastConfig, MonteCarloForecaster};
pub use results::{DistributionSummary, ForecastResult, RootMetrics};
pub use walk::{simulate_revenue, StepUnit, TailRisk, WalkParams};
