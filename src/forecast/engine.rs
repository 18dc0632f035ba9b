//! Monte Carlo forecast engine
//!
//! One run clones the optimized tree, walks the revenue of every unit at the
//! target layer forward, and rolls the levels above it back up to the root.
//! Runs share nothing but the read-only source tree, so they fan out across
//! threads; run `i` owns a generator seeded with `base_seed + i`, which keeps
//! results reproducible for a given seed regardless of thread count.

use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::VecDeque;

use super::results::{ForecastResult, RootMetrics};
use super::walk::{simulate_revenue, StepUnit, TailRisk};
use crate::error::{Result, StrategyError};
use crate::unit::Unit;

/// Configuration for a forecast
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    /// Walk steps per run (years, or months with [`StepUnit::Monthly`])
    pub years: u32,

    /// Depth whose units are perturbed (root = 0)
    pub target_layer: usize,

    /// Number of independent runs
    pub runs: usize,

    /// Time unit of one walk step
    pub step: StepUnit,

    /// Optional end-of-walk shock
    pub tail_risk: TailRisk,

    /// Base seed; drawn at random when absent
    pub seed: Option<u64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            years: 5,
            target_layer: 5,
            runs: 100,
            step: StepUnit::Annual,
            tail_risk: TailRisk::default(),
            seed: None,
        }
    }
}

impl ForecastConfig {
    /// Reject configurations that cannot produce a forecast
    pub fn validate(&self) -> Result<()> {
        if self.years == 0 {
            return Err(StrategyError::invalid_config("years must be at least 1"));
        }
        if self.runs == 0 {
            return Err(StrategyError::invalid_config("runs must be at least 1"));
        }
        let tail = &self.tail_risk;
        if !tail.probability_scale.is_finite() || tail.probability_scale < 0.0 {
            return Err(StrategyError::invalid_config(format!(
                "tail risk probability scale must be a non-negative number, got {}",
                tail.probability_scale
            )));
        }
        if !(tail.min_shock > -1.0 && tail.min_shock < tail.max_shock && tail.max_shock.is_finite()) {
            return Err(StrategyError::invalid_config(format!(
                "tail risk shock range [{}, {}) must be non-empty and above -1",
                tail.min_shock, tail.max_shock
            )));
        }
        Ok(())
    }
}

/// Repeats perturb-and-rollup runs over copies of an optimized tree
#[derive(Debug, Clone)]
pub struct MonteCarloForecaster {
    config: ForecastConfig,
}

impl MonteCarloForecaster {
    pub fn new(config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run the configured number of independent runs. `tree` is only read.
    pub fn forecast(&self, tree: &Unit) -> ForecastResult {
        let base_seed = self.config.seed.unwrap_or_else(rand::random);
        let perturbed_units = units_at_layer(tree, self.config.target_layer);
        if perturbed_units == 0 {
            warn!(
                "No units at layer {} under '{}' (depth {}); runs will not perturb anything",
                self.config.target_layer,
                tree.name(),
                tree.depth()
            );
        }

        let runs: Vec<RootMetrics> = (0..self.config.runs)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(i as u64));
                self.run_once(tree, &mut rng)
            })
            .collect();

        info!(
            "Forecast '{}': {} runs over {} steps at layer {} ({} units, seed {})",
            tree.name(),
            runs.len(),
            self.config.years,
            self.config.target_layer,
            perturbed_units,
            base_seed
        );

        ForecastResult {
            base_seed,
            years: self.config.years,
            target_layer: self.config.target_layer,
            perturbed_units,
            runs,
        }
    }

    /// One run on a private copy of `tree`
    pub fn run_once<R: Rng + ?Sized>(&self, tree: &Unit, rng: &mut R) -> RootMetrics {
        let mut copy = tree.clone();
        self.perturb_layer(&mut copy, rng);
        copy.rollup_above(self.config.target_layer);
        RootMetrics::from_unit(&copy)
    }

    /// Walk the revenue of every unit exactly at the target layer, in level
    /// order. Deeper units are left as they are. Returns the number of units
    /// perturbed.
    pub fn perturb_layer<R: Rng + ?Sized>(&self, root: &mut Unit, rng: &mut R) -> usize {
        let target = self.config.target_layer;
        let mut perturbed = 0;
        let mut queue: VecDeque<(&mut Unit, usize)> = VecDeque::new();
        queue.push_back((root, 0));

        while let Some((node, level)) = queue.pop_front() {
            if level == target {
                let revenue = simulate_revenue(node, self.config.years, self.config.step, &self.config.tail_risk, rng);
                node.set_revenue(revenue);
                perturbed += 1;
            } else {
                queue.extend(node.sub_units_mut().iter_mut().map(|child| (child, level + 1)));
            }
        }

        debug!("Perturbed {} units at layer {}", perturbed, target);
        perturbed
    }
}

/// Number of units exactly `layer` levels below `root`
pub fn units_at_layer(root: &Unit, layer: usize) -> usize {
    if layer == 0 {
        1
    } else {
        root.sub_units().iter().map(|child| units_at_layer(child, layer - 1)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::build_tree;
    use crate::optimizer::ContributionOptimizer;
    use crate::unit::UnitSpec;
    use approx::assert_abs_diff_eq;

    fn optimized_tree() -> Unit {
        let spec = UnitSpec::named("Root")
            .with_trend(0.01, 0.03)
            .with_child(
                UnitSpec::named("North")
                    .with_contribution(0.2, 0.8)
                    .with_child(UnitSpec::named("N1").with_financials(10.0, 0.2).with_trend(0.0, 0.2))
                    .with_child(UnitSpec::named("N2").with_financials(6.0, 0.35).with_trend(-0.05, 0.1)),
            )
            .with_child(
                UnitSpec::named("South")
                    .with_contribution(0.2, 0.8)
                    .with_child(UnitSpec::named("S1").with_financials(8.0, 0.1).with_trend(0.02, 0.3)),
            );
        let mut root = build_tree(&spec).unwrap();
        ContributionOptimizer::default().optimize(&mut root);
        root
    }

    fn config(target_layer: usize, seed: u64) -> ForecastConfig {
        ForecastConfig {
            years: 5,
            target_layer,
            runs: 16,
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_configs_rejected() {
        for bad in [
            ForecastConfig { years: 0, ..Default::default() },
            ForecastConfig { runs: 0, ..Default::default() },
            ForecastConfig {
                tail_risk: TailRisk {
                    min_shock: 0.5,
                    max_shock: 0.1,
                    ..Default::default()
                },
                ..Default::default()
            },
        ] {
            assert!(matches!(
                MonteCarloForecaster::new(bad),
                Err(StrategyError::InvalidConfig { .. })
            ));
        }
    }

    #[test]
    fn test_source_tree_untouched() {
        let tree = optimized_tree();
        let before = tree.clone();

        let forecaster = MonteCarloForecaster::new(config(2, 99)).unwrap();
        let result = forecaster.forecast(&tree);
        assert_eq!(result.runs.len(), 16);
        assert_eq!(tree, before);
    }

    #[test]
    fn test_different_generators_give_independent_runs() {
        let tree = optimized_tree();
        let forecaster = MonteCarloForecaster::new(config(2, 0)).unwrap();

        let mut first = ChaCha8Rng::seed_from_u64(1);
        let mut second = ChaCha8Rng::seed_from_u64(2);
        let a = forecaster.run_once(&tree, &mut first);
        let b = forecaster.run_once(&tree, &mut second);
        assert_ne!(a.revenue, b.revenue);

        let revenues = forecaster.forecast(&tree).revenues();
        assert!(revenues.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_same_seed_reproducible() {
        let tree = optimized_tree();
        let forecaster = MonteCarloForecaster::new(config(2, 1234)).unwrap();
        let a = forecaster.forecast(&tree);
        let b = forecaster.forecast(&tree);
        assert_eq!(a.base_seed, 1234);
        assert_eq!(a.revenues(), b.revenues());
        assert_eq!(a.margin_dollars(), b.margin_dollars());
    }

    #[test]
    fn test_only_target_layer_perturbed() {
        let tree = optimized_tree();
        let forecaster = MonteCarloForecaster::new(config(1, 5)).unwrap();
        let mut copy = tree.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let perturbed = forecaster.perturb_layer(&mut copy, &mut rng);
        assert_eq!(perturbed, 2);
        assert_eq!(copy.revenue(), tree.revenue());
        for (after, before) in copy.sub_units().iter().zip(tree.sub_units()) {
            assert_ne!(after.revenue(), before.revenue());
            // below the target layer nothing moves
            assert_eq!(after.sub_units(), before.sub_units());
        }
    }

    #[test]
    fn test_rollup_rederives_root_from_perturbed_layer() {
        let tree = optimized_tree();
        let forecaster = MonteCarloForecaster::new(config(1, 8)).unwrap();
        let mut copy = tree.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        forecaster.perturb_layer(&mut copy, &mut rng);
        let perturbed: Vec<(f64, f64)> = copy
            .sub_units()
            .iter()
            .map(|u| (u.revenue(), u.contribution()))
            .collect();

        copy.rollup_above(1);
        let expected: f64 = perturbed.iter().map(|(r, c)| r * c).sum();
        assert_abs_diff_eq!(copy.revenue(), expected, epsilon = 1e-9);
        // the perturbed layer itself survives the rollup
        assert_eq!(copy.sub_units()[0].revenue(), perturbed[0].0);
    }

    #[test]
    fn test_root_layer_walk_keeps_margin_dollars_consistent() {
        let spec = UnitSpec::named("Root")
            .with_trend(0.1, 0.3)
            .with_child(UnitSpec::named("A").with_financials(10.0, 0.2))
            .with_child(UnitSpec::named("B").with_financials(20.0, 0.4));
        let tree = build_tree(&spec).unwrap();
        let forecaster = MonteCarloForecaster::new(config(0, 17)).unwrap();

        let result = forecaster.forecast(&tree);
        assert_eq!(result.perturbed_units, 1);
        for run in &result.runs {
            assert_ne!(run.revenue, tree.revenue());
            assert_abs_diff_eq!(run.margin_dollars, run.revenue * run.margin, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_layer_below_tree_perturbs_nothing() {
        let tree = optimized_tree();
        assert_eq!(units_at_layer(&tree, 7), 0);
        let forecaster = MonteCarloForecaster::new(config(7, 3)).unwrap();
        let result = forecaster.forecast(&tree);
        assert_eq!(result.perturbed_units, 0);
        for run in &result.runs {
            assert_eq!(run.revenue, tree.revenue());
        }
    }

    #[test]
    fn test_units_at_layer_counts() {
        let tree = optimized_tree();
        assert_eq!(units_at_layer(&tree, 0), 1);
        assert_eq!(units_at_layer(&tree, 1), 2);
        assert_eq!(units_at_layer(&tree, 2), 3);
    }
}
