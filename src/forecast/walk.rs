//! Stochastic revenue walk for a single unit

use rand::Rng;
use rand_distr::StandardNormal;

use crate::unit::Unit;

/// Time unit of one walk step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepUnit {
    /// One step per year, `dt = 1`
    #[default]
    Annual,
    /// One step per month, `dt = 1/12`
    Monthly,
}

impl StepUnit {
    /// Step length in years
    pub fn dt(self) -> f64 {
        match self {
            StepUnit::Annual => 1.0,
            StepUnit::Monthly => 1.0 / 12.0,
        }
    }
}

/// Rare one-off shock applied to the end of a walk
#[derive(Debug, Clone, PartialEq)]
pub struct TailRisk {
    pub enabled: bool,

    /// Shock probability per walk is `|max_trend - min_trend| * probability_scale`
    pub probability_scale: f64,

    /// Shock magnitude is drawn uniformly from `[min_shock, max_shock)`
    pub min_shock: f64,
    pub max_shock: f64,
}

impl Default for TailRisk {
    fn default() -> Self {
        Self {
            enabled: true,
            probability_scale: 0.001,
            min_shock: -0.30,
            max_shock: 0.50,
        }
    }
}

impl TailRisk {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Shock probability for a trend band
    pub fn probability(&self, min_trend: f64, max_trend: f64) -> f64 {
        (max_trend - min_trend).abs() * self.probability_scale
    }
}

/// Drift and diffusion derived from a unit's effective trend band.
///
/// The band is read as roughly a 95% range: `mu` is its midpoint and
/// `sigma` a quarter of its width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkParams {
    pub mu: f64,
    pub sigma: f64,
}

impl WalkParams {
    pub fn from_trend(min_trend: f64, max_trend: f64) -> Self {
        Self {
            mu: (min_trend + max_trend) / 2.0,
            sigma: (max_trend - min_trend).abs() / 4.0,
        }
    }

    /// Multiplicative growth for one step given a standard normal draw
    pub fn step_factor(&self, dt: f64, z: f64) -> f64 {
        ((self.mu - 0.5 * self.sigma * self.sigma) * dt + self.sigma * dt.sqrt() * z).exp()
    }
}

/// Walk `unit`'s revenue forward `steps` times with geometric Brownian motion
/// and return the final value. Intermediate values are not kept.
pub fn simulate_revenue<R: Rng + ?Sized>(
    unit: &Unit,
    steps: u32,
    step_unit: StepUnit,
    tail_risk: &TailRisk,
    rng: &mut R,
) -> f64 {
    let params = WalkParams::from_trend(unit.min_trend(), unit.max_trend());
    let dt = step_unit.dt();

    let mut revenue = unit.revenue();
    for _ in 0..steps {
        let z: f64 = rng.sample(StandardNormal);
        revenue *= params.step_factor(dt, z);
    }

    if tail_risk.enabled {
        let probability = tail_risk.probability(unit.min_trend(), unit.max_trend());
        if rng.gen::<f64>() < probability {
            let shock = rng.gen_range(tail_risk.min_shock..tail_risk.max_shock);
            revenue *= 1.0 + shock;
        }
    }

    revenue
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_params_from_trend() {
        let params = WalkParams::from_trend(0.02, 0.10);
        assert_abs_diff_eq!(params.mu, 0.06, epsilon = 1e-12);
        assert_abs_diff_eq!(params.sigma, 0.02, epsilon = 1e-12);

        // Inverted bands still give a non-negative sigma
        let inverted = WalkParams::from_trend(-0.1, -0.2);
        assert_abs_diff_eq!(inverted.sigma, 0.025, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_band_is_deterministic_growth() {
        let unit = Unit::new("Flat", 100.0, 0.2, 0.05, 0.05, 0.0, 1.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let revenue = simulate_revenue(&unit, 3, StepUnit::Annual, &TailRisk::default(), &mut rng);
        assert_abs_diff_eq!(revenue, 100.0 * (0.05f64 * 3.0).exp(), epsilon = 1e-9);

        let monthly = simulate_revenue(&unit, 12, StepUnit::Monthly, &TailRisk::default(), &mut rng);
        assert_abs_diff_eq!(monthly, 100.0 * 0.05f64.exp(), epsilon = 1e-9);
    }

    #[test]
    fn test_zero_steps_keeps_revenue() {
        let unit = Unit::new("U", 42.0, 0.2, -0.1, 0.3, 0.0, 1.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let revenue = simulate_revenue(&unit, 0, StepUnit::Annual, &TailRisk::disabled(), &mut rng);
        assert_eq!(revenue, 42.0);
    }

    #[test]
    fn test_same_seed_same_walk() {
        let unit = Unit::new("U", 10.0, 0.2, -0.05, 0.25, 0.0, 1.0).unwrap();
        let walk = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            simulate_revenue(&unit, 5, StepUnit::Annual, &TailRisk::default(), &mut rng)
        };
        assert_eq!(walk(11), walk(11));
        assert_ne!(walk(11), walk(12));
    }

    #[test]
    fn test_certain_shock_stays_in_range() {
        let unit = Unit::new("Shocked", 100.0, 0.2, 0.0, 0.0, 0.0, 1.0).unwrap();
        let tail = TailRisk {
            enabled: true,
            probability_scale: 1.0,
            ..Default::default()
        };
        // A zero band has zero shock probability
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(simulate_revenue(&unit, 4, StepUnit::Annual, &tail, &mut rng), 100.0);

        let wide = Unit::new("Wide", 100.0, 0.2, -0.5, 0.5, 0.0, 1.0).unwrap();
        for seed in 0..50 {
            let mut shocked = ChaCha8Rng::seed_from_u64(seed);
            let mut calm = ChaCha8Rng::seed_from_u64(seed);
            let with_shock = simulate_revenue(&wide, 1, StepUnit::Annual, &tail, &mut shocked);
            let without = simulate_revenue(&wide, 1, StepUnit::Annual, &TailRisk::disabled(), &mut calm);
            let ratio = with_shock / without;
            assert!((0.7 - 1e-9..1.5 + 1e-9).contains(&ratio), "ratio {} out of shock range", ratio);
        }
    }
}
