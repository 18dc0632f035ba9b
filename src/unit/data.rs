//! Business unit node and its contribution-weighted rollup

use crate::error::{Result, StrategyError};

/// A node in the business hierarchy.
///
/// Leaves carry authoritative revenue and margin. Internal nodes derive theirs
/// from their sub-units through [`Unit::recompute_rollup`].
///
/// Contribution and its bounds are private: every assignment goes through
/// [`Unit::set_contribution`], which clamps into
/// `[min_contribution, max_contribution]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    name: String,
    revenue: f64,
    margin: f64,

    /// `revenue * margin`, only known once the node has been rolled up
    margin_dollars: Option<f64>,
    volatility: f64,

    /// Compounded growth bounds (effective once the builder has propagated them)
    min_trend: f64,
    max_trend: f64,

    min_contribution: f64,
    max_contribution: f64,
    contribution: f64,

    sub_units: Vec<Unit>,
}

impl Unit {
    /// Create a unit with no sub-units.
    ///
    /// Contribution bounds are clamped into [0, 1]; the initial contribution is
    /// the midpoint of the clamped bounds.
    pub fn new(
        name: impl Into<String>,
        revenue: f64,
        margin: f64,
        min_trend: f64,
        max_trend: f64,
        min_contribution: f64,
        max_contribution: f64,
    ) -> Result<Self> {
        let name = name.into();

        for (field, value) in [
            ("revenue", revenue),
            ("margin", margin),
            ("min_trend", min_trend),
            ("max_trend", max_trend),
            ("min_contribution", min_contribution),
            ("max_contribution", max_contribution),
        ] {
            if !value.is_finite() {
                return Err(StrategyError::invalid_value(name, field, value));
            }
        }
        if revenue < 0.0 {
            return Err(StrategyError::invalid_value(name, "revenue", revenue));
        }

        let max_contribution = max_contribution.clamp(0.0, 1.0);
        let min_contribution = min_contribution.clamp(0.0, 1.0);
        if min_contribution > max_contribution {
            return Err(StrategyError::invalid_bounds(
                name,
                min_contribution,
                max_contribution,
            ));
        }

        Ok(Self {
            name,
            revenue,
            margin,
            margin_dollars: None,
            volatility: 0.0,
            min_trend,
            max_trend,
            min_contribution,
            max_contribution,
            contribution: (min_contribution + max_contribution) / 2.0,
            sub_units: Vec::new(),
        })
    }

    /// Create a leaf with the given financials and default bounds
    /// (no trend, contribution in [0, 1]).
    pub fn leaf(name: impl Into<String>, revenue: f64, margin: f64) -> Result<Self> {
        Self::new(name, revenue, margin, 0.0, 0.0, 0.0, 1.0)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn revenue(&self) -> f64 {
        self.revenue
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn margin_dollars(&self) -> Option<f64> {
        self.margin_dollars
    }

    /// Profit in currency units, falling back to `revenue * margin` for a node
    /// that has never been rolled up (a leaf)
    pub fn profit(&self) -> f64 {
        self.margin_dollars.unwrap_or(self.revenue * self.margin)
    }

    pub fn volatility(&self) -> f64 {
        self.volatility
    }

    pub fn min_trend(&self) -> f64 {
        self.min_trend
    }

    pub fn max_trend(&self) -> f64 {
        self.max_trend
    }

    /// Width of the trend band, `max_trend - min_trend`
    pub fn trend_spread(&self) -> f64 {
        self.max_trend - self.min_trend
    }

    pub fn min_contribution(&self) -> f64 {
        self.min_contribution
    }

    pub fn max_contribution(&self) -> f64 {
        self.max_contribution
    }

    pub fn contribution(&self) -> f64 {
        self.contribution
    }

    pub fn sub_units(&self) -> &[Unit] {
        &self.sub_units
    }

    /// Mutable access to the sub-units. The slice cannot grow or shrink and
    /// every node still guards its own contribution.
    pub fn sub_units_mut(&mut self) -> &mut [Unit] {
        &mut self.sub_units
    }

    pub fn is_leaf(&self) -> bool {
        self.sub_units.is_empty()
    }

    /// Append a sub-unit. No cycle check: trees are always built fresh from an
    /// acyclic description and ownership rules out sharing.
    pub fn add_sub_unit(&mut self, sub_unit: Unit) {
        self.sub_units.push(sub_unit);
    }

    /// Assign a contribution, clamped into the unit's bounds.
    /// Returns the value actually stored.
    pub fn set_contribution(&mut self, value: f64) -> f64 {
        self.contribution = value.min(self.max_contribution).max(self.min_contribution);
        self.contribution
    }

    /// Give this unit the whole of its parent's budget: the ceiling is raised
    /// to 1 so the clamp keeps the bound invariant.
    pub fn pin_full_contribution(&mut self) {
        self.max_contribution = 1.0;
        self.set_contribution(1.0);
    }

    /// Apply contribution bound scalers and reset the contribution to the
    /// midpoint of the new bounds.
    ///
    /// The ceiling is capped at 1 and the floor at the new ceiling. Returns
    /// `true` if the floor had to be capped.
    pub fn rescale_bounds(&mut self, min_scaler: f64, max_scaler: f64) -> bool {
        self.max_contribution = (self.max_contribution * max_scaler).min(1.0);
        let scaled_min = self.min_contribution * min_scaler;
        self.min_contribution = scaled_min.min(self.max_contribution);
        self.set_contribution((self.max_contribution + self.min_contribution) / 2.0);
        scaled_min > self.max_contribution
    }

    /// Compound this unit's raw trend bounds onto its parent's effective
    /// bounds: `(1 + own) * (1 + parent) - 1`.
    pub(crate) fn compound_trend(&mut self, parent_min: f64, parent_max: f64) {
        self.min_trend = (1.0 + self.min_trend) * (1.0 + parent_min) - 1.0;
        self.max_trend = (1.0 + self.max_trend) * (1.0 + parent_max) - 1.0;
    }

    /// Overwrite revenue (used by forecast perturbation on a private copy).
    /// Rolled-up margin dollars follow the new revenue.
    pub(crate) fn set_revenue(&mut self, revenue: f64) {
        self.revenue = revenue;
        if self.margin_dollars.is_some() {
            self.margin_dollars = Some(revenue * self.margin);
        }
    }

    /// Recompute revenue, margin, volatility and margin dollars from the
    /// sub-units' current values and contributions. No-op on a leaf.
    ///
    /// Margin is a contribution-weighted average of the sub-units' margins,
    /// not a profit-weighted one.
    pub fn recompute_rollup(&mut self) {
        if self.sub_units.is_empty() {
            return;
        }

        let mut revenue = 0.0;
        let mut margin = 0.0;
        let mut volatility = 0.0;
        for child in &self.sub_units {
            revenue += child.contribution * child.revenue;
            margin += child.contribution * child.margin;
            volatility += child.contribution * child.volatility;
        }

        self.revenue = revenue;
        self.margin = margin;
        self.volatility = volatility;
        self.margin_dollars = Some(revenue * margin);
    }

    /// Roll up the whole subtree, children before parents
    pub fn rollup_all(&mut self) {
        for child in &mut self.sub_units {
            child.rollup_all();
        }
        self.recompute_rollup();
    }

    /// Roll up only the nodes strictly above `depth` (this node is depth 0).
    /// Nodes at `depth` and below keep their current values.
    pub fn rollup_above(&mut self, depth: usize) {
        if depth == 0 {
            return;
        }
        for child in &mut self.sub_units {
            child.rollup_above(depth - 1);
        }
        self.recompute_rollup();
    }

    /// Number of levels in the subtree (a lone leaf has depth 1)
    pub fn depth(&self) -> usize {
        1 + self.sub_units.iter().map(Unit::depth).max().unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        1 + self.sub_units.iter().map(Unit::node_count).sum::<usize>()
    }

    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.sub_units.iter().map(Unit::leaf_count).sum()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn two_leaf_parent() -> Unit {
        let mut a = Unit::leaf("A", 10.0, 0.1).unwrap();
        let mut b = Unit::leaf("B", 20.0, 0.2).unwrap();
        a.set_contribution(0.3);
        b.set_contribution(0.7);

        let mut parent = Unit::leaf("Parent", 0.0, 0.0).unwrap();
        parent.add_sub_unit(a);
        parent.add_sub_unit(b);
        parent
    }

    #[test]
    fn test_bounds_clamped_and_midpoint_contribution() {
        let unit = Unit::new("U", 5.0, 0.2, 0.0, 0.0, -0.5, 1.7).unwrap();
        assert_eq!(unit.min_contribution(), 0.0);
        assert_eq!(unit.max_contribution(), 1.0);
        assert_abs_diff_eq!(unit.contribution(), 0.5);
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let err = Unit::new("Bad", 1.0, 0.1, 0.0, 0.0, 0.8, 0.2).unwrap_err();
        assert!(matches!(err, StrategyError::InvalidBounds { ref unit, .. } if unit == "Bad"));
    }

    #[test]
    fn test_non_finite_and_negative_revenue_rejected() {
        assert!(matches!(
            Unit::new("N", f64::NAN, 0.1, 0.0, 0.0, 0.0, 1.0),
            Err(StrategyError::InvalidValue { field: "revenue", .. })
        ));
        assert!(matches!(
            Unit::new("N", 1.0, 0.1, f64::INFINITY, 0.0, 0.0, 1.0),
            Err(StrategyError::InvalidValue { field: "min_trend", .. })
        ));
        assert!(matches!(
            Unit::leaf("N", -3.0, 0.1),
            Err(StrategyError::InvalidValue { field: "revenue", .. })
        ));
    }

    #[test]
    fn test_contribution_always_clamped() {
        let mut unit = Unit::new("U", 1.0, 0.1, 0.0, 0.0, 0.2, 0.6).unwrap();
        for value in [-1.0, 0.0, 0.1, 0.2, 0.45, 0.6, 0.61, 3.0] {
            let stored = unit.set_contribution(value);
            assert_eq!(stored, unit.contribution());
            assert!(stored >= unit.min_contribution() && stored <= unit.max_contribution());
        }
        assert_eq!(unit.set_contribution(0.05), 0.2);
        assert_eq!(unit.set_contribution(0.9), 0.6);
        assert_eq!(unit.set_contribution(0.45), 0.45);
    }

    #[test]
    fn test_rollup_two_leaves() {
        let mut parent = two_leaf_parent();
        parent.recompute_rollup();

        assert_abs_diff_eq!(parent.revenue(), 17.0, epsilon = 1e-12);
        assert_abs_diff_eq!(parent.margin(), 0.17, epsilon = 1e-12);
        assert_abs_diff_eq!(parent.margin_dollars().unwrap(), 2.89, epsilon = 1e-12);
        assert_eq!(parent.volatility(), 0.0);
    }

    #[test]
    fn test_leaf_rollup_is_noop() {
        let mut leaf = Unit::leaf("Leaf", 4.0, 0.3).unwrap();
        leaf.recompute_rollup();
        assert_eq!(leaf.revenue(), 4.0);
        assert_eq!(leaf.margin_dollars(), None);
        assert_abs_diff_eq!(leaf.profit(), 1.2, epsilon = 1e-12);
    }

    #[test]
    fn test_rollup_above_keeps_lower_levels() {
        let mut root = Unit::leaf("Root", 0.0, 0.0).unwrap();
        let mut mid = two_leaf_parent();
        mid.pin_full_contribution();
        root.add_sub_unit(mid);
        root.rollup_all();
        assert_abs_diff_eq!(root.revenue(), 17.0, epsilon = 1e-12);

        // Perturb the middle layer directly; rolling up above it must keep it.
        root.sub_units_mut()[0].set_revenue(40.0);
        assert_abs_diff_eq!(root.sub_units()[0].profit(), 40.0 * 0.17, epsilon = 1e-12);
        root.rollup_above(1);
        assert_abs_diff_eq!(root.revenue(), 40.0, epsilon = 1e-12);
        assert_abs_diff_eq!(root.sub_units()[0].revenue(), 40.0, epsilon = 1e-12);

        // A full rollup re-derives it from the leaves.
        root.rollup_all();
        assert_abs_diff_eq!(root.revenue(), 17.0, epsilon = 1e-12);
    }

    #[test]
    fn test_set_revenue_keeps_margin_dollars_consistent() {
        let mut parent = two_leaf_parent();
        parent.recompute_rollup();
        parent.set_revenue(50.0);
        assert_eq!(parent.margin_dollars(), Some(50.0 * parent.margin()));

        // Leaves have no rolled-up margin dollars to refresh
        let mut leaf = Unit::leaf("Leaf", 10.0, 0.25).unwrap();
        leaf.set_revenue(12.0);
        assert_eq!(leaf.margin_dollars(), None);
        assert_abs_diff_eq!(leaf.profit(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rescale_bounds_caps_ceiling_and_floor() {
        let mut unit = Unit::new("U", 1.0, 0.1, 0.0, 0.0, 0.01, 0.01).unwrap();
        let floor_capped = unit.rescale_bounds(50.0, 2.9);
        assert!(floor_capped);
        assert_abs_diff_eq!(unit.max_contribution(), 0.029, epsilon = 1e-12);
        assert_eq!(unit.min_contribution(), unit.max_contribution());

        let mut unit = Unit::new("V", 1.0, 0.1, 0.0, 0.0, 0.1, 0.5).unwrap();
        assert!(!unit.rescale_bounds(0.5, 3.0));
        assert_eq!(unit.max_contribution(), 1.0);
        assert_abs_diff_eq!(unit.min_contribution(), 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(unit.contribution(), 0.525, epsilon = 1e-12);
    }

    #[test]
    fn test_pin_full_contribution_ignores_ceiling() {
        let mut unit = Unit::new("Only", 1.0, 0.1, 0.0, 0.0, 0.1, 0.3).unwrap();
        unit.pin_full_contribution();
        assert_eq!(unit.contribution(), 1.0);
        assert_eq!(unit.max_contribution(), 1.0);
    }

    #[test]
    fn test_compound_trend() {
        let mut child = Unit::new("C", 1.0, 0.1, 0.01, 0.05, 0.0, 1.0).unwrap();
        child.compound_trend(0.02, 0.10);
        assert_abs_diff_eq!(child.max_trend(), 0.155, epsilon = 1e-12);
        assert_abs_diff_eq!(child.min_trend(), 1.01 * 1.02 - 1.0, epsilon = 1e-12);
    }

    /// Lists every field explicitly. Adding a field to `Unit` breaks this
    /// destructuring until the field is compared here as well.
    fn assert_same_fields(a: &Unit, b: &Unit) {
        let Unit {
            name,
            revenue,
            margin,
            margin_dollars,
            volatility,
            min_trend,
            max_trend,
            min_contribution,
            max_contribution,
            contribution,
            sub_units,
        } = a;
        assert_eq!(name, &b.name);
        assert_eq!(revenue, &b.revenue);
        assert_eq!(margin, &b.margin);
        assert_eq!(margin_dollars, &b.margin_dollars);
        assert_eq!(volatility, &b.volatility);
        assert_eq!(min_trend, &b.min_trend);
        assert_eq!(max_trend, &b.max_trend);
        assert_eq!(min_contribution, &b.min_contribution);
        assert_eq!(max_contribution, &b.max_contribution);
        assert_eq!(contribution, &b.contribution);
        assert_eq!(sub_units.len(), b.sub_units.len());
        for (x, y) in sub_units.iter().zip(&b.sub_units) {
            assert_same_fields(x, y);
        }
    }

    #[test]
    fn test_clone_copies_derived_fields_without_rollup() {
        let mut parent = two_leaf_parent();
        parent.recompute_rollup();
        parent.volatility = 0.25;

        let copy = parent.clone();
        assert_same_fields(&parent, &copy);
        assert_eq!(copy.volatility(), 0.25);

        // Rolling up the copy touches exactly the derived fields and agrees
        // with the source on everything else.
        let mut rolled = copy.clone();
        rolled.recompute_rollup();
        assert_eq!(rolled.volatility(), 0.0);
        rolled.volatility = 0.25;
        assert_same_fields(&parent, &rolled);
    }
}
