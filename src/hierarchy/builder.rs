//! Build an owned unit tree from a hierarchy description
//!
//! Building runs four passes in a fixed order:
//! 1. Structural build, one [`Unit`] per description node
//! 2. Trend propagation, pre-order from the root
//! 3. Contribution bound repair, level by level
//! 4. Full bottom-up rollup

use log::{debug, warn};
use std::collections::VecDeque;

use crate::error::Result;
use crate::unit::{Unit, UnitSpec};

/// Allocation budget every level's contributions are meant to sum to
pub const CONTRIBUTION_BUDGET: f64 = 1.0;

/// Target for the rescaled ceiling total when a level is repaired
const MAX_TOTAL_TARGET: f64 = 1.5;

/// Target for the rescaled floor total when a level is repaired
const MIN_TOTAL_TARGET: f64 = 0.5;

/// Build, propagate, repair and roll up a tree from its description
pub fn build_tree(spec: &UnitSpec) -> Result<Unit> {
    let mut root = build_structure(spec)?;
    propagate_trends(&mut root);
    normalize_contributions(&mut root);
    root.rollup_all();

    debug!(
        "Built hierarchy '{}': {} units, {} leaves, depth {}",
        root.name(),
        root.node_count(),
        root.leaf_count(),
        root.depth()
    );
    Ok(root)
}

/// Create the units with their raw parameters. No propagation or repair.
pub fn build_structure(spec: &UnitSpec) -> Result<Unit> {
    let mut unit = spec.to_unit()?;
    for child in &spec.children {
        unit.add_sub_unit(build_structure(child)?);
    }
    Ok(unit)
}

/// Compound every node's trend bounds onto its parent's, top-down.
///
/// The root keeps its raw bounds. Must run exactly once per tree: a second
/// pass would compound the ancestors' growth twice.
pub fn propagate_trends(root: &mut Unit) {
    propagate_from(root, 0.0, 0.0);
}

fn propagate_from(node: &mut Unit, parent_min: f64, parent_max: f64) {
    node.compound_trend(parent_min, parent_max);
    let (min_trend, max_trend) = (node.min_trend(), node.max_trend());
    for child in node.sub_units_mut() {
        propagate_from(child, min_trend, max_trend);
    }
}

/// Heuristic repair of contribution bounds that cannot meet the budget.
///
/// Level by level, when a node's children have `Σ min > 1` or `Σ max < 1`,
/// every ceiling is scaled so the ceilings total 1.5 (each capped at 1) and
/// every floor so the floors total 0.5, and each contribution is reset to the
/// midpoint. A zero total leaves its side unscaled.
///
/// This only makes the bounds less obviously infeasible. It does not make
/// contributions sum to 1.
pub fn normalize_contributions(root: &mut Unit) {
    let mut queue: VecDeque<&mut Unit> = VecDeque::new();
    queue.push_back(root);

    while let Some(node) = queue.pop_front() {
        if node.is_leaf() {
            continue;
        }

        let (min_total, max_total) = bound_totals(node.sub_units());
        if min_total > CONTRIBUTION_BUDGET || max_total < CONTRIBUTION_BUDGET {
            let max_scaler = if max_total > 0.0 { MAX_TOTAL_TARGET / max_total } else { 1.0 };
            let min_scaler = if min_total > 0.0 { MIN_TOTAL_TARGET / min_total } else { 1.0 };
            debug!(
                "Repairing bounds under '{}': min total {:.4}, max total {:.4}, scalers ({:.4}, {:.4})",
                node.name(),
                min_total,
                max_total,
                min_scaler,
                max_scaler
            );

            for child in node.sub_units_mut() {
                if child.rescale_bounds(min_scaler, max_scaler) {
                    warn!(
                        "Scaled floor of '{}' exceeded its ceiling; capped at {:.4}",
                        child.name(),
                        child.max_contribution()
                    );
                }
            }
        }

        // Preparatory only; the final rollup happens once the whole tree is repaired.
        node.recompute_rollup();
        queue.extend(node.sub_units_mut().iter_mut());
    }
}

/// Sum of the children's contribution floors and ceilings
pub fn bound_totals(children: &[Unit]) -> (f64, f64) {
    children.iter().fold((0.0, 0.0), |(min_total, max_total), child| {
        (
            min_total + child.min_contribution(),
            max_total + child.max_contribution(),
        )
    })
}
