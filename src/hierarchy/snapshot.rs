//! Flat, level-order view of a tree for rendering and export

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::Write;

use crate::error::Result;
use crate::unit::Unit;

/// Read-only record of one node's state.
///
/// `id` is the node's position in the level-order walk that produced the
/// snapshot; `parent_id` refers to another row of the same snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: usize,
    pub parent_id: Option<usize>,
    pub level: usize,
    pub name: String,
    pub revenue: f64,
    pub margin: f64,
    pub contribution: f64,
    pub min_contribution: f64,
    pub max_contribution: f64,
    pub min_trend: f64,
    pub max_trend: f64,
    pub volatility: f64,
    pub margin_dollars: Option<f64>,
}

impl NodeSnapshot {
    fn from_unit(unit: &Unit, id: usize, parent_id: Option<usize>, level: usize) -> Self {
        Self {
            id,
            parent_id,
            level,
            name: unit.name().to_string(),
            revenue: unit.revenue(),
            margin: unit.margin(),
            contribution: unit.contribution(),
            min_contribution: unit.min_contribution(),
            max_contribution: unit.max_contribution(),
            min_trend: unit.min_trend(),
            max_trend: unit.max_trend(),
            volatility: unit.volatility(),
            margin_dollars: unit.margin_dollars(),
        }
    }
}

/// Snapshot every node, breadth first from the root (level 0)
pub fn snapshot(root: &Unit) -> Vec<NodeSnapshot> {
    let mut rows = Vec::with_capacity(root.node_count());
    let mut queue = VecDeque::from([(root, None, 0usize)]);
    let mut next_id = 0;

    while let Some((node, parent_id, level)) = queue.pop_front() {
        let id = next_id;
        next_id += 1;
        rows.push(NodeSnapshot::from_unit(node, id, parent_id, level));

        for child in node.sub_units() {
            queue.push_back((child, Some(id), level + 1));
        }
    }

    rows
}

/// Write a snapshot as CSV with a header row
pub fn write_snapshot_csv<W: Write>(rows: &[NodeSnapshot], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
