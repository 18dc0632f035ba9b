//! Tree construction from hierarchy descriptions and flat snapshots for export

pub mod builder;
mod snapshot;

pub use builder::{build_tree, normalize_contributions, propagate_trends, CONTRIBUTION_BUDGET};
pub use snapshot::{snapshot, write_snapshot_csv, NodeSnapshot};
