//! Declarative hierarchy description and JSON loading

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::Unit;
use crate::error::Result;

fn default_max_contribution() -> f64 {
    1.0
}

/// Static parameters for one unit plus its ordered sub-unit descriptions.
///
/// Absent fields default to revenue 0, margin 0, trends 0 and contribution
/// bounds [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub name: String,

    #[serde(default)]
    pub revenue: f64,

    #[serde(default)]
    pub margin: f64,

    #[serde(default)]
    pub min_trend: f64,

    #[serde(default)]
    pub max_trend: f64,

    #[serde(default)]
    pub min_contribution: f64,

    #[serde(default = "default_max_contribution")]
    pub max_contribution: f64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UnitSpec>,
}

impl UnitSpec {
    /// A description with every parameter at its default
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            revenue: 0.0,
            margin: 0.0,
            min_trend: 0.0,
            max_trend: 0.0,
            min_contribution: 0.0,
            max_contribution: default_max_contribution(),
            children: Vec::new(),
        }
    }

    pub fn with_financials(mut self, revenue: f64, margin: f64) -> Self {
        self.revenue = revenue;
        self.margin = margin;
        self
    }

    pub fn with_trend(mut self, min_trend: f64, max_trend: f64) -> Self {
        self.min_trend = min_trend;
        self.max_trend = max_trend;
        self
    }

    pub fn with_contribution(mut self, min_contribution: f64, max_contribution: f64) -> Self {
        self.min_contribution = min_contribution;
        self.max_contribution = max_contribution;
        self
    }

    pub fn with_child(mut self, child: UnitSpec) -> Self {
        self.children.push(child);
        self
    }

    /// Parse a hierarchy from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a hierarchy from a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Build the unit for this description alone, without its children and
    /// without trend propagation
    pub fn to_unit(&self) -> Result<Unit> {
        Unit::new(
            self.name.as_str(),
            self.revenue,
            self.margin,
            self.min_trend,
            self.max_trend,
            self.min_contribution,
            self.max_contribution,
        )
    }
}
