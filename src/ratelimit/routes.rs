//! Per-operation request costs.
//!
//! The boundary layer declares how many budget units each operation consumes
//! in a flat table loaded at startup:
//!
//! ```yaml
//! /public: 1
//! /private: 2
//! /privateHeavy: 5
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::policy::RequestCost;
use crate::error::{GatekeeperError, Result};

/// Mapping from operation identifier (route path) to cost.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteCostTable {
    costs: BTreeMap<String, RequestCost>,
}

impl RouteCostTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Costs of the routes the bundled server exposes.
    pub fn standard() -> Self {
        let mut table = Self::new();
        for (route, units) in [("/public", 1), ("/private", 2), ("/privateHeavy", 5)] {
            if let Ok(cost) = RequestCost::new(units) {
                table.insert(route, cost);
            }
        }
        table
    }

    /// Load a table from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading route cost table");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load a table from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GatekeeperError::Config(format!("Failed to parse route cost table: {}", e)))
    }

    /// Declare or replace the cost of an operation.
    pub fn insert(&mut self, operation: impl Into<String>, cost: RequestCost) {
        self.costs.insert(operation.into(), cost);
    }

    /// Cost of an operation, `None` when it is not rate limited.
    pub fn cost_of(&self, operation: &str) -> Option<RequestCost> {
        self.costs.get(operation).copied()
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, RequestCost)> {
        self.costs.iter().map(|(op, cost)| (op.as_str(), *cost))
    }
}
