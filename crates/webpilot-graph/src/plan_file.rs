//! Persisted plan format.
//!
//! A plan file is a JSON object `{"execution_plan": [node, ...]}`. Nodes are
//! listed in insertion order, parents before children; missing action fields
//! fall back to the benign placeholder defaults of the action model.

use std::path::Path;

use serde::{Deserialize, Serialize};
use webpilot_core::{Error, ExecutionNode, Result};

use crate::store::GraphStore;

#[derive(Debug, Serialize, Deserialize)]
pub struct PlanFile {
    pub execution_plan: Vec<ExecutionNode>,
}

impl PlanFile {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::plan_file(format!("invalid plan JSON: {}", e)))
    }

    /// Load the node list from a plan file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<ExecutionNode>> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let plan = Self::parse(&text)?;
        if plan.execution_plan.is_empty() {
            return Err(Error::EmptyPlan);
        }
        Ok(plan.execution_plan)
    }

    /// Serialize a graph back to the plan shape, insertion order preserved.
    /// Reloading the result reproduces the same traversal order and the same
    /// first scheduler selection.
    pub fn dump(store: &GraphStore) -> Self {
        Self {
            execution_plan: store.snapshot(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Add a node list to a graph in order. Parents must precede their children,
/// which holds for any list produced by [`PlanFile::dump`].
pub fn populate(store: &mut GraphStore, nodes: Vec<ExecutionNode>) -> Result<()> {
    for node in nodes {
        store.add_node(node)?;
    }
    Ok(())
}
