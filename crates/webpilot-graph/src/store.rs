//! Arena-backed store for the dynamic execution graph.
//!
//! Nodes live in a contiguous, append-only table; the string node id is
//! carried for external identity and mapped to a table index. The arena never
//! shrinks while a session lives, so the table index doubles as insertion
//! order and snapshots are a slice clone.

use std::collections::HashMap;

use webpilot_core::{Error, ExecutionNode, Result};

#[derive(Default)]
pub struct GraphStore {
    arena: Vec<ExecutionNode>,
    index: HashMap<String, usize>,
    root: Option<usize>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Add a node to the graph, linking it under its parent.
    ///
    /// Structural links are derived from `parent_id`; any pre-declared
    /// `child_ids` on the incoming node are discarded and rebuilt as children
    /// arrive. Fails with `DuplicateNode`, `SecondRoot`, or `MissingParent`.
    pub fn add_node(&mut self, mut node: ExecutionNode) -> Result<()> {
        if self.index.contains_key(&node.node_id) {
            return Err(Error::DuplicateNode(node.node_id));
        }

        let parent_idx = match &node.parent_id {
            None => {
                if self.root.is_some() {
                    return Err(Error::SecondRoot(node.node_id));
                }
                None
            }
            Some(parent_id) => match self.index.get(parent_id) {
                Some(&idx) => {
                    self.ensure_no_cycle(&node.node_id, parent_id)?;
                    Some(idx)
                }
                None => {
                    return Err(Error::MissingParent {
                        node: node.node_id,
                        parent: parent_id.clone(),
                    })
                }
            },
        };

        node.child_ids.clear();
        let idx = self.arena.len();
        self.index.insert(node.node_id.clone(), idx);
        self.arena.push(node);

        match parent_idx {
            None => self.root = Some(idx),
            Some(parent_idx) => {
                let child_id = self.arena[idx].node_id.clone();
                self.arena[parent_idx].child_ids.push(child_id);
                self.resort_children(parent_idx);
            }
        }

        debug_assert!(self.verify_structure().is_ok());
        Ok(())
    }

    /// Move `child_id` under `new_parent_id`, keeping sibling order sorted.
    /// Used by the re-planner when it splices a correction chain.
    pub fn set_parent(&mut self, child_id: &str, new_parent_id: &str) -> Result<()> {
        let child_idx = *self
            .index
            .get(child_id)
            .ok_or_else(|| Error::NodeNotFound(child_id.to_string()))?;
        let new_parent_idx = *self
            .index
            .get(new_parent_id)
            .ok_or_else(|| Error::NodeNotFound(new_parent_id.to_string()))?;

        self.ensure_no_cycle(child_id, new_parent_id)?;

        if let Some(old_parent_id) = self.arena[child_idx].parent_id.clone() {
            if let Some(&old_parent_idx) = self.index.get(&old_parent_id) {
                self.arena[old_parent_idx]
                    .child_ids
                    .retain(|id| id != child_id);
            }
        }

        self.arena[child_idx].parent_id = Some(new_parent_id.to_string());
        self.arena[new_parent_idx]
            .child_ids
            .push(child_id.to_string());
        self.resort_children(new_parent_idx);

        debug_assert!(self.verify_structure().is_ok());
        Ok(())
    }

    pub fn get(&self, node_id: &str) -> Option<&ExecutionNode> {
        self.index.get(node_id).map(|&idx| &self.arena[idx])
    }

    pub fn get_mut(&mut self, node_id: &str) -> Option<&mut ExecutionNode> {
        match self.index.get(node_id) {
            Some(&idx) => Some(&mut self.arena[idx]),
            None => None,
        }
    }

    pub fn root(&self) -> Option<&ExecutionNode> {
        self.root.map(|idx| &self.arena[idx])
    }

    pub fn root_id(&self) -> Option<&str> {
        self.root().map(|n| n.node_id.as_str())
    }

    /// Children of a node, in priority order.
    pub fn children(&self, node_id: &str) -> Vec<&ExecutionNode> {
        match self.get(node_id) {
            Some(node) => node
                .child_ids
                .iter()
                .filter_map(|id| self.get(id))
                .collect(),
            None => Vec::new(),
        }
    }

    /// All nodes in insertion order.
    pub fn all(&self) -> impl Iterator<Item = &ExecutionNode> {
        self.arena.iter()
    }

    /// Node ids in insertion order.
    pub fn insertion_order(&self) -> impl Iterator<Item = &str> {
        self.arena.iter().map(|n| n.node_id.as_str())
    }

    /// Position of a node in insertion order; stable for a node's lifetime.
    pub fn insertion_index(&self, node_id: &str) -> Option<usize> {
        self.index.get(node_id).copied()
    }

    /// Deep copy of every node, insertion order preserved.
    pub fn snapshot(&self) -> Vec<ExecutionNode> {
        self.arena.clone()
    }

    fn resort_children(&mut self, parent_idx: usize) {
        let mut keyed: Vec<(i32, usize, String)> = self.arena[parent_idx]
            .child_ids
            .iter()
            .filter_map(|id| {
                self.index.get(id).map(|&idx| {
                    (
                        self.arena[idx].execution_order_priority,
                        idx,
                        id.clone(),
                    )
                })
            })
            .collect();
        keyed.sort_by_key(|(priority, idx, _)| (*priority, *idx));
        self.arena[parent_idx].child_ids = keyed.into_iter().map(|(_, _, id)| id).collect();
    }

    fn ensure_no_cycle(&self, child_id: &str, parent_id: &str) -> Result<()> {
        let mut current = Some(parent_id.to_string());
        while let Some(id) = current {
            if id == child_id {
                return Err(Error::CycleDetected {
                    child: child_id.to_string(),
                    parent: parent_id.to_string(),
                });
            }
            current = self.get(&id).and_then(|n| n.parent_id.clone());
        }
        Ok(())
    }

    /// Check every graph invariant, structural and status-dependent. Test
    /// hook; the status rules only hold for graphs the orchestrator ran, not
    /// for arbitrary plan files.
    pub fn verify_invariants(&self) -> Result<()> {
        self.verify_structure()?;

        for node in &self.arena {
            if node.current_status == webpilot_core::NodeStatus::Success {
                let ok = node
                    .last_observation
                    .as_ref()
                    .map(|o| o.is_success())
                    .unwrap_or(false);
                if !ok {
                    return Err(Error::internal(format!(
                        "{} is SUCCESS without a successful observation",
                        node.node_id
                    )));
                }
            }
            if node.resolved_output.is_some()
                && node.current_status != webpilot_core::NodeStatus::Success
            {
                return Err(Error::internal(format!(
                    "{} carries resolved_output but is not SUCCESS",
                    node.node_id
                )));
            }
        }
        Ok(())
    }

    /// Structural invariants alone: single root, parent/child consistency,
    /// sorted child lists, no cycles. Checked after every mutation in debug
    /// builds.
    fn verify_structure(&self) -> Result<()> {
        let rootless: Vec<&ExecutionNode> =
            self.arena.iter().filter(|n| n.parent_id.is_none()).collect();
        if !self.arena.is_empty() {
            if rootless.len() != 1 {
                return Err(Error::internal(format!(
                    "expected exactly one root, found {}",
                    rootless.len()
                )));
            }
            if self.root_id() != Some(rootless[0].node_id.as_str()) {
                return Err(Error::internal("stored root id does not match the rootless node"));
            }
        }

        for node in &self.arena {
            if let Some(parent_id) = &node.parent_id {
                let parent = self
                    .get(parent_id)
                    .ok_or_else(|| Error::internal(format!("dangling parent {}", parent_id)))?;
                let count = parent
                    .child_ids
                    .iter()
                    .filter(|id| **id == node.node_id)
                    .count();
                if count != 1 {
                    return Err(Error::internal(format!(
                        "{} appears {} times in child list of {}",
                        node.node_id, count, parent_id
                    )));
                }
            }

            // Child list sorted by (priority, insertion index).
            let keys: Vec<(i32, usize)> = node
                .child_ids
                .iter()
                .filter_map(|id| {
                    self.get(id).map(|c| {
                        (
                            c.execution_order_priority,
                            self.insertion_index(id).unwrap_or(usize::MAX),
                        )
                    })
                })
                .collect();
            if keys.windows(2).any(|w| w[0] > w[1]) {
                return Err(Error::internal(format!(
                    "children of {} are not in priority order",
                    node.node_id
                )));
            }

            self.ensure_no_cycle(&node.node_id, node.parent_id.as_deref().unwrap_or(""))
                .map_err(|_| Error::internal(format!("{} is its own ancestor", node.node_id)))?;
        }
        Ok(())
    }
}
