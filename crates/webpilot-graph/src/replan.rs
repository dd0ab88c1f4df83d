//! Failure-handling mechanics: cascade pruning and correction splicing.
//!
//! The policy (when to call the planner, when to stop) lives with the
//! executor loop; this module owns the two graph mutations it relies on.

use std::collections::VecDeque;

use tracing::{debug, info};
use webpilot_core::{Error, ExecutionNode, NodeStatus, Result};

use crate::store::GraphStore;

/// Cascade-prune the descendants of a failed node.
///
/// Breadth-first over the whole subtree; descendants currently `PENDING` or
/// `SKIPPED` become `PRUNED` with a reason naming the failed ancestor. Nodes
/// already `SUCCESS`, `FAILED`, or `PRUNED` are left untouched. Returns the
/// pruned ids.
pub fn prune_descendants(store: &mut GraphStore, failed_id: &str) -> Vec<String> {
    let Some(failed) = store.get(failed_id) else {
        return Vec::new();
    };

    let mut queue: VecDeque<String> = failed.child_ids.iter().cloned().collect();
    let mut pruned = Vec::new();

    while let Some(node_id) = queue.pop_front() {
        let Some(node) = store.get(&node_id) else {
            continue;
        };
        queue.extend(node.child_ids.iter().cloned());

        if matches!(
            node.current_status,
            NodeStatus::Pending | NodeStatus::Skipped
        ) {
            let node = store.get_mut(&node_id).expect("node present");
            node.current_status = NodeStatus::Pruned;
            node.failure_reason = Some(format!("pruned due to ancestor failure: {}", failed_id));
            pruned.push(node_id);
        }
    }

    if !pruned.is_empty() {
        debug!(failed = failed_id, count = pruned.len(), "pruned descendants");
    }
    pruned
}

/// Splice a correction chain between a failed node and its former children.
///
/// The fragment is linked head-to-tail: the first node is parented under the
/// failed node, each subsequent node under the previous one. Children the
/// failed node had before the splice are re-parented onto the tail, so the
/// original continuation still runs after the correction. The failed node
/// keeps its `FAILED` status; the new chain is discovered on the next
/// scheduling pass because traversal descends through failed nodes.
pub fn inject_correction_plan(
    store: &mut GraphStore,
    failed_id: &str,
    fragment: Vec<ExecutionNode>,
) -> Result<Vec<String>> {
    if fragment.is_empty() {
        return Ok(Vec::new());
    }
    if store.get(failed_id).is_none() {
        return Err(Error::NodeNotFound(failed_id.to_string()));
    }

    let original_children: Vec<String> = store
        .all()
        .filter(|n| n.parent_id.as_deref() == Some(failed_id))
        .map(|n| n.node_id.clone())
        .collect();

    let mut previous_id = failed_id.to_string();
    let mut injected = Vec::with_capacity(fragment.len());
    for mut node in fragment {
        node.parent_id = Some(previous_id.clone());
        node.current_status = NodeStatus::Pending;
        node.failure_reason = None;
        previous_id = node.node_id.clone();
        injected.push(node.node_id.clone());
        store.add_node(node)?;
    }

    let tail_id = previous_id;
    for child_id in &original_children {
        store.set_parent(child_id, &tail_id)?;
        debug!(child = child_id.as_str(), tail = tail_id.as_str(), "re-parented original child");
    }

    info!(
        failed = failed_id,
        injected = injected.len(),
        "correction plan spliced"
    );
    Ok(injected)
}
