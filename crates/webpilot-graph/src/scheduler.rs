//! Priority-driven node selection.

use std::collections::{BTreeMap, HashSet, VecDeque};

use webpilot_core::{ExecutionNode, NodeStatus};

use crate::store::GraphStore;

/// Select the next node to execute, or `None` when no `PENDING` node is
/// reachable from the root.
///
/// The traversal visits every node exactly once and descends through every
/// node regardless of status: a correction chain spliced below a `FAILED`
/// node must be discoverable. Dependency semantics live entirely in the
/// parent/child placement; among the pending nodes the smallest
/// `execution_order_priority` wins, with insertion order as the tiebreak.
pub fn next_runnable(store: &GraphStore) -> Option<&ExecutionNode> {
    let root_id = store.root_id()?;

    let mut queue: VecDeque<&str> = VecDeque::from([root_id]);
    let mut visited: HashSet<&str> = HashSet::new();
    let mut best: Option<(i32, usize, &ExecutionNode)> = None;

    while let Some(node_id) = queue.pop_front() {
        if !visited.insert(node_id) {
            continue;
        }
        let Some(node) = store.get(node_id) else {
            continue;
        };

        if node.current_status == NodeStatus::Pending {
            let key = (
                node.execution_order_priority,
                store.insertion_index(node_id).unwrap_or(usize::MAX),
            );
            let better = match &best {
                Some((priority, idx, _)) => key < (*priority, *idx),
                None => true,
            };
            if better {
                best = Some((key.0, key.1, node));
            }
        }

        for child_id in &node.child_ids {
            queue.push_back(child_id.as_str());
        }
    }

    best.map(|(_, _, node)| node)
}

/// Node counts per status, for summaries.
pub fn count_by_status(store: &GraphStore) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for node in store.all() {
        let key = format!("{:?}", node.current_status).to_uppercase();
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}
