//! Dynamic-argument resolution.
//!
//! Before a node is dispatched, every `{result_of:ID}` reference in its
//! action is replaced by the captured output of the referenced node. The
//! stored action is never mutated; the executor dispatches the resolved copy.

use webpilot_core::{ArgValue, DecisionAction, NodeStatus};

use crate::store::GraphStore;

/// Why a reference could not be resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveError {
    pub reference: String,
    pub reason: String,
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot resolve {{result_of:{}}}: {}",
            self.reference, self.reason
        )
    }
}

impl std::error::Error for ResolveError {}

/// Produce a copy of `action` with every `ResultOf` argument substituted by
/// the referenced node's `resolved_output`.
pub fn resolve_action(
    store: &GraphStore,
    action: &DecisionAction,
) -> Result<DecisionAction, ResolveError> {
    let mut resolved = action.clone();

    for value in resolved.tool_args.values_mut() {
        let ArgValue::ResultOf(node_id) = value else {
            continue;
        };
        let node_id = node_id.clone();

        let Some(node) = store.get(&node_id) else {
            return Err(ResolveError {
                reference: node_id,
                reason: "referenced node does not exist".to_string(),
            });
        };
        if node.current_status != NodeStatus::Success {
            return Err(ResolveError {
                reference: node_id,
                reason: format!(
                    "referenced node is {:?}, not SUCCESS",
                    node.current_status
                ),
            });
        }
        let Some(output) = &node.resolved_output else {
            return Err(ResolveError {
                reference: node_id,
                reason: "referenced node captured no output".to_string(),
            });
        };

        *value = ArgValue::Literal(serde_json::Value::String(output.clone()));
    }

    Ok(resolved)
}
