//! Failure policy — what happens after a node fails.
//!
//! The graph mutations (pruning, splicing) live in webpilot-graph; this
//! module decides when to invoke them, keeps the failure history, and asks
//! the planner for corrections.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::warn;
use webpilot_core::{FailureRecord, NodeStatus, OnFailure, TaskGoal, WebObservation};
use webpilot_graph::{inject_correction_plan, prune_descendants, GraphStore};
use webpilot_oracle::PlannerOracle;

use crate::events::{EventBus, StatusLevel};

/// Whether the executor loop should keep scheduling after a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureOutcome {
    Stop,
    Continue,
}

/// Record a failed execution and decide how to proceed.
///
/// Marks the node FAILED, prunes its pending descendants, appends to the
/// failure history, and — for `RE_EVALUATE` — asks the oracle for a
/// correction fragment to splice below the failed node. `TRY_ALTERNATE` has
/// no distinct semantics yet and stops like `STOP_TASK`.
#[allow(clippy::too_many_arguments)]
pub async fn handle_failure(
    store: &Mutex<GraphStore>,
    node_id: &str,
    observation: WebObservation,
    goal: &TaskGoal,
    oracle: &dyn PlannerOracle,
    failure_history: &Mutex<Vec<FailureRecord>>,
    events: &EventBus,
    oracle_timeout: Duration,
) -> FailureOutcome {
    let error_message = observation
        .feedback()
        .map(|f| f.message.clone())
        .unwrap_or_else(|| "tool produced no feedback".to_string());

    // Record the failure and prune while holding the graph; the oracle call
    // below runs with the lock released so snapshots stay responsive.
    let (failed_tool, on_failure) = {
        let mut store = store.lock().await;
        let Some(node) = store.get_mut(node_id) else {
            return FailureOutcome::Stop;
        };
        node.last_observation = Some(observation.clone());
        node.current_status = NodeStatus::Failed;
        node.failure_reason = Some(error_message.clone());
        let failed_tool = node.action.tool_name.clone();
        let on_failure = node.action.on_failure_action;

        let pruned = prune_descendants(&mut store, node_id);
        for pruned_id in &pruned {
            events.log("warning", format!("node {} pruned after failure of {}", pruned_id, node_id));
        }

        (failed_tool, on_failure)
    };

    {
        let store = store.lock().await;
        let node = store.get(node_id).expect("failed node present");
        failure_history
            .lock()
            .await
            .push(FailureRecord::from_node(node, error_message.clone()));
    }

    events.status(
        StatusLevel::Error,
        format!("node {} failed: {}", node_id, error_message),
    );

    match on_failure {
        OnFailure::StopTask | OnFailure::TryAlternate => FailureOutcome::Stop,
        OnFailure::ReEvaluate => {
            events.status(
                StatusLevel::Warning,
                format!("re-planning after failure of {}", node_id),
            );

            let rewritten = goal.with_error_context(&failed_tool, &error_message);
            let history = failure_history.lock().await.clone();
            let fragment = match tokio::time::timeout(
                oracle_timeout,
                oracle.generate(&rewritten, Some(&observation), &history),
            )
            .await
            {
                Ok(fragment) => fragment,
                Err(_) => {
                    warn!(node = node_id, "planner timed out during correction");
                    Vec::new()
                }
            };

            if fragment.is_empty() {
                events.status(
                    StatusLevel::Warning,
                    "planner returned no correction; stopping task",
                );
                return FailureOutcome::Stop;
            }

            let mut store = store.lock().await;
            match inject_correction_plan(&mut store, node_id, fragment) {
                Ok(injected) => {
                    events.status(
                        StatusLevel::Info,
                        format!("spliced {} correction node(s) below {}", injected.len(), node_id),
                    );
                    FailureOutcome::Continue
                }
                Err(e) => {
                    events.status(
                        StatusLevel::Error,
                        format!("failed to splice correction plan: {}", e),
                    );
                    FailureOutcome::Stop
                }
            }
        }
    }
}
