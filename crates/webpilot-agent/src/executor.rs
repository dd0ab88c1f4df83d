//! The executor loop.
//!
//! One tick: select a runnable node, resolve its arguments, pass it through
//! the confirmation gate to the tool executor, record the outcome, publish
//! events. The loop is sequential — one node at a time — and bounded by a
//! hard tick cap that re-planning cannot lift. Cancellation is cooperative:
//! the flag is checked between ticks, an in-flight tool call completes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use webpilot_core::config::ExecutionLimits;
use webpilot_core::{codes, ExecutionNode, FailureRecord, NodeStatus, TaskGoal, WebObservation};
use webpilot_graph::{count_by_status, next_runnable, resolve_action, GraphStore};
use webpilot_oracle::PlannerOracle;
use webpilot_tools::ToolExecutor;

use crate::confirm::ConfirmationGate;
use crate::context::SharedContext;
use crate::events::{graph_snapshot, EventBus, NodeView, StatusLevel, TaskEvent, TaskSnapshot};
use crate::failure::{handle_failure, FailureOutcome};
use crate::session::SessionState;

pub struct TaskRuntime {
    goal: TaskGoal,
    store: Mutex<GraphStore>,
    oracle: Arc<dyn PlannerOracle>,
    tools: Arc<dyn ToolExecutor>,
    gate: ConfirmationGate,
    events: EventBus,
    shared: Mutex<SharedContext>,
    failures: Mutex<Vec<FailureRecord>>,
    limits: ExecutionLimits,
    cancel: CancellationToken,
    state: RwLock<SessionState>,
}

impl TaskRuntime {
    pub fn new(
        goal: TaskGoal,
        store: GraphStore,
        oracle: Arc<dyn PlannerOracle>,
        tools: Arc<dyn ToolExecutor>,
        gate: ConfirmationGate,
        limits: ExecutionLimits,
    ) -> Self {
        Self {
            goal,
            store: Mutex::new(store),
            oracle,
            tools,
            gate,
            events: EventBus::new(),
            shared: Mutex::new(SharedContext::default()),
            failures: Mutex::new(Vec::new()),
            limits,
            cancel: CancellationToken::new(),
            state: RwLock::new(SessionState::Idle),
        }
    }

    pub fn goal(&self) -> &TaskGoal {
        &self.goal
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Request cooperative cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn shared_value(&self, key: &str) -> Option<serde_json::Value> {
        self.shared.lock().await.get(key).cloned()
    }

    /// Deep copy of the session: goal, root, every node with its status,
    /// observation and captured output.
    pub async fn snapshot(&self) -> TaskSnapshot {
        let store = self.store.lock().await;
        let nodes: BTreeMap<String, ExecutionNode> = store
            .snapshot()
            .into_iter()
            .map(|n| (n.node_id.clone(), n))
            .collect();
        let root_node_id = store.root_id().map(String::from);
        drop(store);
        TaskSnapshot {
            task_uuid: self.goal.task_uuid.clone(),
            goal: self.goal.clone(),
            root_node_id,
            nodes,
            status: *self.state.read().await,
        }
    }

    /// Drive the plan to completion. Single-shot: one call per session.
    pub async fn run(self: Arc<Self>) {
        self.set_state(SessionState::Running).await;
        self.events.log(
            "info",
            format!("task started: {}", self.goal.target_description),
        );

        if !self.bootstrap_plan().await {
            self.finish(SessionState::Failed).await;
            return;
        }

        self.emit_graph("initial").await;
        self.emit_task_update().await;

        let mut ticks: u32 = 0;
        while !self.cancel.is_cancelled() {
            let Some(node_id) = self.select_next().await else {
                info!(task = self.goal.task_uuid.as_str(), "no runnable nodes left");
                break;
            };

            let outcome = self.execute_node(&node_id).await;
            ticks += 1;
            self.emit_graph(&format!("step_{:02}", ticks)).await;
            self.emit_task_update().await;

            if outcome == FailureOutcome::Stop {
                break;
            }
            if ticks >= self.limits.max_ticks {
                self.events.status(
                    StatusLevel::Warning,
                    format!("aborting: reached the {}-tick safety cap", self.limits.max_ticks),
                );
                break;
            }
        }

        let final_state = if self.cancel.is_cancelled() {
            SessionState::Stopped
        } else {
            SessionState::Completed
        };
        self.finish(final_state).await;
    }

    /// Generate the initial plan when the graph is empty. Returns false when
    /// the session cannot start.
    async fn bootstrap_plan(&self) -> bool {
        if !self.store.lock().await.is_empty() {
            return true; // preloaded plan
        }

        self.events
            .status(StatusLevel::Running, "generating initial plan");
        let oracle_timeout = Duration::from_secs(self.limits.oracle_timeout_secs);
        let fragment = match tokio::time::timeout(
            oracle_timeout,
            self.oracle.generate(&self.goal, None, &[]),
        )
        .await
        {
            Ok(fragment) => fragment,
            Err(_) => {
                warn!(task = self.goal.task_uuid.as_str(), "planner timed out during initial planning");
                Vec::new()
            }
        };

        if fragment.is_empty() {
            self.events.status(
                StatusLevel::Error,
                "initial plan is empty; nothing to execute",
            );
            return false;
        }

        let mut store = self.store.lock().await;
        for node in fragment {
            if let Err(e) = store.add_node(node) {
                self.events
                    .status(StatusLevel::Error, format!("rejected initial plan: {}", e));
                return false;
            }
        }
        true
    }

    /// Pick the next pending node and mark it RUNNING.
    async fn select_next(&self) -> Option<String> {
        let mut store = self.store.lock().await;
        let node_id = next_runnable(&store)?.node_id.clone();
        let node = store.get_mut(&node_id).expect("selected node present");
        node.current_status = NodeStatus::Running;
        let view = NodeView::from_node(node);
        let priority = node.execution_order_priority;
        drop(store);

        self.events.publish(TaskEvent::NodeUpdate { node: view });
        self.events.status(
            StatusLevel::Running,
            format!("executing node {} (priority {})", node_id, priority),
        );
        Some(node_id)
    }

    /// Resolve, gate, execute, and record one node.
    async fn execute_node(&self, node_id: &str) -> FailureOutcome {
        let resolved = {
            let store = self.store.lock().await;
            let node = store.get(node_id).expect("selected node present");
            resolve_action(&store, &node.action)
        };

        let action = match resolved {
            Ok(action) => {
                // The node carries the action it actually ran with.
                let mut store = self.store.lock().await;
                if let Some(node) = store.get_mut(node_id) {
                    node.action = action.clone();
                }
                action
            }
            Err(e) => {
                let observation = WebObservation::synthetic_failure(
                    codes::ARG_RESOLVE_ERROR,
                    e.to_string(),
                    500,
                );
                return self.handle_result(node_id, observation).await;
            }
        };

        let observation = self.gate.confirm_then_execute(&*self.tools, &action).await;
        self.handle_result(node_id, observation).await
    }

    /// Record an observation on the executed node and route failures through
    /// the failure policy.
    async fn handle_result(&self, node_id: &str, observation: WebObservation) -> FailureOutcome {
        let outcome = if observation.is_success() {
            let message = observation
                .feedback()
                .map(|f| f.message.clone())
                .unwrap_or_default();
            let tool_name = {
                let mut store = self.store.lock().await;
                let node = store.get_mut(node_id).expect("executed node present");
                node.last_observation = Some(observation);
                node.current_status = NodeStatus::Success;
                if !message.is_empty() {
                    node.resolved_output = Some(message.clone());
                }
                node.action.tool_name.clone()
            };
            self.shared
                .lock()
                .await
                .update_from_extraction(&tool_name, &message);
            self.events
                .log("info", format!("node {} succeeded", node_id));
            FailureOutcome::Continue
        } else {
            handle_failure(
                &self.store,
                node_id,
                observation,
                &self.goal,
                &*self.oracle,
                &self.failures,
                &self.events,
                Duration::from_secs(self.limits.oracle_timeout_secs),
            )
            .await
        };

        let view = {
            let store = self.store.lock().await;
            store.get(node_id).map(NodeView::from_node)
        };
        if let Some(node) = view {
            self.events.publish(TaskEvent::NodeUpdate { node });
        }
        outcome
    }

    async fn finish(&self, state: SessionState) {
        self.set_state(state).await;

        let counts = {
            let store = self.store.lock().await;
            count_by_status(&store)
        };
        let summary = if counts.is_empty() {
            "no nodes".to_string()
        } else {
            counts
                .iter()
                .map(|(status, n)| format!("{} {}", n, status))
                .collect::<Vec<_>>()
                .join(", ")
        };
        self.events.status(
            StatusLevel::Report,
            format!("task {} {}: {}", self.goal.task_uuid, state, summary),
        );
        let final_label = if state == SessionState::Failed {
            "final_failed"
        } else {
            "final"
        };
        self.emit_graph(final_label).await;
        self.emit_task_update().await;

        // Executor teardown is deferred so late observers can still fetch
        // the final screenshot.
        let tools = self.tools.clone();
        let grace = self.limits.close_grace_secs;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(grace)).await;
            tools.close().await;
        });
    }

    async fn set_state(&self, state: SessionState) {
        *self.state.write().await = state;
    }

    async fn emit_task_update(&self) {
        let task = self.snapshot().await;
        self.events.publish(TaskEvent::TaskUpdate { task });
    }

    async fn emit_graph(&self, label: &str) {
        let graph = {
            let store = self.store.lock().await;
            graph_snapshot(&store.snapshot(), store.root_id())
        };
        self.events.publish(TaskEvent::Visualization {
            label: label.to_string(),
            graph,
        });
    }
}
