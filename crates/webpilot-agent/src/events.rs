//! Event bus — state-change fanout to asynchronous subscribers.
//!
//! The executor loop publishes into a bounded broadcast channel and never
//! waits for consumers: a subscriber that cannot keep up loses the oldest
//! events instead of backpressuring the loop. Per subscriber, delivery order
//! equals publish order.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::broadcast;
use webpilot_core::{EventMessage, ExecutionNode, NodeStatus, TaskGoal};

use crate::session::SessionState;

const EVENT_BUFFER: usize = 1024;

/// Severity of a `status` event.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
    Success,
    Report,
    Running,
}

/// Full session snapshot, as carried by `task_update` events and the API.
#[derive(Clone, Debug, Serialize)]
pub struct TaskSnapshot {
    pub task_uuid: String,
    pub goal: TaskGoal,
    pub root_node_id: Option<String>,
    pub nodes: BTreeMap<String, ExecutionNode>,
    pub status: SessionState,
}

/// Condensed single-node view for `node_update` events.
#[derive(Clone, Debug, Serialize)]
pub struct NodeView {
    pub id: String,
    pub status: NodeStatus,
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeView {
    pub fn from_node(node: &ExecutionNode) -> Self {
        Self {
            id: node.node_id.clone(),
            status: node.current_status,
            tool: node.action.tool_name.clone(),
            url: node
                .last_observation
                .as_ref()
                .map(|o| o.current_url.clone()),
            result: node.resolved_output.clone(),
            error: node.failure_reason.clone(),
        }
    }
}

/// One published state change.
#[derive(Clone, Debug)]
pub enum TaskEvent {
    TaskUpdate {
        task: TaskSnapshot,
    },
    NodeUpdate {
        node: NodeView,
    },
    Status {
        level: StatusLevel,
        message: String,
    },
    Visualization {
        label: String,
        graph: serde_json::Value,
    },
    Log {
        id: String,
        timestamp: String,
        level: String,
        message: String,
    },
}

impl TaskEvent {
    /// Render to the wire envelope used by the WebSocket surface.
    pub fn to_message(&self) -> EventMessage {
        match self {
            TaskEvent::TaskUpdate { task } => EventMessage::new(
                "task_update",
                serde_json::json!({ "task": task }),
            ),
            TaskEvent::NodeUpdate { node } => {
                EventMessage::new("node_update", serde_json::json!({ "node": node }))
            }
            TaskEvent::Status { level, message } => EventMessage::new(
                "status",
                serde_json::json!({ "level": level, "message": message }),
            ),
            TaskEvent::Visualization { label, graph } => EventMessage::new(
                "visualization",
                serde_json::json!({ "label": label, "graph": graph }),
            ),
            TaskEvent::Log {
                id,
                timestamp,
                level,
                message,
            } => EventMessage::new(
                "log",
                serde_json::json!({
                    "id": id,
                    "timestamp": timestamp,
                    "level": level,
                    "message": message,
                }),
            ),
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TaskEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    /// Publish an event to all current subscribers. A send with no
    /// subscribers is not an error.
    pub fn publish(&self, event: TaskEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }

    pub fn status(&self, level: StatusLevel, message: impl Into<String>) {
        self.publish(TaskEvent::Status {
            level,
            message: message.into(),
        });
    }

    pub fn log(&self, level: &str, message: impl Into<String>) {
        self.publish(TaskEvent::Log {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: level.to_string(),
            message: message.into(),
        });
    }
}

/// Serialize a graph for `visualization` events: the nodes with their
/// statuses, plus the parent→child edges. The exact shape is opaque to the
/// orchestrator; renderers draw whatever they find here.
pub fn graph_snapshot(nodes: &[ExecutionNode], root_id: Option<&str>) -> serde_json::Value {
    let node_views: Vec<serde_json::Value> = nodes
        .iter()
        .map(|n| {
            serde_json::json!({
                "id": n.node_id,
                "status": n.current_status,
                "tool": n.action.tool_name,
                "priority": n.execution_order_priority,
                "parent": n.parent_id,
            })
        })
        .collect();
    let edges: Vec<serde_json::Value> = nodes
        .iter()
        .filter_map(|n| {
            n.parent_id
                .as_ref()
                .map(|p| serde_json::json!({ "from": p, "to": n.node_id }))
        })
        .collect();
    serde_json::json!({
        "root": root_id,
        "nodes": node_views,
        "edges": edges,
    })
}
