//! WebSocket wire protocol
//!
//! Client → Server:
//!   { "event": "join_task", "task_uuid": "TASK-1234" }
//!   { "event": "ping" }
//!
//! Server → Client (event push):
//!   { "event": "pong" }
//!   { "event": "task_update", "data": { "task": { ... } } }
//!   { "event": "node_update", "data": { "node": { ... } } }
//!   { "event": "status", "data": { "level": "INFO", "message": "..." } }

use serde::{Deserialize, Serialize};

/// Message sent by a WebSocket client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinTask { task_uuid: String },
    Ping,
}

/// Server-pushed event envelope.
#[derive(Debug, Clone, Serialize)]
pub struct EventMessage {
    pub event: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl EventMessage {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn pong() -> Self {
        Self::new("pong", serde_json::Value::Null)
    }
}
