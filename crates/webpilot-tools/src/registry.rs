//! Tool trait and registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use webpilot_core::{codes, ActionFeedback};

/// A local tool handler.
///
/// Tools receive the resolved arguments of an action and report back with
/// domain feedback: the message of a successful feedback becomes the node's
/// captured output.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name (e.g. "write_file_content").
    fn name(&self) -> &str;

    /// Human-readable description, used in planning prompts.
    fn description(&self) -> &str;

    /// Whether this tool only reads state (no side effects).
    fn is_read_only(&self) -> bool {
        false
    }

    async fn execute(&self, args: &Map<String, Value>) -> ActionFeedback;
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub async fn execute(&self, name: &str, args: &Map<String, Value>) -> ActionFeedback {
        match self.tools.get(name) {
            Some(tool) => tool.execute(args).await,
            None => ActionFeedback::failure(
                codes::UNKNOWN_TOOL,
                format!("no handler registered for tool '{}'", name),
            ),
        }
    }
}
