//! The tool executor boundary.
//!
//! The executor is the only component that blocks on I/O. Where a call is
//! routed (local filesystem handler, browser driver, OCR engine) is invisible
//! to the orchestrator: it hands over an action and gets an observation back,
//! always — handler panics and timeouts become FAILED feedback, never errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use webpilot_core::{codes, ActionFeedback, DecisionAction, WebObservation};

use crate::registry::ToolRegistry;

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run one action and observe the environment afterwards.
    async fn execute(&self, action: &DecisionAction) -> WebObservation;

    /// Release held resources. Called once, after the session's grace period.
    async fn close(&self) {}
}

/// Executor that routes actions to a local [`ToolRegistry`].
pub struct RegistryExecutor {
    registry: Arc<ToolRegistry>,
    current_url: String,
}

impl RegistryExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            current_url: "about:blank".to_string(),
        }
    }

    async fn run_attempt(&self, action: &DecisionAction, args: Map<String, Value>) -> ActionFeedback {
        let registry = self.registry.clone();
        let tool_name = action.tool_name.clone();
        let timeout = Duration::from_secs(action.execution_timeout_seconds.max(1));

        let handle = tokio::spawn(async move { registry.execute(&tool_name, &args).await });

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(feedback)) => feedback,
            Ok(Err(join_error)) => {
                warn!(tool = action.tool_name.as_str(), "tool handler aborted: {}", join_error);
                ActionFeedback::failure(
                    codes::SYSTEM_EXCEPTION,
                    format!("tool handler aborted unexpectedly: {}", join_error),
                )
            }
            Err(_) => ActionFeedback::failure(
                codes::TOOL_TIMEOUT,
                format!(
                    "tool '{}' exceeded its {}s timeout",
                    action.tool_name, action.execution_timeout_seconds
                ),
            ),
        }
    }
}

#[async_trait]
impl ToolExecutor for RegistryExecutor {
    async fn execute(&self, action: &DecisionAction) -> WebObservation {
        let args: Map<String, Value> = match action.args_json() {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let started = Instant::now();
        let attempts = action.max_attempts.max(1);
        let mut feedback =
            ActionFeedback::failure(codes::SYSTEM_EXCEPTION, "tool never dispatched");
        for attempt in 1..=attempts {
            feedback = self.run_attempt(action, args.clone()).await;
            if feedback.is_success() {
                break;
            }
            if attempt < attempts {
                debug!(
                    tool = action.tool_name.as_str(),
                    attempt, "attempt failed, retrying"
                );
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        WebObservation::from_feedback(self.current_url.clone(), feedback, elapsed_ms)
    }

    async fn close(&self) {
        debug!("registry executor closed");
    }
}
