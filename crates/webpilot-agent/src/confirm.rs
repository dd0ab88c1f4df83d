//! Confirmation gate — the last check before a tool runs.
//!
//! Sits between the resolver and the tool executor. A cancellation is an
//! ordinary FAILED observation, so denials flow through the standard failure
//! path rather than a side channel.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};
use webpilot_core::{codes, DecisionAction, WebObservation};
use webpilot_tools::{classify, ActionRisk, ScratchArea, ToolExecutor};

/// Answers the question "may this action run?".
///
/// Synchronous and allowed to block (terminal prompt, remote approval);
/// the gate moves the call off the async worker before invoking it.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, tool_name: &str, reason: &str) -> bool;
}

pub struct ConfirmationGate {
    confirmer: Option<Arc<dyn Confirmer>>,
    scratch: ScratchArea,
}

impl ConfirmationGate {
    pub fn new(scratch: ScratchArea) -> Self {
        Self {
            confirmer: None,
            scratch,
        }
    }

    pub fn with_confirmer(scratch: ScratchArea, confirmer: Arc<dyn Confirmer>) -> Self {
        Self {
            confirmer: Some(confirmer),
            scratch,
        }
    }

    /// Classify the action, obtain confirmation if required, then dispatch.
    pub async fn confirm_then_execute(
        &self,
        executor: &dyn ToolExecutor,
        action: &DecisionAction,
    ) -> WebObservation {
        let args: Map<String, Value> = match action.args_json() {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        match classify(&action.tool_name, &args, &self.scratch) {
            ActionRisk::Benign => executor.execute(action).await,
            ActionRisk::Dangerous(reason) => match &self.confirmer {
                None => {
                    warn!(tool = action.tool_name.as_str(), "dangerous action with no confirmer: {}", reason);
                    WebObservation::synthetic_failure(
                        codes::NO_CONFIRM_CALLBACK,
                        format!("dangerous action rejected (no confirmer installed): {}", reason),
                        403,
                    )
                }
                Some(confirmer) => {
                    if self.ask(confirmer.clone(), &action.tool_name, &reason).await {
                        executor.execute(action).await
                    } else {
                        info!(tool = action.tool_name.as_str(), "user declined dangerous action");
                        WebObservation::synthetic_failure(
                            codes::USER_CANCELLED,
                            format!("user declined: {}", reason),
                            403,
                        )
                    }
                }
            },
            ActionRisk::Storage(path) => match &self.confirmer {
                // Storage writes proceed unconfirmed when nobody can answer.
                None => executor.execute(action).await,
                Some(confirmer) => {
                    let reason = format!("writes outside the scratch area: {}", path.display());
                    if self.ask(confirmer.clone(), &action.tool_name, &reason).await {
                        executor.execute(action).await
                    } else {
                        info!(tool = action.tool_name.as_str(), "user declined storage action");
                        WebObservation::synthetic_failure(
                            codes::USER_CANCELLED,
                            format!("user declined: {}", reason),
                            403,
                        )
                    }
                }
            },
        }
    }

    async fn ask(&self, confirmer: Arc<dyn Confirmer>, tool_name: &str, reason: &str) -> bool {
        let tool_name = tool_name.to_string();
        let reason = reason.to_string();
        tokio::task::spawn_blocking(move || confirmer.confirm(&tool_name, &reason))
            .await
            .unwrap_or(false)
    }
}
