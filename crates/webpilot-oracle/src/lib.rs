//! Webpilot Oracle — planner collaborators
//!
//! The orchestrator asks a [`PlannerOracle`] for execution-node fragments:
//! once for the initial plan, and again for corrections when a node fails
//! with `RE_EVALUATE`. Ordinary planner failures (network, malformed output)
//! yield an empty fragment, never an error — the core treats emptiness as
//! "no plan available".

pub mod llm;
pub mod prompt;
pub mod scripted;

use async_trait::async_trait;
use webpilot_core::{ExecutionNode, FailureRecord, TaskGoal, WebObservation};

pub use llm::LlmPlanner;
pub use scripted::ScriptedPlanner;

#[async_trait]
pub trait PlannerOracle: Send + Sync {
    /// Produce a plan fragment for the goal.
    ///
    /// When planning from an empty graph the first returned node has no
    /// parent. Correction fragments may carry arbitrary parent ids; the
    /// splicer rewrites them.
    async fn generate(
        &self,
        goal: &TaskGoal,
        observation: Option<&WebObservation>,
        failure_history: &[FailureRecord],
    ) -> Vec<ExecutionNode>;
}
