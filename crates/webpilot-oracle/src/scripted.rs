//! Scripted planner: hands out queued fragments in order.
//!
//! Backs the CLI's plan-preload path (where no live planner is wanted) and
//! the orchestration tests. Once the queue is drained every further call
//! returns an empty fragment.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use webpilot_core::{ExecutionNode, FailureRecord, TaskGoal, WebObservation};

use crate::PlannerOracle;

#[derive(Default)]
pub struct ScriptedPlanner {
    fragments: Mutex<VecDeque<Vec<ExecutionNode>>>,
}

impl ScriptedPlanner {
    /// A planner that always answers with an empty fragment.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_fragments(fragments: impl IntoIterator<Item = Vec<ExecutionNode>>) -> Self {
        Self {
            fragments: Mutex::new(fragments.into_iter().collect()),
        }
    }

    pub fn push_fragment(&self, fragment: Vec<ExecutionNode>) {
        self.fragments
            .lock()
            .expect("fragment queue poisoned")
            .push_back(fragment);
    }
}

#[async_trait]
impl PlannerOracle for ScriptedPlanner {
    async fn generate(
        &self,
        _goal: &TaskGoal,
        _observation: Option<&WebObservation>,
        _failure_history: &[FailureRecord],
    ) -> Vec<ExecutionNode> {
        self.fragments
            .lock()
            .expect("fragment queue poisoned")
            .pop_front()
            .unwrap_or_default()
    }
}
