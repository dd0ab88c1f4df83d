//! Session host — one execution as an addressable, cancellable unit.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;
use webpilot_core::config::ExecutionLimits;
use webpilot_core::{ExecutionNode, Result, TaskGoal};
use webpilot_graph::{populate, GraphStore};
use webpilot_oracle::PlannerOracle;
use webpilot_tools::{ScratchArea, ToolExecutor};

use crate::confirm::{ConfirmationGate, Confirmer};
use crate::events::{TaskEvent, TaskSnapshot};
use crate::executor::TaskRuntime;

/// Lifecycle of a session as a whole.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Stopped
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
            SessionState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Per-session wiring that is not a collaborator trait.
#[derive(Clone)]
pub struct SessionConfig {
    pub scratch: ScratchArea,
    pub limits: ExecutionLimits,
}

impl SessionConfig {
    pub fn new(scratch: ScratchArea) -> Self {
        Self {
            scratch,
            limits: ExecutionLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// One goal bound to one orchestrator instance.
pub struct TaskSession {
    runtime: Arc<TaskRuntime>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskSession {
    pub fn new(
        goal: TaskGoal,
        oracle: Arc<dyn PlannerOracle>,
        tools: Arc<dyn ToolExecutor>,
        confirmer: Option<Arc<dyn Confirmer>>,
        config: SessionConfig,
    ) -> Self {
        Self::build(goal, GraphStore::new(), oracle, tools, confirmer, config)
    }

    /// Session over a preloaded plan; the executor skips initial planning.
    pub fn with_plan(
        goal: TaskGoal,
        plan: Vec<ExecutionNode>,
        oracle: Arc<dyn PlannerOracle>,
        tools: Arc<dyn ToolExecutor>,
        confirmer: Option<Arc<dyn Confirmer>>,
        config: SessionConfig,
    ) -> Result<Self> {
        let mut store = GraphStore::new();
        populate(&mut store, plan)?;
        Ok(Self::build(goal, store, oracle, tools, confirmer, config))
    }

    fn build(
        goal: TaskGoal,
        store: GraphStore,
        oracle: Arc<dyn PlannerOracle>,
        tools: Arc<dyn ToolExecutor>,
        confirmer: Option<Arc<dyn Confirmer>>,
        config: SessionConfig,
    ) -> Self {
        let gate = match confirmer {
            Some(confirmer) => ConfirmationGate::with_confirmer(config.scratch.clone(), confirmer),
            None => ConfirmationGate::new(config.scratch.clone()),
        };
        let runtime = Arc::new(TaskRuntime::new(
            goal,
            store,
            oracle,
            tools,
            gate,
            config.limits,
        ));
        Self {
            runtime,
            handle: Mutex::new(None),
        }
    }

    pub fn task_uuid(&self) -> &str {
        &self.runtime.goal().task_uuid
    }

    /// Launch the executor loop on a background worker. Returns immediately;
    /// calling start on an already-started session is a no-op.
    pub async fn start(&self) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return;
        }
        info!(task = self.task_uuid(), "session started");
        let runtime = self.runtime.clone();
        *handle = Some(tokio::spawn(runtime.run()));
    }

    pub async fn snapshot(&self) -> TaskSnapshot {
        self.runtime.snapshot().await
    }

    pub async fn state(&self) -> SessionState {
        self.runtime.state().await
    }

    /// Request cooperative cancellation: the loop finishes its current tool
    /// call and exits before the next scheduling pass. Idempotent.
    pub fn stop(&self) {
        self.runtime.cancel();
    }

    /// Register an asynchronous subscriber; it receives every event
    /// published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.runtime.events().subscribe()
    }

    /// Await loop completion. Intended for the CLI and tests; the API polls
    /// snapshots instead.
    pub async fn wait(&self) {
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub async fn shared_value(&self, key: &str) -> Option<serde_json::Value> {
        self.runtime.shared_value(key).await
    }
}

/// All sessions known to this process, by task uuid.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<TaskSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<TaskSession>) {
        self.sessions
            .insert(session.task_uuid().to_string(), session);
    }

    pub fn get(&self, task_uuid: &str) -> Option<Arc<TaskSession>> {
        self.sessions.get(task_uuid).map(|s| s.clone())
    }

    pub fn list(&self) -> Vec<Arc<TaskSession>> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }

    pub fn remove(&self, task_uuid: &str) -> Option<Arc<TaskSession>> {
        self.sessions.remove(task_uuid).map(|(_, s)| s)
    }
}
