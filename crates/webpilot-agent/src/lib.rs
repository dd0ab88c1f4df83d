//! Webpilot Agent — the execution orchestrator
//!
//! One session binds a task goal to a graph, a planner oracle, a tool
//! executor, and an event bus, and drives the plan to completion on a
//! dedicated worker task.

pub mod confirm;
pub mod context;
pub mod events;
pub mod executor;
pub mod failure;
pub mod session;

pub use confirm::{ConfirmationGate, Confirmer};
pub use context::{SharedContext, LAST_EXTRACTED_ITEMS};
pub use events::{EventBus, NodeView, StatusLevel, TaskEvent, TaskSnapshot};
pub use executor::TaskRuntime;
pub use failure::FailureOutcome;
pub use session::{SessionConfig, SessionRegistry, SessionState, TaskSession};
