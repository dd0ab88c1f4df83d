//! Error types for Webpilot

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("duplicate node: {0}")]
    DuplicateNode(String),

    #[error("second root: {0} (root already set)")]
    SecondRoot(String),

    #[error("missing parent {parent} for node {node}")]
    MissingParent { node: String, parent: String },

    #[error("cycle detected: {child} cannot be parented under {parent}")]
    CycleDetected { child: String, parent: String },

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("empty plan")]
    EmptyPlan,

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("plan file error: {0}")]
    PlanFile(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn plan_file(message: impl Into<String>) -> Self {
        Self::PlanFile(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
