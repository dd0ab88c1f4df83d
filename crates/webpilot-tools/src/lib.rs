//! Webpilot Tools — local tool handlers and the tool executor
//!
//! Each tool is a self-contained module implementing the Tool trait.
//! To add a tool: create the file, implement Tool, register it in
//! create_default_registry().

pub mod executor;
pub mod paths;
pub mod registry;
pub mod safety;
pub mod tools;

pub use executor::{RegistryExecutor, ToolExecutor};
pub use paths::ScratchArea;
pub use registry::{Tool, ToolRegistry};
pub use safety::{classify, ActionRisk};

use std::path::Path;

/// Create the default registry with the builtin filesystem tools, all rooted
/// at the given workspace's scratch area.
pub fn create_default_registry(workspace_root: impl AsRef<Path>) -> ToolRegistry {
    let scratch = ScratchArea::new(workspace_root.as_ref());
    let mut registry = ToolRegistry::new();

    registry.register(tools::fs::CreateDirectoryTool::new(scratch.clone()));
    registry.register(tools::fs::DeleteTool::new(scratch.clone()));
    registry.register(tools::fs::ListDirectoryTool::new(scratch.clone()));
    registry.register(tools::fs::ReadFileTool::new(scratch.clone()));
    registry.register(tools::fs::WriteFileTool::new(scratch));

    registry
}
