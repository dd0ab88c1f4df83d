//! Action risk classification.
//!
//! A pure function over (tool name, arguments): the confirmation gate uses
//! the result to decide whether an action may run unattended.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::paths::{is_protected, ScratchArea};

/// Risk class of a pending action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionRisk {
    /// Safe to dispatch immediately.
    Benign,
    /// Destructive or system-level; requires confirmation and is rejected
    /// outright when no confirmer is installed.
    Dangerous(String),
    /// Creates or overwrites a file/directory outside the scratch area;
    /// requires confirmation when a confirmer is installed.
    Storage(PathBuf),
}

/// Verbs that mark an action dangerous wherever they appear in arguments.
fn blocklist() -> &'static Regex {
    static BLOCKLIST: OnceLock<Regex> = OnceLock::new();
    BLOCKLIST.get_or_init(|| {
        Regex::new(
            r"(?i)rm\s+-rf\s+/|del\s+/f\s+/s\s+/q|rd\s+/s\s+/q|mkfs|dd\s+if=|shutdown|reboot|reg\s+(add|delete)|format\s+[a-z]:|:\(\)\{",
        )
        .expect("blocklist pattern is valid")
    })
}

const DELETE_TOOLS: &[&str] = &["delete_file_or_directory"];

const WRITE_TOOLS: &[&str] = &[
    "write_file_content",
    "create_directory",
    "download_page",
    "download_link",
];

fn path_arg(args: &Map<String, Value>) -> Option<&str> {
    args.get("path")
        .or_else(|| args.get("file_path"))
        .or_else(|| args.get("target_path"))
        .and_then(Value::as_str)
}

/// Classify an action by tool name and arguments.
pub fn classify(tool_name: &str, args: &Map<String, Value>, scratch: &ScratchArea) -> ActionRisk {
    let rendered = Value::Object(args.clone()).to_string();
    if let Some(found) = blocklist().find(&rendered) {
        return ActionRisk::Dangerous(format!(
            "arguments contain dangerous verb '{}'",
            found.as_str()
        ));
    }

    if DELETE_TOOLS.contains(&tool_name) {
        let Some(raw) = path_arg(args) else {
            return ActionRisk::Dangerous("delete with no target path".to_string());
        };
        let resolved = scratch.resolve(raw);
        if is_protected(&resolved) {
            return ActionRisk::Dangerous(format!(
                "delete inside protected system directory: {}",
                resolved.display()
            ));
        }
        if scratch.contains(&resolved) {
            return ActionRisk::Benign;
        }
        return ActionRisk::Dangerous(format!("delete outside scratch area: {}", resolved.display()));
    }

    if WRITE_TOOLS.contains(&tool_name) {
        if let Some(raw) = path_arg(args) {
            let resolved = scratch.resolve(raw);
            if is_protected(&resolved) {
                return ActionRisk::Dangerous(format!(
                    "write inside protected system directory: {}",
                    resolved.display()
                ));
            }
            if !scratch.contains(&resolved) {
                return ActionRisk::Storage(resolved);
            }
        }
    }

    ActionRisk::Benign
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(pairs: serde_json::Value) -> Map<String, Value> {
        pairs.as_object().cloned().unwrap_or_default()
    }

    fn scratch() -> ScratchArea {
        ScratchArea::new("/tmp/webpilot-ws")
    }

    #[test]
    fn read_is_benign() {
        let risk = classify("read_file_content", &args(json!({"path": "notes.txt"})), &scratch());
        assert_eq!(risk, ActionRisk::Benign);
    }

    #[test]
    fn delete_outside_scratch_is_dangerous() {
        let risk = classify(
            "delete_file_or_directory",
            &args(json!({"path": "/home/user/report.xlsx"})),
            &scratch(),
        );
        assert!(matches!(risk, ActionRisk::Dangerous(_)));
    }

    #[test]
    fn delete_inside_scratch_is_benign() {
        let risk = classify(
            "delete_file_or_directory",
            &args(json!({"path": "downloads/old.html"})),
            &scratch(),
        );
        assert_eq!(risk, ActionRisk::Benign);
    }

    #[test]
    fn write_outside_scratch_is_storage() {
        let risk = classify(
            "write_file_content",
            &args(json!({"path": "/home/user/out.txt", "content": "x"})),
            &scratch(),
        );
        assert!(matches!(risk, ActionRisk::Storage(_)));
    }

    #[test]
    fn write_inside_scratch_is_benign() {
        let risk = classify(
            "write_file_content",
            &args(json!({"path": "out.txt", "content": "x"})),
            &scratch(),
        );
        assert_eq!(risk, ActionRisk::Benign);
    }

    #[test]
    fn dangerous_verb_in_any_argument() {
        let risk = classify(
            "type_text",
            &args(json!({"text": "sudo reg delete HKLM\\Software"})),
            &scratch(),
        );
        assert!(matches!(risk, ActionRisk::Dangerous(_)));
    }

    #[test]
    fn system_verbs_blocked_even_without_path() {
        let risk = classify("type_text", &args(json!({"text": "shutdown now"})), &scratch());
        assert!(matches!(risk, ActionRisk::Dangerous(_)));
    }
}
