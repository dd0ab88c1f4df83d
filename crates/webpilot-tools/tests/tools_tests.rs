//! Tests for webpilot-tools: filesystem handlers, scratch resolution, and
//! the registry executor.

use serde_json::{json, Map, Value};
use webpilot_core::{codes, DecisionAction, FeedbackStatus};
use webpilot_tools::{create_default_registry, RegistryExecutor, ScratchArea, ToolExecutor, ToolRegistry};

fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

// ===========================================================================
// Scratch area
// ===========================================================================

#[test]
fn relative_paths_resolve_into_scratch() {
    let scratch = ScratchArea::new("/workspace");
    let resolved = scratch.resolve("reports/out.txt");
    assert_eq!(resolved, std::path::PathBuf::from("/workspace/scratch/reports/out.txt"));
    assert!(scratch.contains(&resolved));
}

#[test]
fn absolute_paths_pass_through() {
    let scratch = ScratchArea::new("/workspace");
    let resolved = scratch.resolve("/elsewhere/file.txt");
    assert_eq!(resolved, std::path::PathBuf::from("/elsewhere/file.txt"));
    assert!(!scratch.contains(&resolved));
}

// ===========================================================================
// Filesystem tools
// ===========================================================================

#[tokio::test]
async fn write_then_read_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_default_registry(dir.path());

    let write = registry
        .execute(
            "write_file_content",
            &args(json!({"path": "notes/hello.txt", "content": "first line\n"})),
        )
        .await;
    assert_eq!(write.status, FeedbackStatus::Success, "{}", write.message);

    let read = registry
        .execute("read_file_content", &args(json!({"path": "notes/hello.txt"})))
        .await;
    assert_eq!(read.status, FeedbackStatus::Success);
    assert_eq!(read.message, "first line\n");
}

#[tokio::test]
async fn append_preserves_existing_content() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_default_registry(dir.path());

    registry
        .execute(
            "write_file_content",
            &args(json!({"path": "log.txt", "content": "a"})),
        )
        .await;
    registry
        .execute(
            "write_file_content",
            &args(json!({"path": "log.txt", "content": "b", "append": true})),
        )
        .await;

    let read = registry
        .execute("read_file_content", &args(json!({"path": "log.txt"})))
        .await;
    assert_eq!(read.message, "ab");
}

#[tokio::test]
async fn create_and_list_directory() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_default_registry(dir.path());

    let created = registry
        .execute("create_directory", &args(json!({"path": "outputs"})))
        .await;
    assert_eq!(created.status, FeedbackStatus::Success);

    registry
        .execute(
            "write_file_content",
            &args(json!({"path": "outputs/a.txt", "content": "x"})),
        )
        .await;
    registry
        .execute(
            "write_file_content",
            &args(json!({"path": "outputs/.hidden", "content": "x"})),
        )
        .await;

    let listing = registry
        .execute("list_directory", &args(json!({"path": "outputs"})))
        .await;
    assert_eq!(listing.status, FeedbackStatus::Success);
    assert!(listing.message.contains("a.txt"));
    assert!(!listing.message.contains(".hidden"));

    let with_hidden = registry
        .execute(
            "list_directory",
            &args(json!({"path": "outputs", "show_hidden": true})),
        )
        .await;
    assert!(with_hidden.message.contains(".hidden"));
}

#[tokio::test]
async fn delete_file_and_recursive_directory() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_default_registry(dir.path());

    registry
        .execute(
            "write_file_content",
            &args(json!({"path": "tree/inner/leaf.txt", "content": "x"})),
        )
        .await;

    // A populated directory needs recursive=true.
    let refused = registry
        .execute("delete_file_or_directory", &args(json!({"path": "tree"})))
        .await;
    assert_eq!(refused.status, FeedbackStatus::Failed);

    let deleted = registry
        .execute(
            "delete_file_or_directory",
            &args(json!({"path": "tree", "recursive": true})),
        )
        .await;
    assert_eq!(deleted.status, FeedbackStatus::Success, "{}", deleted.message);

    let gone = registry
        .execute("delete_file_or_directory", &args(json!({"path": "tree"})))
        .await;
    assert_eq!(gone.error_code, "E_NOT_FOUND");
}

#[tokio::test]
async fn read_tolerates_invalid_utf8() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_default_registry(dir.path());

    let target = dir.path().join("scratch").join("mixed.txt");
    std::fs::create_dir_all(target.parent().unwrap()).unwrap();
    std::fs::write(&target, b"ok \xff\xfe still readable").unwrap();

    let read = registry
        .execute("read_file_content", &args(json!({"path": "mixed.txt"})))
        .await;
    assert_eq!(read.status, FeedbackStatus::Success, "{}", read.message);
    assert!(read.message.starts_with("ok "));
    assert!(read.message.ends_with("still readable"));
}

#[tokio::test]
async fn missing_path_argument_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_default_registry(dir.path());
    let feedback = registry
        .execute("read_file_content", &args(json!({})))
        .await;
    assert_eq!(feedback.error_code, "E_MISSING_ARG");
}

#[tokio::test]
async fn protected_directories_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let registry = create_default_registry(dir.path());
    let feedback = registry
        .execute(
            "write_file_content",
            &args(json!({"path": "/etc/webpilot.conf", "content": "x"})),
        )
        .await;
    assert_eq!(feedback.error_code, "E_PROTECTED_PATH");
}

// ===========================================================================
// Registry executor
// ===========================================================================

#[tokio::test]
async fn unknown_tool_becomes_failed_observation() {
    let executor = RegistryExecutor::new(ToolRegistry::new());
    let action = DecisionAction::new("no_such_tool");
    let obs = executor.execute(&action).await;
    assert!(!obs.is_success());
    assert_eq!(obs.http_status_code, 500);
    assert_eq!(obs.feedback().unwrap().error_code, codes::UNKNOWN_TOOL);
}

#[tokio::test]
async fn successful_execution_produces_success_observation() {
    let dir = tempfile::tempdir().unwrap();
    let executor = RegistryExecutor::new(create_default_registry(dir.path()));
    let action = DecisionAction::new("write_file_content")
        .with_arg("path", json!("out.txt"))
        .with_arg("content", json!("payload"));
    let obs = executor.execute(&action).await;
    assert!(obs.is_success());
    assert_eq!(obs.http_status_code, 200);
    assert!(obs.feedback().unwrap().message.contains("out.txt"));
}

#[tokio::test]
async fn slow_tool_times_out() {
    struct SlowTool;

    #[async_trait::async_trait]
    impl webpilot_tools::Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps past its budget"
        }
        async fn execute(&self, _args: &Map<String, Value>) -> webpilot_core::ActionFeedback {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            webpilot_core::ActionFeedback::success("never reached")
        }
    }

    let mut registry = ToolRegistry::new();
    registry.register(SlowTool);
    let executor = RegistryExecutor::new(registry);

    let mut action = DecisionAction::new("slow");
    action.execution_timeout_seconds = 1;
    let obs = executor.execute(&action).await;
    assert!(!obs.is_success());
    assert_eq!(obs.feedback().unwrap().error_code, codes::TOOL_TIMEOUT);
}

#[tokio::test]
async fn failing_tool_is_retried_up_to_max_attempts() {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyTool {
        calls: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl webpilot_tools::Tool for FlakyTool {
        fn name(&self) -> &str {
            "flaky"
        }
        fn description(&self) -> &str {
            "fails twice, then succeeds"
        }
        async fn execute(&self, _args: &Map<String, Value>) -> webpilot_core::ActionFeedback {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                webpilot_core::ActionFeedback::failure("E_SIM", "not yet")
            } else {
                webpilot_core::ActionFeedback::success("third time lucky")
            }
        }
    }

    let calls = Arc::new(AtomicU32::new(0));
    let mut registry = ToolRegistry::new();
    registry.register(FlakyTool {
        calls: calls.clone(),
    });
    let executor = RegistryExecutor::new(registry);

    let mut action = DecisionAction::new("flaky");
    action.max_attempts = 3;
    let obs = executor.execute(&action).await;
    assert!(obs.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
