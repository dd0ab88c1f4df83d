//! Tests for webpilot-graph: store invariants, scheduling, resolution,
//! pruning, splicing, and the persisted plan round trip.

use webpilot_core::{
    codes, ActionFeedback, ArgValue, DecisionAction, ExecutionNode, NodeStatus, WebObservation,
};
use webpilot_graph::{
    inject_correction_plan, next_runnable, populate, prune_descendants, resolve_action, GraphStore,
    PlanFile,
};

fn node(id: &str, parent: Option<&str>, priority: i32, tool: &str) -> ExecutionNode {
    ExecutionNode::new(
        id,
        parent.map(String::from),
        priority,
        DecisionAction::new(tool),
    )
}

fn mark_success(store: &mut GraphStore, id: &str, output: &str) {
    let n = store.get_mut(id).unwrap();
    n.last_observation = Some(WebObservation::from_feedback(
        "https://example.com",
        ActionFeedback::success(output),
        1,
    ));
    n.current_status = NodeStatus::Success;
    if !output.is_empty() {
        n.resolved_output = Some(output.to_string());
    }
}

fn mark_failed(store: &mut GraphStore, id: &str, reason: &str) {
    let n = store.get_mut(id).unwrap();
    n.last_observation = Some(WebObservation::from_feedback(
        "https://example.com",
        ActionFeedback::failure("E_SIM", reason),
        1,
    ));
    n.current_status = NodeStatus::Failed;
    n.failure_reason = Some(reason.to_string());
}

// ===========================================================================
// Graph store
// ===========================================================================

#[test]
fn add_node_rejects_duplicates() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "navigate_to")).unwrap();
    let err = store
        .add_node(node("N0", None, 1, "navigate_to"))
        .unwrap_err();
    assert!(matches!(err, webpilot_core::Error::DuplicateNode(_)));
}

#[test]
fn add_node_rejects_second_root() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "navigate_to")).unwrap();
    let err = store.add_node(node("N1", None, 1, "click_element")).unwrap_err();
    assert!(matches!(err, webpilot_core::Error::SecondRoot(_)));
}

#[test]
fn add_node_rejects_missing_parent() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "navigate_to")).unwrap();
    let err = store
        .add_node(node("N1", Some("ghost"), 1, "click_element"))
        .unwrap_err();
    assert!(matches!(err, webpilot_core::Error::MissingParent { .. }));
}

#[test]
fn cycle_attempt_rejected_at_add_node() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "navigate_to")).unwrap();
    store.add_node(node("N1", Some("N0"), 1, "click_element")).unwrap();
    // Re-adding N0 below its own descendant is rejected.
    let err = store
        .add_node(node("N0", Some("N1"), 1, "navigate_to"))
        .unwrap_err();
    assert!(matches!(err, webpilot_core::Error::DuplicateNode(_)));
    store.verify_invariants().unwrap();
}

#[test]
fn set_parent_rejects_cycles() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "a")).unwrap();
    store.add_node(node("N1", Some("N0"), 1, "b")).unwrap();
    store.add_node(node("N2", Some("N1"), 1, "c")).unwrap();
    let err = store.set_parent("N0", "N2").unwrap_err();
    assert!(matches!(err, webpilot_core::Error::CycleDetected { .. }));
}

#[test]
fn children_sorted_by_priority_with_insertion_tiebreak() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "root")).unwrap();
    store.add_node(node("A", Some("N0"), 20, "a")).unwrap();
    store.add_node(node("B", Some("N0"), 5, "b")).unwrap();
    store.add_node(node("C", Some("N0"), 5, "c")).unwrap();
    store.add_node(node("D", Some("N0"), 1, "d")).unwrap();

    let order: Vec<&str> = store
        .get("N0")
        .unwrap()
        .child_ids
        .iter()
        .map(String::as_str)
        .collect();
    // Ascending priority; B before C because B was inserted first.
    assert_eq!(order, vec!["D", "B", "C", "A"]);
    store.verify_invariants().unwrap();
}

#[test]
fn insertion_order_is_stable() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "root")).unwrap();
    store.add_node(node("Z", Some("N0"), 9, "z")).unwrap();
    store.add_node(node("A", Some("N0"), 1, "a")).unwrap();
    let order: Vec<&str> = store.insertion_order().collect();
    assert_eq!(order, vec!["N0", "Z", "A"]);
}

// ===========================================================================
// Scheduler
// ===========================================================================

#[test]
fn empty_graph_has_no_runnable_node() {
    let store = GraphStore::new();
    assert!(next_runnable(&store).is_none());
}

#[test]
fn scheduler_picks_lowest_priority_pending() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "root")).unwrap();
    mark_success(&mut store, "N0", "ok");
    store.add_node(node("N1", Some("N0"), 5, "a")).unwrap();
    store.add_node(node("N2", Some("N0"), 20, "b")).unwrap();

    assert_eq!(next_runnable(&store).unwrap().node_id, "N1");
}

#[test]
fn scheduler_breaks_priority_ties_by_insertion_order() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "root")).unwrap();
    mark_success(&mut store, "N0", "ok");
    store.add_node(node("FIRST", Some("N0"), 3, "a")).unwrap();
    store.add_node(node("SECOND", Some("N0"), 3, "b")).unwrap();

    // Same priority: the first-inserted node wins.
    assert_eq!(next_runnable(&store).unwrap().node_id, "FIRST");
}

#[test]
fn scheduler_descends_through_failed_nodes() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "root")).unwrap();
    mark_success(&mut store, "N0", "ok");
    store.add_node(node("N1", Some("N0"), 1, "flaky")).unwrap();
    mark_failed(&mut store, "N1", "boom");
    store.add_node(node("C1", Some("N1"), 1, "fix")).unwrap();

    // The correction below the failed node is discoverable.
    assert_eq!(next_runnable(&store).unwrap().node_id, "C1");
}

#[test]
fn scheduler_ignores_terminal_nodes() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "root")).unwrap();
    mark_success(&mut store, "N0", "ok");
    store.add_node(node("N1", Some("N0"), 1, "a")).unwrap();
    store.get_mut("N1").unwrap().current_status = NodeStatus::Pruned;
    assert!(next_runnable(&store).is_none());
}

// ===========================================================================
// Resolver
// ===========================================================================

#[test]
fn resolver_substitutes_successful_output() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "extract_data")).unwrap();
    mark_success(&mut store, "N0", "hello");

    let action = DecisionAction::new("type_text").with_result_ref("text", "N0");
    let resolved = resolve_action(&store, &action).unwrap();
    assert_eq!(
        resolved.tool_args.get("text"),
        Some(&ArgValue::Literal(serde_json::json!("hello")))
    );
    // The input action is untouched.
    assert_eq!(
        action.tool_args.get("text"),
        Some(&ArgValue::ResultOf("N0".to_string()))
    );
}

#[test]
fn resolver_rejects_missing_node() {
    let store = GraphStore::new();
    let action = DecisionAction::new("type_text").with_result_ref("text", "ghost");
    let err = resolve_action(&store, &action).unwrap_err();
    assert_eq!(err.reference, "ghost");
}

#[test]
fn resolver_rejects_unsuccessful_node() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "a")).unwrap();
    mark_failed(&mut store, "N0", "boom");

    let action = DecisionAction::new("type_text").with_result_ref("text", "N0");
    let err = resolve_action(&store, &action).unwrap_err();
    assert!(err.reason.contains("not SUCCESS"));
}

#[test]
fn resolver_rejects_missing_output() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "a")).unwrap();
    mark_success(&mut store, "N0", "");

    let action = DecisionAction::new("type_text").with_result_ref("text", "N0");
    let err = resolve_action(&store, &action).unwrap_err();
    assert!(err.reason.contains("no output"));
}

#[test]
fn resolver_leaves_literals_alone() {
    let store = GraphStore::new();
    let action = DecisionAction::new("type_text").with_arg("text", serde_json::json!("static"));
    let resolved = resolve_action(&store, &action).unwrap();
    assert_eq!(
        resolved.tool_args.get("text"),
        Some(&ArgValue::Literal(serde_json::json!("static")))
    );
}

// ===========================================================================
// Pruning
// ===========================================================================

#[test]
fn prune_cascades_over_pending_descendants() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "root")).unwrap();
    mark_success(&mut store, "N0", "ok");
    store.add_node(node("N1", Some("N0"), 1, "a")).unwrap();
    store.add_node(node("N2", Some("N1"), 1, "b")).unwrap();
    store.add_node(node("N3", Some("N2"), 1, "c")).unwrap();
    mark_failed(&mut store, "N1", "boom");

    let pruned = prune_descendants(&mut store, "N1");
    assert_eq!(pruned, vec!["N2".to_string(), "N3".to_string()]);
    assert_eq!(store.get("N2").unwrap().current_status, NodeStatus::Pruned);
    assert_eq!(store.get("N3").unwrap().current_status, NodeStatus::Pruned);
    assert!(store
        .get("N2")
        .unwrap()
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("N1"));
    // The ancestor chain above the failure is untouched.
    assert_eq!(store.get("N0").unwrap().current_status, NodeStatus::Success);
    store.verify_invariants().unwrap();
}

#[test]
fn prune_leaves_terminal_descendants_alone() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "root")).unwrap();
    store.add_node(node("N1", Some("N0"), 1, "a")).unwrap();
    store.add_node(node("N2", Some("N0"), 2, "b")).unwrap();
    mark_success(&mut store, "N1", "done");
    mark_failed(&mut store, "N0", "boom");

    let pruned = prune_descendants(&mut store, "N0");
    assert_eq!(pruned, vec!["N2".to_string()]);
    assert_eq!(store.get("N1").unwrap().current_status, NodeStatus::Success);
}

// ===========================================================================
// Correction splicing
// ===========================================================================

#[test]
fn splice_chains_fragment_and_reparents_tail() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "root")).unwrap();
    mark_success(&mut store, "N0", "ok");
    store.add_node(node("N1", Some("N0"), 1, "flaky")).unwrap();
    store.add_node(node("N2", Some("N1"), 1, "tail")).unwrap();
    mark_failed(&mut store, "N1", "boom");
    prune_descendants(&mut store, "N1");

    // Fragment parent ids are arbitrary; the splicer rewrites them.
    let fragment = vec![
        node("C1", Some("whatever"), 1, "fix_a"),
        node("C2", None, 1, "fix_b"),
    ];
    let injected = inject_correction_plan(&mut store, "N1", fragment).unwrap();
    assert_eq!(injected, vec!["C1".to_string(), "C2".to_string()]);

    assert_eq!(store.get("C1").unwrap().parent_id.as_deref(), Some("N1"));
    assert_eq!(store.get("C2").unwrap().parent_id.as_deref(), Some("C1"));
    // The failed node keeps its status; the original tail hangs off the
    // last correction node.
    assert_eq!(store.get("N1").unwrap().current_status, NodeStatus::Failed);
    assert_eq!(store.get("N2").unwrap().parent_id.as_deref(), Some("C2"));
    store.verify_invariants().unwrap();

    // The chain is discovered by the next scheduling pass.
    assert_eq!(next_runnable(&store).unwrap().node_id, "C1");
}

#[test]
fn splice_with_empty_fragment_is_a_no_op() {
    let mut store = GraphStore::new();
    store.add_node(node("N0", None, 1, "root")).unwrap();
    mark_failed(&mut store, "N0", "boom");
    let injected = inject_correction_plan(&mut store, "N0", Vec::new()).unwrap();
    assert!(injected.is_empty());
    assert_eq!(store.len(), 1);
}

#[test]
fn splice_requires_existing_failed_node() {
    let mut store = GraphStore::new();
    let err = inject_correction_plan(&mut store, "ghost", vec![node("C1", None, 1, "fix")])
        .unwrap_err();
    assert!(matches!(err, webpilot_core::Error::NodeNotFound(_)));
}

// ===========================================================================
// Plan round trip
// ===========================================================================

#[test]
fn plan_round_trip_preserves_order_and_first_selection() {
    let json = r#"{
        "execution_plan": [
            {"node_id": "N0", "execution_order_priority": 1,
             "action": {"tool_name": "navigate_to", "tool_args": {"url": "https://example.com"}}},
            {"node_id": "N1", "parent_id": "N0", "execution_order_priority": 5,
             "action": {"tool_name": "click_element"}},
            {"node_id": "N2", "parent_id": "N0", "execution_order_priority": 2,
             "action": {"tool_name": "type_text", "tool_args": {"text": "{result_of:N0}"}}}
        ]
    }"#;

    let mut first = GraphStore::new();
    populate(&mut first, PlanFile::parse(json).unwrap().execution_plan).unwrap();

    let dumped = PlanFile::dump(&first).to_json().unwrap();
    let mut second = GraphStore::new();
    populate(&mut second, PlanFile::parse(&dumped).unwrap().execution_plan).unwrap();

    let order_a: Vec<&str> = first.insertion_order().collect();
    let order_b: Vec<&str> = second.insertion_order().collect();
    assert_eq!(order_a, order_b);
    assert_eq!(
        next_runnable(&first).unwrap().node_id,
        next_runnable(&second).unwrap().node_id
    );

    // The placeholder survives the round trip as a typed reference.
    let n2 = second.get("N2").unwrap();
    assert_eq!(
        n2.action.tool_args.get("text"),
        Some(&ArgValue::ResultOf("N0".to_string()))
    );
}

#[test]
fn plan_defaults_missing_action_fields() {
    let json = r#"{"execution_plan": [{"node_id": "N0", "execution_order_priority": 1}]}"#;
    let nodes = PlanFile::parse(json).unwrap().execution_plan;
    assert_eq!(nodes[0].action.tool_name, "default_tool");
    assert_eq!(nodes[0].action.on_failure_action, webpilot_core::OnFailure::StopTask);
}

#[test]
fn plan_rejects_invalid_json() {
    assert!(PlanFile::parse("not json").is_err());
}

#[test]
fn plan_load_rejects_empty_plan() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.json");
    std::fs::write(&path, r#"{"execution_plan": []}"#).unwrap();
    let err = PlanFile::load(&path).unwrap_err();
    assert!(matches!(err, webpilot_core::Error::EmptyPlan));
}

#[test]
fn resolver_error_code_is_stable() {
    // The synthetic observation downstream uses this code; keep it pinned.
    assert_eq!(codes::ARG_RESOLVE_ERROR, "ARG_RESOLVE_ERROR");
}
