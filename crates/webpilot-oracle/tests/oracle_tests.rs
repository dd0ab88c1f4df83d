//! Tests for webpilot-oracle: prompt rendering and plan parsing.

use webpilot_core::{ActionFeedback, FailureRecord, TaskGoal, WebObservation};
use webpilot_oracle::llm::parse_plan_text;
use webpilot_oracle::prompt::{build_user_prompt, strip_code_fence};
use webpilot_oracle::{PlannerOracle, ScriptedPlanner};

fn goal() -> TaskGoal {
    TaskGoal::from_description("collect the latest release notes")
}

#[test]
fn prompt_carries_goal_and_tools() {
    let prompt = build_user_prompt(&goal(), None, &[]);
    assert!(prompt.contains("collect the latest release notes"));
    assert!(prompt.contains("navigate_to"));
}

#[test]
fn prompt_includes_observation_and_failures() {
    let observation = WebObservation::from_feedback(
        "https://example.com/releases",
        ActionFeedback::failure("E_TIMEOUT", "click timed out"),
        0,
    );
    let failures = vec![FailureRecord {
        node_id: "N3".to_string(),
        tool_name: "click_element".to_string(),
        tool_args: serde_json::json!({"selector": "#download"}),
        error_message: "click timed out".to_string(),
        reasoning: "download link is usually here".to_string(),
    }];

    let prompt = build_user_prompt(&goal(), Some(&observation), &failures);
    assert!(prompt.contains("https://example.com/releases"));
    assert!(prompt.contains("click timed out"));
    assert!(prompt.contains("do not repeat"));
    assert!(prompt.contains("N3"));
}

#[test]
fn code_fences_are_stripped() {
    assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    // A stray fence opening falls back to the raw text.
    assert_eq!(strip_code_fence("```{\"a\":1}"), "```{\"a\":1}");
}

#[test]
fn plan_text_parses_fenced_plan() {
    let reply = r#"```json
{"execution_plan": [
  {"node_id": "N0", "execution_order_priority": 1,
   "action": {"tool_name": "navigate_to", "tool_args": {"url": "https://example.com"}}}
]}
```"#;
    let nodes = parse_plan_text(reply).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].node_id, "N0");
    assert_eq!(nodes[0].action.tool_name, "navigate_to");
}

#[test]
fn plan_text_rejects_prose() {
    assert!(parse_plan_text("I could not produce a plan, sorry.").is_err());
}

#[test]
fn plan_text_rejects_empty_plan() {
    assert!(parse_plan_text(r#"{"execution_plan": []}"#).is_err());
}

#[tokio::test]
async fn scripted_planner_hands_out_fragments_in_order() {
    use webpilot_core::{DecisionAction, ExecutionNode};

    let first = vec![ExecutionNode::new(
        "A",
        None,
        1,
        DecisionAction::new("navigate_to"),
    )];
    let second = vec![ExecutionNode::new(
        "B",
        None,
        1,
        DecisionAction::new("click_element"),
    )];
    let planner = ScriptedPlanner::with_fragments([first, second]);

    let g = goal();
    assert_eq!(planner.generate(&g, None, &[]).await[0].node_id, "A");
    assert_eq!(planner.generate(&g, None, &[]).await[0].node_id, "B");
    // Drained: every further call is empty.
    assert!(planner.generate(&g, None, &[]).await.is_empty());
}
