//! Planning prompt construction.

use webpilot_core::{FailureRecord, TaskGoal, WebObservation};

pub const SYSTEM_PROMPT: &str = "\
You are the planning engine of a web automation agent. Given a task goal, \
produce an execution plan as a JSON object of the form \
{\"execution_plan\": [node, ...]}. Each node has: node_id (string, unique), \
parent_id (null for the first node, otherwise an existing node_id), \
execution_order_priority (integer, lower runs first), and action with \
tool_name, tool_args, reasoning, expected_outcome, confidence_score, \
max_attempts, execution_timeout_seconds, and on_failure_action \
(RE_EVALUATE, STOP_TASK or TRY_ALTERNATE). A string argument of the form \
{result_of:NODE_ID} is replaced at runtime by the captured output of that \
node. Use only the allowed tools. Respond with the JSON object and nothing \
else.";

/// Render the user message for one planning request.
pub fn build_user_prompt(
    goal: &TaskGoal,
    observation: Option<&WebObservation>,
    failure_history: &[FailureRecord],
) -> String {
    let mut prompt = format!(
        "Task: {}\nAllowed tools: {}\nPriority level: {}\nTime budget: {}s\n",
        goal.target_description,
        goal.allowed_tools.join(", "),
        goal.priority_level,
        goal.max_execution_time_seconds,
    );

    if let Some(obs) = observation {
        prompt.push_str(&format!(
            "\nCurrent page: {} (HTTP {})\n",
            obs.current_url, obs.http_status_code
        ));
        if let Some(feedback) = obs.feedback() {
            prompt.push_str(&format!(
                "Last action: {:?} [{}] {}\n",
                feedback.status, feedback.error_code, feedback.message
            ));
        }
        if !obs.key_elements.is_empty() {
            prompt.push_str("Visible elements:\n");
            for element in obs.key_elements.iter().take(20) {
                prompt.push_str(&format!(
                    "  - <{}> {} ({})\n",
                    element.tag_name, element.inner_text, element.xpath
                ));
            }
        }
    }

    if !failure_history.is_empty() {
        prompt.push_str("\nEarlier attempts that failed (do not repeat them):\n");
        for record in failure_history {
            prompt.push_str(&format!(
                "  - node {} called {} with {} and got: {}\n",
                record.node_id, record.tool_name, record.tool_args, record.error_message
            ));
        }
    }

    prompt
}

/// Strip a Markdown code fence if the model wrapped its JSON in one.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    rest.strip_suffix("```").map(str::trim).unwrap_or(trimmed)
}
