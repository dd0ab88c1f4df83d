//! Core types for Webpilot
//!
//! The data model of the execution graph: goals, actions, feedback,
//! observations, and the nodes that tie them together.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Stable error-code strings carried in [`ActionFeedback::error_code`].
pub mod codes {
    /// Success marker.
    pub const OK: &str = "0";
    /// A `{result_of:ID}` reference could not be resolved.
    pub const ARG_RESOLVE_ERROR: &str = "ARG_RESOLVE_ERROR";
    /// The confirmer declined a dangerous or storage action.
    pub const USER_CANCELLED: &str = "USER_CANCELLED";
    /// A dangerous action was requested but no confirmer is installed.
    pub const NO_CONFIRM_CALLBACK: &str = "NO_CONFIRM_CALLBACK";
    /// The tool executor failed unexpectedly (panic, poisoned handler).
    pub const SYSTEM_EXCEPTION: &str = "SYSTEM_EXCEPTION";
    /// The action named a tool no handler is registered for.
    pub const UNKNOWN_TOOL: &str = "UNKNOWN_TOOL";
    /// The tool ran past its configured timeout.
    pub const TOOL_TIMEOUT: &str = "E_TIMEOUT";
}

/// Tools a freshly synthesized [`TaskGoal`] is allowed to plan with.
pub const DEFAULT_ALLOWED_TOOLS: &[&str] = &[
    "navigate_to",
    "click_element",
    "type_text",
    "scroll",
    "wait",
    "extract_data",
    "get_element_attribute",
    "take_screenshot",
    "click_nth",
    "find_link_by_text",
    "download_page",
    "download_link",
    "create_directory",
    "delete_file_or_directory",
    "list_directory",
    "read_file_content",
    "write_file_content",
];

/// What the agent is trying to accomplish.
///
/// Immutable for the duration of one session; the re-planner builds a
/// shallow copy with a rewritten description when asking for corrections.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskGoal {
    pub task_uuid: String,
    pub target_description: String,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default = "default_priority_level")]
    pub priority_level: u8,
    #[serde(default = "default_max_execution_time")]
    pub max_execution_time_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_data: Option<serde_json::Value>,
}

fn default_priority_level() -> u8 {
    5
}

fn default_max_execution_time() -> u64 {
    180
}

impl TaskGoal {
    /// Build a goal from a free-form description with the standard defaults.
    pub fn from_description(description: impl Into<String>) -> Self {
        let short = uuid::Uuid::new_v4().to_string();
        Self {
            task_uuid: format!("TASK-{}", &short[..8]),
            target_description: description.into(),
            allowed_tools: DEFAULT_ALLOWED_TOOLS.iter().map(|s| s.to_string()).collect(),
            priority_level: default_priority_level(),
            max_execution_time_seconds: default_max_execution_time(),
            required_data: None,
        }
    }

    /// Copy of this goal whose description carries the failure context the
    /// planner needs to produce a correction.
    pub fn with_error_context(&self, failed_tool: &str, error_message: &str) -> Self {
        let mut goal = self.clone();
        goal.target_description = format!(
            "{} (previous attempt failed: tool '{}' reported: {})",
            self.target_description, failed_tool, error_message
        );
        goal
    }
}

/// One argument value of a [`DecisionAction`].
///
/// `{result_of:ID}` placeholders are recognized at ingestion and carried as
/// a typed reference instead of being re-parsed on every resolve. The wire
/// shape is unchanged: a `ResultOf` serializes back to the placeholder
/// string.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgValue {
    Literal(serde_json::Value),
    ResultOf(String),
}

impl ArgValue {
    /// Parse a string of the exact form `{result_of:ID}`; anything else is
    /// not a reference.
    pub fn parse_result_ref(s: &str) -> Option<&str> {
        let id = s.strip_prefix("{result_of:")?.strip_suffix('}')?;
        if id.is_empty() || id.contains('{') || id.contains('}') {
            return None;
        }
        Some(id)
    }

    pub fn as_literal(&self) -> Option<&serde_json::Value> {
        match self {
            ArgValue::Literal(v) => Some(v),
            ArgValue::ResultOf(_) => None,
        }
    }
}

impl Serialize for ArgValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ArgValue::Literal(v) => v.serialize(serializer),
            ArgValue::ResultOf(id) => format!("{{result_of:{}}}", id).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ArgValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        if let serde_json::Value::String(s) = &value {
            if let Some(id) = ArgValue::parse_result_ref(s) {
                return Ok(ArgValue::ResultOf(id.to_string()));
            }
        }
        Ok(ArgValue::Literal(value))
    }
}

/// What the agent should do when an action fails.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnFailure {
    ReEvaluate,
    #[default]
    #[serde(alias = "STOP")]
    StopTask,
    TryAlternate,
}

/// A single tool invocation the planner decided on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionAction {
    #[serde(default = "default_tool_name")]
    pub tool_name: String,
    #[serde(default)]
    pub tool_args: BTreeMap<String, ArgValue>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub expected_outcome: String,
    #[serde(default = "default_confidence")]
    pub confidence_score: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_timeout_seconds")]
    pub execution_timeout_seconds: u64,
    #[serde(default)]
    pub on_failure_action: OnFailure,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_condition_after: Option<String>,
}

fn default_tool_name() -> String {
    "default_tool".to_string()
}

fn default_confidence() -> f64 {
    0.95
}

fn default_max_attempts() -> u32 {
    1
}

fn default_timeout_seconds() -> u64 {
    10
}

impl Default for DecisionAction {
    fn default() -> Self {
        Self::new(default_tool_name())
    }
}

impl DecisionAction {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_args: BTreeMap::new(),
            reasoning: String::new(),
            expected_outcome: String::new(),
            confidence_score: default_confidence(),
            max_attempts: default_max_attempts(),
            execution_timeout_seconds: default_timeout_seconds(),
            on_failure_action: OnFailure::default(),
            wait_for_condition_after: None,
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.tool_args.insert(key.into(), ArgValue::Literal(value));
        self
    }

    pub fn with_result_ref(mut self, key: impl Into<String>, node_id: impl Into<String>) -> Self {
        self.tool_args
            .insert(key.into(), ArgValue::ResultOf(node_id.into()));
        self
    }

    pub fn with_on_failure(mut self, on_failure: OnFailure) -> Self {
        self.on_failure_action = on_failure;
        self
    }

    /// The arguments as plain JSON, placeholders rendered back to their wire
    /// form. Used for failure records and prompts.
    pub fn args_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.tool_args).unwrap_or(serde_json::Value::Null)
    }
}

/// Outcome of one tool invocation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackStatus {
    Success,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionFeedback {
    pub status: FeedbackStatus,
    pub error_code: String,
    pub message: String,
}

impl ActionFeedback {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: FeedbackStatus::Success,
            error_code: codes::OK.to_string(),
            message: message.into(),
        }
    }

    pub fn failure(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: FeedbackStatus::Failed,
            error_code: error_code.into(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FeedbackStatus::Success
    }
}

/// Bounding box of a page element, viewport coordinates.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

/// One interactive element visible after an action.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyElement {
    pub element_id: String,
    pub tag_name: String,
    pub xpath: String,
    pub inner_text: String,
    #[serde(default)]
    pub is_visible: bool,
    #[serde(default)]
    pub is_clickable: bool,
    #[serde(default)]
    pub bbox: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose_hint: Option<String>,
}

/// Environment snapshot taken immediately after an action.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebObservation {
    pub observation_timestamp_utc: String,
    pub current_url: String,
    pub http_status_code: u16,
    pub page_load_time_ms: u64,
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub key_elements: Vec<KeyElement>,
    pub last_action_feedback: Option<ActionFeedback>,
    #[serde(default)]
    pub memory_context: String,
}

impl WebObservation {
    /// Observation wrapping a real tool outcome.
    pub fn from_feedback(
        current_url: impl Into<String>,
        feedback: ActionFeedback,
        page_load_time_ms: u64,
    ) -> Self {
        let http_status_code = if feedback.is_success() { 200 } else { 500 };
        let memory_context = if feedback.is_success() {
            "Action succeeded.".to_string()
        } else {
            "Action failed due to error.".to_string()
        };
        Self {
            observation_timestamp_utc: chrono::Utc::now().to_rfc3339(),
            current_url: current_url.into(),
            http_status_code,
            page_load_time_ms,
            is_authenticated: false,
            key_elements: Vec::new(),
            last_action_feedback: Some(feedback),
            memory_context,
        }
    }

    /// Observation synthesized by the core itself (resolver failures,
    /// confirmation denials) — no tool ever ran.
    pub fn synthetic_failure(
        error_code: impl Into<String>,
        message: impl Into<String>,
        http_status_code: u16,
    ) -> Self {
        Self {
            observation_timestamp_utc: chrono::Utc::now().to_rfc3339(),
            current_url: "about:blank".to_string(),
            http_status_code,
            page_load_time_ms: 0,
            is_authenticated: false,
            key_elements: Vec::new(),
            last_action_feedback: Some(ActionFeedback::failure(error_code, message)),
            memory_context: "Action failed due to error.".to_string(),
        }
    }

    pub fn feedback(&self) -> Option<&ActionFeedback> {
        self.last_action_feedback.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.feedback().map(|f| f.is_success()).unwrap_or(false)
    }
}

/// Lifecycle state of a node in the execution graph.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
    Pruned,
    Skipped,
}

impl NodeStatus {
    /// Whether this state admits no further direct transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeStatus::Success | NodeStatus::Failed | NodeStatus::Pruned
        )
    }
}

/// One step of the dynamic execution graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionNode {
    pub node_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub child_ids: Vec<String>,
    #[serde(default = "default_node_priority")]
    pub execution_order_priority: i32,
    #[serde(default)]
    pub action: DecisionAction,
    #[serde(default)]
    pub current_status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default = "default_precondition")]
    pub required_precondition: String,
    #[serde(default = "default_cost_units")]
    pub expected_cost_units: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_observation: Option<WebObservation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_output: Option<String>,
}

fn default_node_priority() -> i32 {
    1
}

fn default_precondition() -> String {
    "true".to_string()
}

fn default_cost_units() -> u32 {
    1
}

impl ExecutionNode {
    pub fn new(
        node_id: impl Into<String>,
        parent_id: Option<String>,
        execution_order_priority: i32,
        action: DecisionAction,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            parent_id,
            child_ids: Vec::new(),
            execution_order_priority,
            action,
            current_status: NodeStatus::Pending,
            failure_reason: None,
            required_precondition: default_precondition(),
            expected_cost_units: default_cost_units(),
            last_observation: None,
            resolved_output: None,
        }
    }
}

/// One entry of the session's failure history, used to discourage the
/// planner from repeating a mistake.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FailureRecord {
    pub node_id: String,
    pub tool_name: String,
    pub tool_args: serde_json::Value,
    pub error_message: String,
    pub reasoning: String,
}

impl FailureRecord {
    pub fn from_node(node: &ExecutionNode, error_message: impl Into<String>) -> Self {
        Self {
            node_id: node.node_id.clone(),
            tool_name: node.action.tool_name.clone(),
            tool_args: node.action.args_json(),
            error_message: error_message.into(),
            reasoning: node.action.reasoning.clone(),
        }
    }
}
