//! LLM-backed planner over an OpenAI-compatible chat-completions endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use webpilot_core::config::LlmConfig;
use webpilot_core::{ExecutionNode, FailureRecord, TaskGoal, WebObservation};
use webpilot_graph::PlanFile;

use crate::prompt::{build_user_prompt, strip_code_fence, SYSTEM_PROMPT};
use crate::PlannerOracle;

pub struct LlmPlanner {
    client: Client,
    config: LlmConfig,
}

impl LlmPlanner {
    pub fn new(config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn request_plan_text(&self, user_prompt: String) -> Result<String, String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| "no API key configured".to_string())?;

        let body = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt,
                },
            ],
            temperature: 0.2,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!(model = body.model.as_str(), "requesting plan");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("planner endpoint returned {}: {}", status, text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| format!("malformed completion payload: {}", e))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| "completion carried no choices".to_string())
    }
}

/// Parse the model's reply into execution nodes. Accepts the bare plan
/// object, optionally wrapped in a Markdown code fence.
pub fn parse_plan_text(text: &str) -> Result<Vec<ExecutionNode>, String> {
    let body = strip_code_fence(text);
    let plan = PlanFile::parse(body).map_err(|e| e.to_string())?;
    if plan.execution_plan.is_empty() {
        return Err("plan contained no nodes".to_string());
    }
    Ok(plan.execution_plan)
}

#[async_trait]
impl PlannerOracle for LlmPlanner {
    async fn generate(
        &self,
        goal: &TaskGoal,
        observation: Option<&WebObservation>,
        failure_history: &[FailureRecord],
    ) -> Vec<ExecutionNode> {
        let user_prompt = build_user_prompt(goal, observation, failure_history);
        let text = match self.request_plan_text(user_prompt).await {
            Ok(text) => text,
            Err(reason) => {
                warn!(task = goal.task_uuid.as_str(), "planner call failed: {}", reason);
                return Vec::new();
            }
        };

        match parse_plan_text(&text) {
            Ok(nodes) => {
                debug!(task = goal.task_uuid.as_str(), nodes = nodes.len(), "plan received");
                nodes
            }
            Err(reason) => {
                warn!(task = goal.task_uuid.as_str(), "unusable plan: {}", reason);
                Vec::new()
            }
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Deserialize)]
struct ChatReplyMessage {
    content: String,
}
