//! Runtime configuration, resolved from the environment with defaults.

use serde::{Deserialize, Serialize};

/// Planner LLM endpoint configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_request_timeout() -> u64 {
    90
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("WEBPILOT_LLM_BASE_URL").unwrap_or_else(|_| default_base_url()),
            api_key: std::env::var("WEBPILOT_LLM_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok(),
            model: std::env::var("WEBPILOT_LLM_MODEL").unwrap_or_else(|_| default_model()),
            request_timeout_secs: default_request_timeout(),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().map(|k| !k.is_empty()).unwrap_or(false)
    }
}

/// HTTP gateway configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub bind: BindMode,
}

fn default_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: BindMode::default(),
        }
    }
}

/// Bind mode for the gateway.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    #[default]
    Loopback,
    Lan,
}

impl BindMode {
    pub fn to_addr(&self) -> &str {
        match self {
            BindMode::Loopback => "127.0.0.1",
            BindMode::Lan => "0.0.0.0",
        }
    }
}

/// Safety caps on one execution.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Hard bound on scheduler iterations; re-planning does not lift it.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u32,
    /// Independent timeout on planner oracle calls.
    #[serde(default = "default_oracle_timeout")]
    pub oracle_timeout_secs: u64,
    /// Grace period before the tool executor is closed after the loop exits,
    /// so late observers can still fetch the final screenshot.
    #[serde(default = "default_close_grace")]
    pub close_grace_secs: u64,
}

fn default_max_ticks() -> u32 {
    50
}

fn default_oracle_timeout() -> u64 {
    90
}

fn default_close_grace() -> u64 {
    5
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
            oracle_timeout_secs: default_oracle_timeout(),
            close_grace_secs: default_close_grace(),
        }
    }
}
