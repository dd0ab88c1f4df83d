//! Webpilot CLI — run a task from the terminal or serve the HTTP API.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use webpilot_agent::{
    Confirmer, SessionConfig, SessionState, StatusLevel, TaskEvent, TaskSession,
};
use webpilot_core::config::{BindMode, ExecutionLimits, GatewayConfig, LlmConfig};
use webpilot_core::TaskGoal;
use webpilot_gateway::{start_gateway, GatewayOptions};
use webpilot_graph::PlanFile;
use webpilot_oracle::{LlmPlanner, PlannerOracle, ScriptedPlanner};
use webpilot_tools::{create_default_registry, RegistryExecutor, ScratchArea};

#[derive(Parser)]
#[command(name = "webpilot", about = "LLM-driven web automation agent", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a task described in natural language
    Run {
        /// What the agent should accomplish
        description: String,
        /// Execute a persisted plan file instead of asking the planner
        #[arg(long)]
        plan: Option<PathBuf>,
        /// Approve every confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Serve the HTTP + WebSocket API
    Serve {
        #[arg(long, default_value_t = 8000)]
        port: u16,
        /// Bind on all interfaces instead of loopback
        #[arg(long)]
        lan: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("WEBPILOT_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Run {
            description,
            plan,
            yes,
        } => run_task(description, plan, yes).await,
        Command::Serve { port, lan } => {
            let options = GatewayOptions {
                gateway: GatewayConfig {
                    port,
                    bind: if lan { BindMode::Lan } else { BindMode::Loopback },
                },
                llm: LlmConfig::from_env(),
                workspace_root: std::env::current_dir()?,
                limits: ExecutionLimits::default(),
            };
            start_gateway(options).await
        }
    }
}

async fn run_task(description: String, plan: Option<PathBuf>, yes: bool) -> anyhow::Result<()> {
    let llm = LlmConfig::from_env();
    if plan.is_none() && !llm.has_credentials() {
        anyhow::bail!(
            "no planner credentials (set WEBPILOT_LLM_API_KEY or OPENAI_API_KEY) and no --plan file"
        );
    }

    let workspace_root = std::env::current_dir()?;
    let scratch = ScratchArea::new(&workspace_root);
    scratch.ensure().context("failed to create scratch area")?;

    let oracle: Arc<dyn PlannerOracle> = if llm.has_credentials() {
        Arc::new(LlmPlanner::new(llm))
    } else {
        Arc::new(ScriptedPlanner::empty())
    };
    let tools = Arc::new(RegistryExecutor::new(create_default_registry(
        &workspace_root,
    )));
    let confirmer: Arc<dyn Confirmer> = if yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(StdinConfirmer)
    };
    let config = SessionConfig::new(scratch);

    let goal = TaskGoal::from_description(&description);
    let session = match plan {
        Some(path) => {
            let nodes =
                PlanFile::load(&path).with_context(|| format!("failed to load {}", path.display()))?;
            println!("Loaded plan with {} node(s) from {}", nodes.len(), path.display());
            TaskSession::with_plan(goal, nodes, oracle, tools, Some(confirmer), config)?
        }
        None => TaskSession::new(goal, oracle, tools, Some(confirmer), config),
    };

    println!("Task {}: {}", session.task_uuid(), description);

    let mut rx = session.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            render_event(&event);
        }
    });

    session.start().await;
    session.wait().await;

    // Give the printer a moment to drain buffered events.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    printer.abort();

    let state = session.state().await;
    println!("Session finished: {}", state);
    if state == SessionState::Failed {
        anyhow::bail!("task failed");
    }
    Ok(())
}

fn render_event(event: &TaskEvent) {
    match event {
        TaskEvent::Status { level, message } => {
            let tag = match level {
                StatusLevel::Info => "INFO",
                StatusLevel::Warning => "WARN",
                StatusLevel::Error => "ERROR",
                StatusLevel::Success => "OK",
                StatusLevel::Report => "REPORT",
                StatusLevel::Running => "RUN",
            };
            println!("[{}] {}", tag, message);
        }
        TaskEvent::NodeUpdate { node } => {
            let detail = node
                .error
                .as_deref()
                .or(node.result.as_deref())
                .unwrap_or_default();
            println!(
                "  node {} -> {:?} ({}) {}",
                node.id,
                node.status,
                node.tool,
                truncate(detail, 80)
            );
        }
        TaskEvent::Log {
            timestamp,
            level,
            message,
            ..
        } => println!("  {} [{}] {}", timestamp, level, message),
        // Full snapshots and graph renders are for API observers.
        TaskEvent::TaskUpdate { .. } | TaskEvent::Visualization { .. } => {}
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Interactive confirmer reading y/N from stdin.
struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm(&self, tool_name: &str, reason: &str) -> bool {
        eprint!("{} requires confirmation: {}\nProceed? [y/N] ", tool_name, reason);
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// Confirmer that approves everything (`--yes`).
struct AutoApprove;

impl Confirmer for AutoApprove {
    fn confirm(&self, tool_name: &str, reason: &str) -> bool {
        tracing::info!(tool = tool_name, "auto-approved: {}", reason);
        true
    }
}
