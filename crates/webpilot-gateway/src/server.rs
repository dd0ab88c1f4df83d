//! Gateway server: task lifecycle endpoints plus the WebSocket event stream.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path as AxumPath, State, WebSocketUpgrade},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use webpilot_agent::{SessionConfig, SessionRegistry, TaskSession};
use webpilot_core::config::{ExecutionLimits, GatewayConfig, LlmConfig};
use webpilot_core::TaskGoal;
use webpilot_oracle::LlmPlanner;
use webpilot_tools::{create_default_registry, RegistryExecutor, ScratchArea};

use crate::ws::handle_connection;

pub struct GatewayOptions {
    pub gateway: GatewayConfig,
    pub llm: LlmConfig,
    pub workspace_root: PathBuf,
    pub limits: ExecutionLimits,
}

/// Shared state behind every handler.
pub struct GatewayState {
    pub sessions: Arc<SessionRegistry>,
    pub llm: LlmConfig,
    pub workspace_root: PathBuf,
    pub scratch: ScratchArea,
    pub limits: ExecutionLimits,
}

pub async fn start_gateway(options: GatewayOptions) -> anyhow::Result<()> {
    let scratch = ScratchArea::new(&options.workspace_root);
    scratch.ensure()?;

    let state = Arc::new(GatewayState {
        sessions: Arc::new(SessionRegistry::new()),
        llm: options.llm,
        workspace_root: options.workspace_root,
        scratch,
        limits: options.limits,
    });

    let app = router(state);

    let bind_addr: SocketAddr = format!(
        "{}:{}",
        options.gateway.bind.to_addr(),
        options.gateway.port
    )
    .parse()?;

    info!("Webpilot gateway v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: {}", bind_addr);
    info!("  WebSocket:    ws://{}/ws", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/tasks", post(create_task_handler).get(list_tasks_handler))
        .route("/tasks/:task_uuid", get(get_task_handler))
        .route("/tasks/:task_uuid/stop", post(stop_task_handler))
        .route("/tasks/:task_uuid/screenshot", get(screenshot_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct TaskCreateRequest {
    description: String,
    #[serde(default)]
    headless: bool,
}

async fn create_task_handler(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<TaskCreateRequest>,
) -> impl IntoResponse {
    let goal = TaskGoal::from_description(&request.description);
    info!(
        task = goal.task_uuid.as_str(),
        headless = request.headless,
        "creating task"
    );

    let oracle = Arc::new(LlmPlanner::new(state.llm.clone()));
    let tools = Arc::new(RegistryExecutor::new(create_default_registry(
        &state.workspace_root,
    )));
    let config = SessionConfig::new(state.scratch.clone()).with_limits(state.limits);

    // The API surface has nobody to answer prompts: dangerous actions are
    // rejected by the gate, storage writes proceed unconfirmed.
    let session = Arc::new(TaskSession::new(goal, oracle, tools, None, config));
    state.sessions.insert(session.clone());
    session.start().await;

    Json(session.snapshot().await)
}

async fn list_tasks_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let mut tasks = Vec::new();
    for session in state.sessions.list() {
        tasks.push(session.snapshot().await);
    }
    Json(serde_json::json!({ "tasks": tasks }))
}

async fn get_task_handler(
    State(state): State<Arc<GatewayState>>,
    AxumPath(task_uuid): AxumPath<String>,
) -> impl IntoResponse {
    match state.sessions.get(&task_uuid) {
        Some(session) => Json(session.snapshot().await).into_response(),
        None => (StatusCode::NOT_FOUND, "Task not found").into_response(),
    }
}

async fn stop_task_handler(
    State(state): State<Arc<GatewayState>>,
    AxumPath(task_uuid): AxumPath<String>,
) -> impl IntoResponse {
    match state.sessions.get(&task_uuid) {
        Some(session) => {
            session.stop();
            Json(serde_json::json!({ "message": "Task stopped" })).into_response()
        }
        None => (StatusCode::NOT_FOUND, "Task not found").into_response(),
    }
}

/// Serve the newest screenshot from the scratch area, uncached. Works after
/// the session has ended too: the executor leaves its final frame on disk.
async fn screenshot_handler(
    State(state): State<Arc<GatewayState>>,
    AxumPath(task_uuid): AxumPath<String>,
) -> impl IntoResponse {
    if state.sessions.get(&task_uuid).is_none() {
        return (StatusCode::NOT_FOUND, "Task not found").into_response();
    }

    let Some(path) = newest_screenshot(&state.scratch) else {
        return (StatusCode::NOT_FOUND, "Screenshot not available").into_response();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
                (header::PRAGMA, "no-cache"),
                (header::EXPIRES, "0"),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Screenshot not available").into_response(),
    }
}

fn newest_screenshot(scratch: &ScratchArea) -> Option<PathBuf> {
    let entries = std::fs::read_dir(scratch.screenshots_dir()).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("png"))
        .max_by_key(|path| {
            std::fs::metadata(path)
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        })
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}
