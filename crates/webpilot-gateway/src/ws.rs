//! WebSocket connection handling.
//!
//! A client joins one task's event stream with `{"event":"join_task",
//! "task_uuid":"..."}` and then receives every event the session publishes,
//! in publish order. `{"event":"ping"}` is answered with `{"event":"pong"}`.
//! A client that lags behind the bounded event buffer loses the oldest
//! events; the loop never waits for it.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{info, warn};
use webpilot_agent::TaskEvent;
use webpilot_core::{ClientMessage, EventMessage};

use crate::server::GatewayState;

pub async fn handle_connection(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subscription: Option<broadcast::Receiver<TaskEvent>> = None;

    loop {
        // The subscription is borrowed only while waiting; every step
        // resolves to an owned value before it is applied.
        let step = if let Some(rx) = subscription.as_mut() {
            tokio::select! {
                msg = ws_rx.next() => {
                    LoopStep::Client(handle_socket_message(msg, &state, &mut ws_tx).await)
                }
                event = rx.recv() => LoopStep::Event(event),
            }
        } else {
            let msg = ws_rx.next().await;
            LoopStep::Client(handle_socket_message(msg, &state, &mut ws_tx).await)
        };

        match step {
            LoopStep::Client(SocketOutcome::Continue) => {}
            LoopStep::Client(SocketOutcome::Subscribed(rx)) => subscription = Some(rx),
            LoopStep::Client(SocketOutcome::Disconnect) => return,
            LoopStep::Event(Ok(event)) => {
                if send_event(&mut ws_tx, &event.to_message()).await.is_err() {
                    return;
                }
            }
            LoopStep::Event(Err(broadcast::error::RecvError::Lagged(n))) => {
                warn!("client lagged, dropped {} events", n);
            }
            LoopStep::Event(Err(broadcast::error::RecvError::Closed)) => {
                subscription = None;
            }
        }
    }
}

enum LoopStep {
    Client(SocketOutcome),
    Event(Result<TaskEvent, broadcast::error::RecvError>),
}

enum SocketOutcome {
    Continue,
    Subscribed(broadcast::Receiver<TaskEvent>),
    Disconnect,
}

async fn handle_socket_message(
    msg: Option<Result<WsMessage, axum::Error>>,
    state: &Arc<GatewayState>,
    ws_tx: &mut (impl futures::Sink<WsMessage, Error = axum::Error> + Unpin),
) -> SocketOutcome {
    match msg {
        Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::JoinTask { task_uuid }) => {
                let Some(session) = state.sessions.get(&task_uuid) else {
                    let event = EventMessage::new(
                        "status",
                        serde_json::json!({
                            "level": "ERROR",
                            "message": format!("task not found: {}", task_uuid),
                        }),
                    );
                    let _ = send_event(ws_tx, &event).await;
                    return SocketOutcome::Continue;
                };

                info!(task = task_uuid.as_str(), "client joined task stream");
                let rx = session.subscribe();
                // Current state first, then the live stream.
                let snapshot = session.snapshot().await;
                let event =
                    EventMessage::new("task_update", serde_json::json!({ "task": snapshot }));
                if send_event(ws_tx, &event).await.is_err() {
                    return SocketOutcome::Disconnect;
                }
                SocketOutcome::Subscribed(rx)
            }
            Ok(ClientMessage::Ping) => {
                if send_event(ws_tx, &EventMessage::pong()).await.is_err() {
                    return SocketOutcome::Disconnect;
                }
                SocketOutcome::Continue
            }
            Err(_) => {
                warn!("unparseable message: {}", &text[..text.len().min(100)]);
                SocketOutcome::Continue
            }
        },
        Some(Ok(WsMessage::Close(_))) => {
            info!("client disconnected");
            SocketOutcome::Disconnect
        }
        Some(Ok(_)) => SocketOutcome::Continue, // Binary, Ping, Pong — ignore
        Some(Err(e)) => {
            warn!("websocket error: {}", e);
            SocketOutcome::Disconnect
        }
        None => SocketOutcome::Disconnect,
    }
}

async fn send_event(
    ws_tx: &mut (impl futures::Sink<WsMessage, Error = axum::Error> + Unpin),
    event: &EventMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => ws_tx.send(WsMessage::Text(json)).await,
        Err(_) => Ok(()),
    }
}
