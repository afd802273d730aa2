use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use uuid::Uuid;

use super::protocol::{WsIncomingMessage, WS_APP_PROTOCOL};
use crate::core::errors::ApiError;
use crate::state::AppState;
use crate::turns::TurnLog;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.protocols([WS_APP_PROTOCOL])
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    tracing::info!("ws connection {} opened", connection_id);

    let (mut sender, mut receiver) = socket.split();

    // Every connection mirrors its own conversation; turn state never
    // leaks between connections.
    let mut turns = TurnLog::new();

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                let Ok(incoming) = serde_json::from_str::<WsIncomingMessage>(&text) else {
                    continue;
                };
                let query = incoming.message.unwrap_or_default();
                if query.is_empty() {
                    continue;
                }

                if let Err(err) = run_turn(&mut sender, &state, &mut turns, &query).await {
                    tracing::warn!("ws connection {} dropped mid-turn: {}", connection_id, err);
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    tracing::info!(
        "ws connection {} closed after {} turns",
        connection_id,
        turns.len()
    );
}

/// Runs one full turn: submit the query, forward every event to the
/// socket in arrival order and fold it into the connection's turn log.
///
/// Returns `Err` only when the socket itself is gone; pipeline failures
/// surface to the client as an error frame.
async fn run_turn(
    sender: &mut SplitSink<WebSocket, Message>,
    state: &Arc<AppState>,
    turns: &mut TurnLog,
    query: &str,
) -> Result<(), ApiError> {
    let mut stream = state.pipeline.submit(query);
    turns.begin_turn(stream.turn_id, query);

    while let Some(item) = stream.events.recv().await {
        match item {
            Ok(event) => {
                let frame = serde_json::to_value(&event).map_err(ApiError::internal)?;
                turns.apply(stream.turn_id, &event);
                send_json(sender, frame).await?;
            }
            Err(err) => {
                turns.fail(stream.turn_id);
                send_json(
                    sender,
                    json!({"type": "error", "message": err.to_string()}),
                )
                .await?;
                return Ok(());
            }
        }
    }

    Ok(())
}

pub async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    payload: Value,
) -> Result<(), ApiError> {
    let text = serde_json::to_string(&payload).map_err(ApiError::internal)?;
    sender
        .send(Message::Text(text))
        .await
        .map_err(ApiError::internal)?;
    Ok(())
}
