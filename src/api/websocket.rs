//! Change-feed WebSocket.
//!
//! Connection lifecycle:
//! 1. Client calls `POST /api/auth/ws-ticket` to get a one-time ticket
//! 2. Client opens `GET /ws/changes?ticket=xxx`; ticket validated, WS upgraded
//! 3. Server sends a welcome frame, then one JSON `ChangeEvent` per
//!    committed mutation until either side closes
//! 4. Ping every 30s; lagging connections skip missed events

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::changes::ChangeEvent;
use crate::core_state::CoreState;
use crate::models::User;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
pub struct WsAuthQuery {
    ticket: String,
}

/// Frames the server sends.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum WsOutgoing<'a> {
    Welcome { user_id: String, role: &'a str },
    Change(&'a ChangeEvent),
    Lagged { skipped: u64 },
}

/// Validates the one-time ticket before upgrading the connection.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(ctx): State<ApiContext>,
    Query(query): Query<WsAuthQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user = {
        let mut tickets = ctx
            .ws_tickets
            .lock()
            .map_err(|_| ApiError::Internal("ticket lock".into()))?;
        tickets.consume(&query.ticket).ok_or(ApiError::Unauthorized)?
    };

    tracing::info!(user_id = %user.id, "WebSocket upgrade accepted");
    let core = ctx.core.clone();
    Ok(ws.on_upgrade(move |socket| handle_ws(socket, core, user)))
}

fn encode(frame: &WsOutgoing<'_>) -> Option<Message> {
    match serde_json::to_string(frame) {
        Ok(json) => Some(Message::Text(json)),
        Err(e) => {
            tracing::warn!(error = %e, "Could not encode WebSocket frame");
            None
        }
    }
}

async fn handle_ws(socket: WebSocket, core: Arc<CoreState>, user: User) {
    let (mut sink, mut stream) = socket.split();
    let mut changes = core.changes().subscribe();

    let welcome = WsOutgoing::Welcome {
        user_id: user.id.to_string(),
        role: user.role.as_str(),
    };
    if let Some(msg) = encode(&welcome) {
        if sink.send(msg).await.is_err() {
            return;
        }
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;

    loop {
        let outgoing = tokio::select! {
            event = changes.recv() => match event {
                Ok(event) => encode(&WsOutgoing::Change(&event)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(user_id = %user.id, skipped, "Change feed subscriber lagged");
                    encode(&WsOutgoing::Lagged { skipped })
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => None,
            },
            _ = heartbeat.tick() => Some(Message::Ping(Vec::new())),
        };

        if let Some(msg) = outgoing {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    }

    let _ = sink.close().await;
    tracing::info!(user_id = %user.id, "WebSocket closed");
}
