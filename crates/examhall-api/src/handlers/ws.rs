//! WebSocket upgrade handler.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{info, warn};

use examhall_core::types::id::ParticipantId;
use examhall_realtime::message::types::OutboundMessage;

use crate::state::AppState;

/// Cadence of application-level keepalive pings.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Query parameters identifying the connecting participant.
#[derive(Debug, serde::Deserialize)]
pub struct WsQuery {
    /// Stable participant identifier.
    pub participant_id: ParticipantId,
    /// Display name shown to peers.
    pub display_name: String,
}

/// GET /ws?participant_id={uuid}&display_name={name} — WebSocket upgrade
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_ws_connection(state, query, socket))
}

/// Handles an established WebSocket connection.
async fn handle_ws_connection(state: AppState, query: WsQuery, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let gateway = state.engine.gateway().clone();
    let (handle, mut outbound_rx) =
        gateway.register(query.participant_id, query.display_name.clone());

    let conn_id = handle.id;

    info!(
        conn_id = %conn_id,
        participant_id = %query.participant_id,
        "WebSocket connection established"
    );

    // Spawn outbound message forwarder
    let outbound_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    warn!(conn_id = %conn_id, error = %e, "Outbound serialization failed");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Application-level keepalive; clients answer with a pong message
    let keepalive_handle = handle.clone();
    let keepalive_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(KEEPALIVE_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let ping = OutboundMessage::Ping {
                timestamp: chrono::Utc::now().timestamp(),
            };
            if !keepalive_handle.send(ping) {
                break;
            }
        }
    });

    // Process inbound messages
    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(Message::Text(text)) => {
                gateway.handle_inbound(&handle, &text).await;
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Cleanup
    keepalive_task.abort();
    outbound_task.abort();
    gateway.unregister(&handle).await;

    info!(
        conn_id = %conn_id,
        participant_id = %query.participant_id,
        "WebSocket connection closed"
    );
}
