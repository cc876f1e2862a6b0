// ============================================================================
// Live Relay
// ============================================================================
//
// GET /live upgrades to a WebSocket. Each client gets its own task (one per
// upgrade). Every text frame is a LiveStream update:
//
//   {"event_id": "...", "left_side": "...", "right_side": "...",
//    "action": {"...": "..."}, "timestamp": "..."}
//
// The referenced event is checked, the update is forwarded to the live
// service and then echoed back to the sender. A bad frame gets an error
// frame and the connection stays open; a read or write failure ends this
// client's loop only.
//
// ============================================================================

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::entity::EntityKind;
use crate::gateway::middleware::{ClientIp, admit};
use crate::gateway::{Caller, GatewayState};
use crate::gateway::handlers::resources::owning_service;
use crate::metrics;
use crate::models::LiveStream;
use crate::validation::WriteMode;
use medalstream_error::AppError;

/// GET /live
///
/// The bearer token is checked before the upgrade; every frame after it
/// still spends a token from the caller's admission bucket.
pub async fn relay(
    State(state): State<Arc<GatewayState>>,
    caller: Caller,
    ClientIp(client_ip): ClientIp,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    tracing::debug!(authenticated = caller.0.is_some(), "Live relay upgrade");
    ws.on_upgrade(move |socket| run_relay(socket, state, client_ip))
}

struct ConnectionGuard;

impl ConnectionGuard {
    fn open() -> Self {
        metrics::LIVE_RELAY_CONNECTIONS.inc();
        Self
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::LIVE_RELAY_CONNECTIONS.dec();
    }
}

async fn run_relay(mut socket: WebSocket, state: Arc<GatewayState>, client_ip: String) {
    let _guard = ConnectionGuard::open();
    tracing::debug!("Live relay client connected");

    while let Some(frame) = socket.recv().await {
        let message = match frame {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "Live relay read failed");
                break;
            }
        };

        if matches!(message, Message::Text(_) | Message::Binary(_))
            && let Err(e) = admit(&state, &client_ip, "/live")
        {
            if socket.send(Message::Text(error_frame(&e).to_string())).await.is_err() {
                break;
            }
            continue;
        }

        let reply = match message {
            Message::Text(text) => match relay_frame(&state, &text).await {
                Ok(echo) => echo,
                Err(e) => error_frame(&e),
            },
            Message::Binary(_) => error_frame(&AppError::bad_request("Only text frames are accepted")),
            Message::Close(_) => break,
            // Ping/pong are answered by the websocket layer
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        if let Err(e) = socket.send(Message::Text(reply.to_string())).await {
            tracing::debug!(error = %e, "Live relay write failed");
            break;
        }
    }

    tracing::debug!("Live relay client disconnected");
}

/// Validate and forward one update, returning the frame to echo back
pub async fn relay_frame(state: &GatewayState, text: &str) -> Result<Value, AppError> {
    let update: LiveStream = serde_json::from_str(text)
        .map_err(|e| AppError::bad_request(format!("Malformed live update: {}", e)))?;
    let payload = serde_json::to_value(&update)?;

    state
        .validator
        .validate_payload(EntityKind::LiveStream, &payload, WriteMode::Create)
        .await?;

    owning_service(state, EntityKind::LiveStream)?
        .create(&payload)
        .await?;

    Ok(payload)
}

fn error_frame(error: &AppError) -> Value {
    error.log();
    let status = error.status_code();
    let message = if status.is_server_error() {
        "Internal server error".to_string()
    } else {
        error.user_message()
    };
    json!({
        "error": message,
        "error_code": error.error_code(),
        "status": status.as_u16(),
    })
}
