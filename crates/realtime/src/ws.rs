//! WebSocket endpoint bridging the hub to one authenticated connection.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use analytics_core::{Error, Result, UserIdentity};

use crate::auth::AuthKeys;
use crate::hub::Hub;
use crate::wire::ServerMessage;

/// State for the realtime route.
#[derive(Clone)]
pub struct RealtimeState {
    pub hub: Arc<Hub>,
    pub keys: Arc<AuthKeys>,
}

/// GET /realtime - authenticated WebSocket upgrade.
///
/// The bearer token is accepted as a `token` query parameter or an
/// `Authorization` header; the handshake is refused outright when it does
/// not verify. The channel is server-push only.
pub async fn realtime_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    State(state): State<RealtimeState>,
) -> Response {
    let token = params
        .get("token")
        .cloned()
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .map(String::from)
        })
        .unwrap_or_default();

    let identity = match state.keys.verify(&token) {
        Ok(identity) => identity,
        Err(e) => {
            warn!(error = %e, "realtime handshake rejected");
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    };

    ws.on_upgrade(move |socket| serve_connection(socket, state.hub, identity))
}

/// Forwards both hub topics to one socket until either side goes away.
/// Errors here terminate only this connection.
async fn serve_connection(mut socket: WebSocket, hub: Arc<Hub>, identity: UserIdentity) {
    info!(user_id = %identity.id, "realtime subscriber connected");

    let greeting = ServerMessage::Connected {
        message: "Realtime connected".into(),
    };
    if send_message(&mut socket, &greeting).await.is_err() {
        return;
    }

    let mut activity_rx = hub.subscribe_activity();
    let mut stats_rx = hub.subscribe_stats();

    loop {
        tokio::select! {
            payload = activity_rx.recv() => match payload {
                Ok(payload) => {
                    if send_message(&mut socket, &ServerMessage::ActivityNew(payload))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    // The subscriber pulls fresh state over REST; skipping
                    // ahead is the documented at-most-once behavior.
                    debug!(user_id = %identity.id, missed, "activity subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
            update = stats_rx.recv() => match update {
                Ok(update) => {
                    if send_message(&mut socket, &ServerMessage::StatsUpdate(update))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    debug!(user_id = %identity.id, missed, "stats subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                // Clients emit nothing beyond the handshake; drain pings and
                // stop on close or error.
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    info!(user_id = %identity.id, "realtime subscriber disconnected");
}

async fn send_message(socket: &mut WebSocket, message: &ServerMessage) -> Result<()> {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to serialize realtime message");
            return Ok(());
        }
    };
    socket.send(Message::Text(text)).await.map_err(|e| {
        debug!(error = %e, "realtime send failed, dropping connection");
        Error::publish(e.to_string())
    })
}
