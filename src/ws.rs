//! The realtime channel: one WebSocket per host and per player.
//!
//! Each socket gets an unbounded outbound queue drained by its own writer
//! task, so a slow or dead peer only ever stalls itself. The read loop
//! parses `{type, value}` frames; malformed ones are answered with an ERROR
//! frame and the connection stays open.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::champdup::ChampdUp;
use crate::protocol::{ClientFrame, MessageType, ServerFrame};
use crate::session::{dispatch, Sender, SharedSession};
use crate::types::Author;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub role: Option<String>,
    pub token: Option<String>,
}

/// WebSocket upgrade handler. Identity is resolved from the capability
/// token before the upgrade; a bad token never opens a socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let session = match state.registry.get(&id).await {
        Ok(session) => session,
        Err(e) => return (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    };

    let sender = {
        let guard = session.lock().await;
        let token = params.token.as_deref().unwrap_or_default();
        match params.role.as_deref() {
            Some("host") => {
                if token == guard.engine.host_token {
                    Sender::Host
                } else {
                    return (StatusCode::FORBIDDEN, "bad host token").into_response();
                }
            }
            _ => match guard.engine.username_for_token(token) {
                Some(username) => Sender::Player(username),
                None => {
                    return (StatusCode::FORBIDDEN, "unknown participant token").into_response()
                }
            },
        }
    };

    tracing::info!(session = %id, sender = ?sender, "websocket connecting");
    let lag = state.config.simulate_ws_lag_ms.map(Duration::from_millis);
    ws.on_upgrade(move |socket| handle_socket(socket, session, sender, lag))
}

async fn handle_socket(
    socket: WebSocket,
    session: SharedSession<ChampdUp>,
    sender: Sender,
    lag: Option<Duration>,
) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    // Writer task: drains this connection's queue. Optional artificial lag
    // exercises the one-slow-socket-must-not-stall-the-room guarantee.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Some(delay) = lag {
                tokio::time::sleep(delay).await;
            }
            let Ok(json) = serde_json::to_string(&frame) else {
                continue;
            };
            if ws_sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Bind the channel (replacing any previous one) and push the tailored
    // state snapshot to this identity right away.
    {
        let mut guard = session.lock().await;
        let viewer = match &sender {
            Sender::Host => {
                guard.engine.connect_host(tx.clone());
                Some(Author::Host)
            }
            Sender::Player(username) => {
                guard.engine.connect_player(username, tx.clone());
                guard
                    .engine
                    .player(username)
                    .cloned()
                    .map(Author::player)
            }
        };
        if let Some(viewer) = viewer {
            let _ = tx.send(guard.snapshot_for(&viewer));
        }
    }

    while let Some(message) = ws_stream.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => dispatch(&session, sender.clone(), frame).await,
                Err(e) => {
                    tracing::debug!(error = %e, "unprocessable frame");
                    let _ = tx.send(ServerFrame {
                        kind: MessageType::Error,
                        value: json!({
                            "code": "PARSE_ERROR",
                            "msg": format!("Invalid message format: {e}"),
                        }),
                        author: Author::Host,
                        ping: None,
                    });
                }
            },
            Ok(Message::Close(_)) => break,
            // Pings are answered at the protocol layer.
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "websocket error");
                break;
            }
        }
    }

    {
        let mut guard = session.lock().await;
        match &sender {
            Sender::Host => guard.engine.disconnect_host(&tx),
            Sender::Player(username) => guard.engine.disconnect_player(username, &tx),
        }
    }
    drop(tx);
    let _ = writer.await;
    tracing::info!(sender = ?sender, "websocket closed");
}
