//! HTTP endpoints for session lifecycle: create/join/leave, public config,
//! roster and leaderboard. The realtime traffic lives in [`crate::ws`].

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::registry::RegistryError;
use crate::session::{GameLogic, JoinError, LeaveError};
use crate::types::Player;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateQuery {
    pub kind: Option<String>,
}

/// PUT /game/create?kind=champdup
///
/// Body: optional public-config object. Individually rejected keys come
/// back in `errors` and keep their defaults.
pub async fn create_game(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CreateQuery>,
    body: Option<Json<Value>>,
) -> Response {
    let kind = query.kind.unwrap_or_else(|| "champdup".to_string());
    let body = body.map(|Json(v)| v);
    let config = match &body {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                "config must be a JSON object",
            )
                .into_response()
        }
    };
    match state.registry.create(&kind, config).await {
        Ok(created) => Json(created).into_response(),
        Err(e @ RegistryError::UnknownKind(_)) => {
            (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub token: String,
    pub player: Player,
}

/// PUT /game/join/{id}/{username}
pub async fn join_game(
    State(state): State<Arc<AppState>>,
    Path((id, username)): Path<(String, String)>,
) -> Response {
    let session = match state.registry.get(&id).await {
        Ok(session) => session,
        Err(e) => return (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    };
    let mut guard = session.lock().await;
    match guard.engine.join(&username) {
        Ok(player) => {
            let token = guard
                .engine
                .player_token(&username)
                .cloned()
                .unwrap_or_default();
            Json(JoinResponse { token, player }).into_response()
        }
        Err(e @ JoinError::CapacityExceeded) => {
            (StatusCode::CONFLICT, e.to_string()).into_response()
        }
        Err(e @ JoinError::NameTaken(_)) => (StatusCode::CONFLICT, e.to_string()).into_response(),
    }
}

/// PUT /game/leave/{id}/{username} - WAITING sessions only.
pub async fn leave_game(
    State(state): State<Arc<AppState>>,
    Path((id, username)): Path<(String, String)>,
) -> Response {
    let session = match state.registry.get(&id).await {
        Ok(session) => session,
        Err(e) => return (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    };
    let mut guard = session.lock().await;
    match guard.engine.leave(&username) {
        Ok(player) => Json(player).into_response(),
        Err(e @ LeaveError::NotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
        Err(e @ LeaveError::SessionRunning) => {
            (StatusCode::CONFLICT, e.to_string()).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DestroyQuery {
    pub token: Option<String>,
}

/// DELETE /game/{id}?token=<host token>
pub async fn destroy_game(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<DestroyQuery>,
) -> Response {
    let session = match state.registry.get(&id).await {
        Ok(session) => session,
        Err(e) => return (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    };
    let authorized = {
        let guard = session.lock().await;
        query.token.as_deref() == Some(guard.engine.host_token.as_str())
    };
    if !authorized {
        return (StatusCode::FORBIDDEN, "bad host token").into_response();
    }
    match state.registry.destroy(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    }
}

/// GET /game/{id}/config - the transpiled public config fields.
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let session = match state.registry.get(&id).await {
        Ok(session) => session,
        Err(e) => return (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    };
    let fields = session.lock().await.game.config_fields();
    Json(fields).into_response()
}

/// GET /game/{id}/players - roster in join order.
pub async fn get_players(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let session = match state.registry.get(&id).await {
        Ok(session) => session,
        Err(e) => return (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    };
    let roster = session.lock().await.engine.roster();
    Json(roster).into_response()
}

/// GET /game/{id}/leaderboard - players by points, descending; ties keep
/// join order.
pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let session = match state.registry.get(&id).await {
        Ok(session) => session,
        Err(e) => return (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    };
    let mut players = session.lock().await.engine.roster();
    players.sort_by(|a, b| b.points.cmp(&a.points));
    Json(players).into_response()
}
