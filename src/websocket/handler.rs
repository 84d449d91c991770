//! Upgrade handlers: query/path extraction, token verification, and role
//! gating that has to happen before a socket is ever accepted (spec §4.2
//! step 1). Mirrors the teacher's `handler.rs::websocket_handler` shape,
//! split into a room variant and a lobby variant.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use uuid::Uuid;

use crate::collaborators::TokenErrorCode;
use crate::protocol::validation::validate_room_code_with_config;
use crate::protocol::ConnectionRole;
use crate::server::AppState;

use super::connection::{handle_lobby_socket, handle_room_socket};

#[derive(Debug, Deserialize)]
pub struct RoomQuery {
    pub token: String,
    #[serde(default)]
    pub role: Option<ConnectionRole>,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(rename = "avatarSeed", default)]
    pub avatar_seed: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LobbyQuery {
    #[serde(rename = "userId", default)]
    pub user_id: Option<Uuid>,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(rename = "avatarSeed", default)]
    pub avatar_seed: Option<String>,
}

/// `GET /room/:code` (spec §6). Rejects before ever upgrading the socket on
/// a malformed code or a token the verifier refuses (step 1 of §4.2).
pub async fn room_ws_handler(
    ws: WebSocketUpgrade,
    Path(code): Path<String>,
    Query(query): Query<RoomQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let room_code = match validate_room_code_with_config(&code, &state.config.protocol) {
        Ok(code) => code,
        Err(message) => return (StatusCode::NOT_FOUND, message).into_response(),
    };

    let claims = match state.verifier.verify(&query.token).await {
        Ok(claims) => claims,
        Err(err) => {
            return match err.code {
                TokenErrorCode::Expired | TokenErrorCode::Invalid => {
                    (StatusCode::UNAUTHORIZED, err.message).into_response()
                }
                TokenErrorCode::JwksError => {
                    (StatusCode::SERVICE_UNAVAILABLE, err.message).into_response()
                }
            };
        }
    };

    let role = query.role.unwrap_or(ConnectionRole::Player);
    let display_name = query.display_name.unwrap_or_else(|| claims.display_name.clone());
    let avatar_seed = query
        .avatar_seed
        .unwrap_or_else(|| claims.sub.to_string());

    ws.on_upgrade(move |socket| {
        handle_room_socket(
            socket,
            state,
            room_code,
            claims.sub,
            role,
            display_name,
            avatar_seed,
        )
    })
}

/// `GET /lobby` (spec §6). No token is required by the spec for this
/// endpoint; identity is whatever the client asserts via query params.
pub async fn lobby_ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<LobbyQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let user_id = query.user_id.unwrap_or_else(Uuid::new_v4);
    let display_name = query.display_name.unwrap_or_else(|| "Guest".to_string());
    let avatar_seed = query.avatar_seed.unwrap_or_else(|| user_id.to_string());

    ws.on_upgrade(move |socket| {
        handle_lobby_socket(socket, state, user_id, display_name, avatar_seed)
    })
}
