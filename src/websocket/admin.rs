//! `/health` and `/_debug/*` endpoints (spec §6). Read-only introspection
//! over the room registry plus the server's metrics snapshot, the same
//! shape as the teacher's `server/admin.rs` but scoped to rooms instead of
//! peer connections.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use serde_json::json;

use crate::protocol::RoomCode;
use crate::server::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.metrics.health_status().await;
    let status = match health.status {
        crate::metrics::HealthStatusLevel::Healthy => StatusCode::OK,
        crate::metrics::HealthStatusLevel::Degraded => StatusCode::OK,
        crate::metrics::HealthStatusLevel::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        status,
        Json(json!({
            "status": health.status,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "issues": health.issues,
            "warnings": health.warnings,
        })),
    )
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.metrics.snapshot().await)
}

#[derive(Serialize)]
struct RoomSummary {
    room_code: String,
    host_user_id: uuid::Uuid,
    created_at: chrono::DateTime<chrono::Utc>,
}

pub async fn debug_rooms(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rooms: Vec<RoomSummary> = state
        .room_codes()
        .into_iter()
        .filter_map(|code| {
            state.room_entry(&code).map(|entry| RoomSummary {
                room_code: code.as_str().to_string(),
                host_user_id: entry.host_user_id,
                created_at: entry.created_at,
            })
        })
        .collect();
    Json(json!({ "rooms": rooms, "count": rooms.len() }))
}

pub async fn debug_connections(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "active_connections": state.metrics.snapshot().await.connections }))
}

pub async fn debug_storage(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "room_count": state.room_count() }))
}

pub async fn delete_room(State(state): State<Arc<AppState>>, Path(code): Path<String>) -> impl IntoResponse {
    let room_code = RoomCode::normalize(&code);
    if state.remove_room(&room_code).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub async fn delete_all_rooms(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    for code in state.room_codes() {
        state.remove_room(&code).await;
    }
    StatusCode::NO_CONTENT
}

pub async fn room_info(State(state): State<Arc<AppState>>, Path(code): Path<String>) -> impl IntoResponse {
    let room_code = match crate::protocol::validation::validate_room_code_with_config(
        &code,
        &state.config.protocol,
    ) {
        Ok(code) => code,
        Err(message) => return (StatusCode::NOT_FOUND, Json(json!({ "error": message }))),
    };

    match state.room_entry(&room_code) {
        Some(entry) => (
            StatusCode::OK,
            Json(json!({
                "roomCode": room_code.as_str(),
                "hostUserId": entry.host_user_id,
                "createdAt": entry.created_at,
            })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "room not found" })),
        ),
    }
}
