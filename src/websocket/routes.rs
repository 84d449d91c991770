//! Router assembly (spec §4.1 "Router... is stateless, dispatches only").
//! Mirrors the teacher's `routes.rs::create_router`: CORS + trace layers
//! wrapped around the upgrade and admin handlers, all sharing one
//! `Arc<AppState>`.

use std::sync::Arc;

use axum::routing::{delete, get};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::server::AppState;

use super::admin;
use super::handler::{lobby_ws_handler, room_ws_handler};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/room/{code}", get(room_ws_handler))
        .route("/room/{code}/info", get(admin::room_info))
        .route("/lobby", get(lobby_ws_handler))
        .route("/health", get(admin::health))
        .route("/_debug/rooms", get(admin::debug_rooms))
        .route("/_debug/rooms/all", delete(admin::delete_all_rooms))
        .route("/_debug/rooms/{code}", delete(admin::delete_room))
        .route("/_debug/connections", get(admin::debug_connections))
        .route("/_debug/storage", get(admin::debug_storage))
        .route("/_debug/metrics", get(admin::metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
