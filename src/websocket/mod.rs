//! WebSocket transport: the axum router, connection upgrade handlers, and
//! the per-socket reader/writer tasks that sit in front of the Room and
//! Lobby actors. Split the same way the teacher split `routes.rs` /
//! `handler.rs` / `connection.rs`, generalized from one connection class
//! (P2P signaling peers) to two (room seats, lobby presence).

mod admin;
mod connection;
mod handler;
mod routes;

pub use routes::create_router;
