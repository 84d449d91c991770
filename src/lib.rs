#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Dicee Server
//!
//! A realtime multiplayer dice game server built around an actor-per-room
//! model: a stateless router dispatches connections to per-room-code Room
//! actors and a singleton Lobby actor, with game rules living in pure state
//! machine functions the actors call into.

/// Server configuration and environment variables
pub mod config;

/// External collaborator contracts: token verification, dice scoring, chat,
/// AI turn execution.
pub mod collaborators;

/// The singleton Lobby actor: presence, room directory, lobby chat, invites
pub mod lobby_actor;

/// Structured logging configuration
pub mod logging;

/// Metrics collection and reporting
pub mod metrics;

/// WebSocket message protocol definitions
pub mod protocol;

/// Rate limiting implementation
pub mod rate_limit;

/// Reconnection token and state management
pub mod reconnection;

/// The per-room-code Room actor: connection lifecycle, turn state machine,
/// alarms, AI turns, spectator engagement, invites
pub mod room_actor;

/// Main server orchestration
pub mod server;

/// WebSocket connection handling
pub mod websocket;
