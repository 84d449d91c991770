//! Server behavior configuration types: room lifecycle timings and limits.

use super::defaults::{
    default_ai_turn_max_retries, default_ai_turn_retry_secs, default_ai_turn_timeout_secs,
    default_event_buffer_size, default_heartbeat_throttle_secs, default_invite_ttl_secs,
    default_join_request_ttl_secs, default_max_players, default_pause_timeout_secs,
    default_ping_timeout, default_reconnection_window_secs, default_region_id,
    default_room_cleanup_interval, default_warm_seat_countdown_secs,
};
use serde::{Deserialize, Serialize};

/// Server configuration for room and player management.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Default maximum players per room (spec §3 `settings.maxPlayers`, 2..=4).
    #[serde(default = "default_max_players")]
    pub default_max_players: u8,
    /// Timeout for client ping responses (seconds).
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
    /// Interval for the background room-cleanup sweep (seconds).
    #[serde(default = "default_room_cleanup_interval")]
    pub room_cleanup_interval: u64,
    /// Reconnection window: time a disconnected seat stays reserved.
    #[serde(default = "default_reconnection_window_secs")]
    pub reconnection_window_secs: u64,
    /// `PAUSE_TIMEOUT` delay after the last player disconnects.
    #[serde(default = "default_pause_timeout_secs")]
    pub pause_timeout_secs: u64,
    /// Lead time before the AI watchdog alarm first fires.
    #[serde(default = "default_ai_turn_timeout_secs")]
    pub ai_turn_timeout_secs: u64,
    /// Gap between AI watchdog retries.
    #[serde(default = "default_ai_turn_retry_secs")]
    pub ai_turn_retry_secs: u64,
    /// Retries before the AI watchdog forces a minimum-score move.
    #[serde(default = "default_ai_turn_max_retries")]
    pub ai_turn_max_retries: u8,
    /// Countdown between a warm-seat promotion and its completion.
    #[serde(default = "default_warm_seat_countdown_secs")]
    pub warm_seat_countdown_secs: u64,
    /// Lifetime of a pending join request before it expires.
    #[serde(default = "default_join_request_ttl_secs")]
    pub join_request_ttl_secs: u64,
    /// Lifetime of a pending host invite before it expires.
    #[serde(default = "default_invite_ttl_secs")]
    pub invite_ttl_secs: u64,
    /// Threshold for heartbeat throttling (seconds); 0 disables throttling.
    #[serde(default = "default_heartbeat_throttle_secs")]
    pub heartbeat_throttle_secs: u64,
    /// Identifier for the deployment region.
    #[serde(default = "default_region_id")]
    pub region_id: String,
    /// Number of buffered `RoomEvent`s retained per room for a reconnecting
    /// client to catch up on.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_max_players: default_max_players(),
            ping_timeout: default_ping_timeout(),
            room_cleanup_interval: default_room_cleanup_interval(),
            reconnection_window_secs: default_reconnection_window_secs(),
            pause_timeout_secs: default_pause_timeout_secs(),
            ai_turn_timeout_secs: default_ai_turn_timeout_secs(),
            ai_turn_retry_secs: default_ai_turn_retry_secs(),
            ai_turn_max_retries: default_ai_turn_max_retries(),
            warm_seat_countdown_secs: default_warm_seat_countdown_secs(),
            join_request_ttl_secs: default_join_request_ttl_secs(),
            invite_ttl_secs: default_invite_ttl_secs(),
            heartbeat_throttle_secs: default_heartbeat_throttle_secs(),
            region_id: default_region_id(),
            event_buffer_size: default_event_buffer_size(),
        }
    }
}

/// Rate limiting configuration for spectator and lobby subsystems.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    /// Spectator reactions (spec §4.8): count allowed per window.
    #[serde(default = "super::defaults::default_reaction_limit_count")]
    pub reaction_limit_count: u32,
    #[serde(default = "super::defaults::default_reaction_limit_window_secs")]
    pub reaction_limit_window_secs: u64,
    /// Lobby chat (spec §4.10).
    #[serde(default = "super::defaults::default_lobby_chat_limit_count")]
    pub lobby_chat_limit_count: u32,
    #[serde(default = "super::defaults::default_lobby_chat_limit_window_secs")]
    pub lobby_chat_limit_window_secs: u64,
    /// Rooting changes per game per spectator (spec §4.8).
    #[serde(default = "super::defaults::default_rooting_change_limit")]
    pub rooting_change_limit: u32,
    /// Predictions per spectator per `(turnNumber, playerId)` (spec §4.8).
    #[serde(default = "super::defaults::default_prediction_limit_per_turn")]
    pub prediction_limit_per_turn: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            reaction_limit_count: super::defaults::default_reaction_limit_count(),
            reaction_limit_window_secs: super::defaults::default_reaction_limit_window_secs(),
            lobby_chat_limit_count: super::defaults::default_lobby_chat_limit_count(),
            lobby_chat_limit_window_secs: super::defaults::default_lobby_chat_limit_window_secs(),
            rooting_change_limit: super::defaults::default_rooting_change_limit(),
            prediction_limit_per_turn: super::defaults::default_prediction_limit_per_turn(),
        }
    }
}
