//! Default value functions for configuration fields.
//!
//! Organized by category; every numeric constant named in the operational
//! spec gets its own named function rather than an inline literal, so the
//! provenance of each number is traceable from `grep`.

use super::logging::LogFormat;

// =============================================================================
// Root
// =============================================================================

pub const fn default_port() -> u16 {
    3536
}

// =============================================================================
// Server / room lifecycle
// =============================================================================

pub const fn default_max_players() -> u8 {
    4
}

pub const fn default_ping_timeout() -> u64 {
    30
}

pub const fn default_heartbeat_throttle_secs() -> u64 {
    30
}

pub const fn default_room_cleanup_interval() -> u64 {
    60
}

/// Reconnection window: a disconnected seat stays reserved for this long
/// (spec §3 `reconnectDeadline`, §8 "Seat–connection correspondence").
pub const fn default_reconnection_window_secs() -> u64 {
    300
}

/// How long a `playing` room with zero connected players stays `paused`
/// before being marked `abandoned` (spec §4.3).
pub const fn default_pause_timeout_secs() -> u64 {
    1800
}

/// Lead time before the AI watchdog alarm first fires after
/// `triggerAITurnIfNeeded` (spec §4.7).
pub const fn default_ai_turn_timeout_secs() -> u64 {
    35
}

/// Gap between AI watchdog retries (spec §4.6 `AI_TURN_TIMEOUT`).
pub const fn default_ai_turn_retry_secs() -> u64 {
    5
}

/// Number of AI watchdog retries before forcing a minimum-score move
/// (spec §4.6/§4.7).
pub const fn default_ai_turn_max_retries() -> u8 {
    3
}

/// Countdown between a warm-seat promotion broadcast and the transition
/// actually completing (spec §4.8).
pub const fn default_warm_seat_countdown_secs() -> u64 {
    10
}

/// Lifetime of a pending join request before it expires (spec §4.9).
pub const fn default_join_request_ttl_secs() -> u64 {
    300
}

/// Lifetime of a pending host invite before it expires (spec §4.9).
pub const fn default_invite_ttl_secs() -> u64 {
    300
}

pub fn default_region_id() -> String {
    "default".to_string()
}

/// Number of buffered `RoomEvent`s retained per room for a reconnecting
/// client to catch up on (spec §4.3).
pub const fn default_event_buffer_size() -> usize {
    64
}

// =============================================================================
// Protocol / wire limits
// =============================================================================

pub const fn default_room_code_length() -> usize {
    6
}

pub const fn default_max_display_name_length() -> usize {
    32
}

pub const fn default_max_players_limit() -> u8 {
    4
}

// =============================================================================
// Rate limiting
// =============================================================================

/// Spectator reactions: spec §4.8 "10 reactions per 30 s".
pub const fn default_reaction_limit_count() -> u32 {
    10
}

pub const fn default_reaction_limit_window_secs() -> u64 {
    30
}

/// Lobby chat: spec §4.10 "30 messages/minute/user".
pub const fn default_lobby_chat_limit_count() -> u32 {
    30
}

pub const fn default_lobby_chat_limit_window_secs() -> u64 {
    60
}

/// Spectator rooting changes: spec §4.8 "5 changes per game per spectator".
pub const fn default_rooting_change_limit() -> u32 {
    5
}

/// Spectator predictions: spec §4.8 "≤ 3 predictions per spectator per
/// (turnNumber, playerId) key".
pub const fn default_prediction_limit_per_turn() -> u32 {
    3
}

// =============================================================================
// Logging
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    true
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

// =============================================================================
// Metrics
// =============================================================================

pub const fn default_dashboard_cache_refresh_interval_secs() -> u64 {
    5
}

pub const fn default_dashboard_cache_ttl_secs() -> u64 {
    30
}

// =============================================================================
// WebSocket transport
// =============================================================================

pub const fn default_enable_batching() -> bool {
    true
}

pub const fn default_batch_size() -> usize {
    10
}

pub const fn default_batch_interval_ms() -> u64 {
    16
}

pub const fn default_auth_timeout_secs() -> u64 {
    10
}
