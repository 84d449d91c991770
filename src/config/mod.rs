//! Configuration module for Dicee.
//!
//! This module provides comprehensive configuration management with support for:
//! - JSON configuration files
//! - Environment variable overrides
//! - Stdin input
//! - Sensible defaults
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`server`]: Server behavior configuration (rooms, seats, timeouts, alarms)
//! - [`protocol`]: Wire-format limits (room code length, display name length)
//! - [`logging`]: Logging configuration
//! - [`metrics`]: Dashboard snapshot cache configuration
//! - [`websocket`]: WebSocket connection settings
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

// Submodules
pub mod defaults;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod protocol;
pub mod server;
pub mod types;
pub mod validation;
pub mod websocket;

// Re-exports for convenience
pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use metrics::MetricsConfig;

pub use protocol::ProtocolConfig;

pub use server::{RateLimitConfig, ServerConfig};

pub use types::Config;

pub use validation::{is_production_mode, validate_config};

pub use websocket::WebSocketConfig;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.port, 3536);
        assert_eq!(config.server.default_max_players, 4);
        assert_eq!(config.server.ping_timeout, 30);
        assert_eq!(config.server.room_cleanup_interval, 60);
        assert_eq!(config.server.reconnection_window_secs, 300);
        assert_eq!(config.server.pause_timeout_secs, 1800);
        assert_eq!(config.server.ai_turn_timeout_secs, 35);
        assert_eq!(config.server.ai_turn_retry_secs, 5);
        assert_eq!(config.server.ai_turn_max_retries, 3);
        assert_eq!(config.server.warm_seat_countdown_secs, 10);
        assert_eq!(config.server.join_request_ttl_secs, 300);
        assert_eq!(config.server.invite_ttl_secs, 300);
        assert_eq!(config.server.event_buffer_size, 64);

        assert_eq!(config.rate_limit.reaction_limit_count, 10);
        assert_eq!(config.rate_limit.reaction_limit_window_secs, 30);
        assert_eq!(config.rate_limit.lobby_chat_limit_count, 30);
        assert_eq!(config.rate_limit.lobby_chat_limit_window_secs, 60);
        assert_eq!(config.rate_limit.rooting_change_limit, 5);
        assert_eq!(config.rate_limit.prediction_limit_per_turn, 3);

        assert_eq!(config.protocol.room_code_length, 6);
        assert_eq!(config.protocol.max_display_name_length, 32);
        assert_eq!(config.protocol.max_players_limit, 4);

        assert_eq!(config.logging.dir, "logs");
        assert_eq!(config.logging.filename, "server.log");
        assert_eq!(config.logging.rotation, "daily");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(config.port, deserialized.port);
        assert_eq!(
            config.server.default_max_players,
            deserialized.server.default_max_players
        );
        assert_eq!(
            config.rate_limit.reaction_limit_count,
            deserialized.rate_limit.reaction_limit_count
        );
        assert_eq!(
            config.protocol.room_code_length,
            deserialized.protocol.room_code_length
        );
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert_eq!(LogLevel::Debug.to_string(), "debug");
        assert_eq!(LogLevel::Info.to_string(), "info");
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::Error.to_string(), "error");
    }

    #[test]
    fn test_log_level_as_str() {
        assert_eq!(LogLevel::Trace.as_str(), "trace");
        assert_eq!(LogLevel::Debug.as_str(), "debug");
        assert_eq!(LogLevel::Info.as_str(), "info");
        assert_eq!(LogLevel::Warn.as_str(), "warn");
        assert_eq!(LogLevel::Error.as_str(), "error");
    }

    #[test]
    fn test_validate_config_accepts_defaults() {
        assert!(validate_config(&Config::default()).is_ok());
    }
}
