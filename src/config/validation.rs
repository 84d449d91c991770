//! Configuration validation functions.

use super::Config;

/// Validate a loaded configuration, checking cross-field invariants that
/// `serde` defaults alone can't enforce.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    config.websocket.validate()?;

    if config.server.ai_turn_max_retries == 0 {
        anyhow::bail!("server.ai_turn_max_retries must be at least 1");
    }

    if !(2..=4).contains(&config.server.default_max_players) {
        anyhow::bail!(
            "server.default_max_players must be between 2 and 4 (configured: {})",
            config.server.default_max_players
        );
    }

    if config.protocol.max_players_limit < config.server.default_max_players {
        anyhow::bail!(
            "protocol.max_players_limit ({}) must be >= server.default_max_players ({})",
            config.protocol.max_players_limit,
            config.server.default_max_players
        );
    }

    if config.protocol.room_code_length == 0 {
        anyhow::bail!("protocol.room_code_length must be at least 1");
    }

    Ok(())
}

/// Detect if we're running in production mode.
///
/// Checks for `DICEE__ENVIRONMENT` or generic `PRODUCTION` / `PROD`
/// environment variables.
#[must_use]
pub fn is_production_mode() -> bool {
    use std::env;

    if let Ok(mode) = env::var("DICEE__ENVIRONMENT") {
        return mode.eq_ignore_ascii_case("production") || mode.eq_ignore_ascii_case("prod");
    }

    env::var("DICEE_PRODUCTION").is_ok() || env::var("PRODUCTION").is_ok() || env::var("PROD").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_players_limit_below_default() {
        let mut config = Config::default();
        config.protocol.max_players_limit = 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_zero_ai_retries() {
        let mut config = Config::default();
        config.server.ai_turn_max_retries = 0;
        assert!(validate_config(&config).is_err());
    }
}
