//! Protocol configuration: wire-format limits.

use super::defaults::{
    default_max_display_name_length, default_max_players_limit, default_room_code_length,
};
use serde::{Deserialize, Serialize};

/// Protocol configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProtocolConfig {
    /// Length of room codes (spec §3: 6 characters).
    #[serde(default = "default_room_code_length")]
    pub room_code_length: usize,
    /// Maximum length for display names.
    #[serde(default = "default_max_display_name_length")]
    pub max_display_name_length: usize,
    /// Maximum players allowed in a room (spec §3: 2..=4).
    #[serde(default = "default_max_players_limit")]
    pub max_players_limit: u8,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            room_code_length: default_room_code_length(),
            max_display_name_length: default_max_display_name_length(),
            max_players_limit: default_max_players_limit(),
        }
    }
}
