use crate::config::ProtocolConfig;

use super::types::RoomCode;

/// Characters allowed in a room code, matching `room_codes::generate_room_code`'s
/// alphabet: `[A-HJ-NP-Z2-9]` (excludes 0, 1, I, O).
fn is_clean_room_code_char(c: char) -> bool {
    matches!(c, '2'..='9' | 'A'..='H' | 'J'..='N' | 'P'..='Z')
}

/// Validate a client-supplied room code string (as lifted from the
/// `/room/:code` URL segment) against the configured length and alphabet,
/// returning the normalized `RoomCode` on success.
pub fn validate_room_code_with_config(
    code: &str,
    config: &ProtocolConfig,
) -> Result<RoomCode, String> {
    let normalized = RoomCode::normalize(code);
    let raw = normalized.as_str();

    if raw.is_empty() {
        return Err("Room code cannot be empty".to_string());
    }
    if raw.chars().count() != config.room_code_length {
        return Err(format!(
            "Room code must be exactly {} characters",
            config.room_code_length
        ));
    }
    if !raw.chars().all(is_clean_room_code_char) {
        return Err("Room code contains characters outside [A-HJ-NP-Z2-9]".to_string());
    }
    Ok(normalized)
}

/// Validate a display name against the configured length limit.
///
/// Spec §3 only bounds display name length; it does not restrict the
/// character set (display names are free text, shown as-is in room
/// snapshots), so this is intentionally looser than the room-code validator.
pub fn validate_display_name_with_config(
    name: &str,
    config: &ProtocolConfig,
) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Display name cannot be blank".to_string());
    }
    if name.chars().count() > config.max_display_name_length {
        return Err(format!(
            "Display name too long (max {} characters)",
            config.max_display_name_length
        ));
    }
    Ok(())
}

/// Validate a requested max-player count against spec §3's 2..=4 range,
/// bounded above by the configured hard limit.
pub fn validate_max_players_with_config(max_players: u8, config: &ProtocolConfig) -> Result<(), String> {
    if max_players < 2 {
        return Err("Max players must be at least 2".to_string());
    }
    if max_players > config.max_players_limit {
        return Err(format!(
            "Max players cannot exceed {}",
            config.max_players_limit
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_clean_code_of_configured_length() {
        let config = ProtocolConfig::default();
        assert!(validate_room_code_with_config("AB234C", &config).is_ok());
    }

    #[test]
    fn rejects_confusing_characters() {
        let config = ProtocolConfig::default();
        assert!(validate_room_code_with_config("AB23O1", &config).is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        let config = ProtocolConfig::default();
        assert!(validate_room_code_with_config("AB2", &config).is_err());
    }

    #[test]
    fn normalizes_lowercase_input() {
        let config = ProtocolConfig::default();
        let code = validate_room_code_with_config("ab234c", &config).unwrap();
        assert_eq!(code.as_str(), "AB234C");
    }

    #[test]
    fn rejects_blank_display_name() {
        let config = ProtocolConfig::default();
        assert!(validate_display_name_with_config("   ", &config).is_err());
    }

    #[test]
    fn max_players_out_of_range() {
        let config = ProtocolConfig::default();
        assert!(validate_max_players_with_config(1, &config).is_err());
        assert!(validate_max_players_with_config(5, &config).is_err());
        assert!(validate_max_players_with_config(4, &config).is_ok());
    }

    proptest! {
        #[test]
        fn clean_alphabet_codes_always_validate(
            chars in proptest::collection::vec(
                prop_oneof![
                    (b'2'..=b'9').prop_map(|b| b as char),
                    (b'A'..=b'H').prop_map(|b| b as char),
                    (b'J'..=b'N').prop_map(|b| b as char),
                    (b'P'..=b'Z').prop_map(|b| b as char),
                ],
                6..=6,
            )
        ) {
            let config = ProtocolConfig::default();
            let code: String = chars.into_iter().collect();
            prop_assert!(validate_room_code_with_config(&code, &config).is_ok());
        }
    }
}
