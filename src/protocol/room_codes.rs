use super::types::RoomCode;
use crate::config::ProtocolConfig;
use rand::RngExt;

/// Characters allowed in a room code: spec §3's `[A-HJ-NP-Z2-9]` — excludes
/// `0`, `1`, `I`, `O` because they are easily confused when read aloud.
const CLEAN_CHARS: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Generate a room code of the configured length, avoiding confusing
/// characters.
pub fn generate_room_code(config: &ProtocolConfig) -> RoomCode {
    RoomCode::from(generate_clean_code_of_length(config.room_code_length))
}

fn generate_clean_code_of_length(length: usize) -> String {
    if length == 0 {
        return String::new();
    }
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CLEAN_CHARS.len());
            // SAFETY: `idx` is produced by `random_range(0..len)`, so it is
            // always within [0, len).
            #[allow(clippy::indexing_slicing)]
            let ch = CLEAN_CHARS[idx] as char;
            ch
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_avoid_confusing_characters() {
        let config = ProtocolConfig::default();
        for _ in 0..200 {
            let code = generate_room_code(&config);
            assert_eq!(code.as_str().len(), config.room_code_length);
            assert!(code
                .as_str()
                .chars()
                .all(|c| CLEAN_CHARS.contains(&(c as u8))));
        }
    }
}
