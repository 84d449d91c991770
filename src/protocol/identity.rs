use super::types::{RoomCode, RoomIdentity};

const HYPE_NAMES: &[&str] = &[
    "Clutch Crew", "Snake Eyes Society", "Box Car Bandits", "Fever Pitch",
    "Lucky Sevens", "Rattle & Roll", "Hot Streak", "Yahtzee Yankees",
    "Full House Gang", "Straight Shooters", "Last Roll Legends", "Bonus Round",
];

const COLORS: &[&str] = &[
    "crimson", "tangerine", "gold", "emerald", "teal", "azure", "violet", "magenta",
];

const PATTERNS: &[&str] = &["dots", "stripes", "checker", "waves", "confetti", "diamonds"];

/// Deterministic, code-derived room identity (spec §6
/// `RoomIdentity.generate(code)`).
///
/// Pure in `code`: the same room code always yields the same name, color,
/// pattern, and rotation, computed from a hash of the code rather than any
/// random source.
pub fn generate(code: &RoomCode) -> RoomIdentity {
    let hash = fnv1a(code.as_str());

    let hype_name = HYPE_NAMES[(hash as usize) % HYPE_NAMES.len()].to_string();
    let color = COLORS[(hash.rotate_right(8) as usize) % COLORS.len()].to_string();
    let pattern = PATTERNS[(hash.rotate_right(16) as usize) % PATTERNS.len()].to_string();

    // Map the low 24 bits onto [-0.7, 0.7].
    let fraction = (hash & 0x00FF_FFFF) as f64 / 0x00FF_FFFF as f64;
    let base_rotation = (fraction * 1.4) - 0.7;

    RoomIdentity {
        hype_name,
        color,
        pattern,
        base_rotation,
    }
}

fn fnv1a(s: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET_BASIS;
    for byte in s.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_code_always_produces_same_identity() {
        let code = RoomCode::normalize("ABCDEF");
        let a = generate(&code);
        let b = generate(&code);
        assert_eq!(a.hype_name, b.hype_name);
        assert_eq!(a.color, b.color);
        assert_eq!(a.pattern, b.pattern);
        assert_eq!(a.base_rotation, b.base_rotation);
    }

    #[test]
    fn rotation_stays_in_bounds() {
        for raw in ["AAAAAA", "234567", "ZZZZZZ", "QRSTUV"] {
            let identity = generate(&RoomCode::normalize(raw));
            assert!(identity.base_rotation >= -0.7 && identity.base_rotation <= 0.7);
        }
    }

    #[test]
    fn different_codes_tend_to_differ() {
        let a = generate(&RoomCode::normalize("AAAAAA"));
        let b = generate(&RoomCode::normalize("ZZZZZZ"));
        assert!(a.hype_name != b.hype_name || a.color != b.color || a.pattern != b.pattern);
    }
}
