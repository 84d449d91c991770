use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a user/player, stable across reconnects and tabs.
pub type UserId = Uuid;
/// Opaque identifier for a seat, used when scheduling seat-targeted alarms.
pub type SeatId = Uuid;

/// A 6-character room code (case-normalized uppercase). Serves as both the
/// actor name and the URL segment; two different strings never route to the
/// same room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Build a `RoomCode` from client-supplied input, normalizing case.
    /// Does not validate length/alphabet; use `protocol::validation` for that.
    pub fn normalize(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RoomCode {
    fn from(value: String) -> Self {
        Self::normalize(&value)
    }
}

/// Role a connection plays in a room, fixed at accept time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionRole {
    Player,
    Spectator,
}

/// Attachment payload stored per WebSocket; survives hibernation per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionAttachment {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_seed: String,
    pub connected_at: chrono::DateTime<chrono::Utc>,
    pub is_host: bool,
    pub role: ConnectionRole,
}

/// Summary of a connected or recently-connected player, sent in room
/// snapshots (`CONNECTED`, `RoomJoined`-equivalent payloads).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_seed: String,
    pub is_host: bool,
    pub is_connected: bool,
    pub turn_order: u8,
    pub is_ai: bool,
}

/// Summary of a spectator watching a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectatorInfo {
    pub user_id: UserId,
    pub display_name: String,
    pub connected_at: chrono::DateTime<chrono::Utc>,
}

/// Deterministic, code-derived room identity (spec §6 `RoomIdentity.generate`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomIdentity {
    pub hype_name: String,
    pub color: String,
    pub pattern: String,
    pub base_rotation: f64,
}

/// An AI-controlled seat descriptor (spec §3 `aiPlayers`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiPlayerInfo {
    pub id: String,
    pub profile_id: String,
    pub display_name: String,
    pub avatar_seed: String,
}
