use serde::{Deserialize, Serialize};

use super::types::{AiPlayerInfo, RoomCode, RoomIdentity, UserId};

/// Room visibility/turn-timer knobs, set at creation (spec §3 `settings`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSettings {
    pub max_players: u8,
    pub turn_timeout_seconds: u32,
    pub is_public: bool,
    pub allow_spectators: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            max_players: 4,
            turn_timeout_seconds: 30,
            is_public: true,
            allow_spectators: true,
        }
    }
}

/// Room lifecycle status (spec §3 `status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Starting,
    Playing,
    Paused,
    Completed,
    Abandoned,
}

/// Persisted room state (spec §3 `RoomState`, key `room`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomState {
    pub room_code: RoomCode,
    pub host_user_id: UserId,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub settings: RoomSettings,
    pub player_order: Vec<UserId>,
    pub status: RoomStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub paused_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ai_players: Vec<AiPlayerInfo>,
    pub identity: RoomIdentity,
}

impl RoomState {
    pub fn new(room_code: RoomCode, host_user_id: UserId, settings: RoomSettings) -> Self {
        let identity = super::identity::generate(&room_code);
        Self {
            player_order: vec![host_user_id],
            room_code,
            host_user_id,
            created_at: chrono::Utc::now(),
            settings,
            status: RoomStatus::Waiting,
            started_at: None,
            paused_at: None,
            ai_players: Vec::new(),
            identity,
        }
    }

    pub fn is_host(&self, user_id: UserId) -> bool {
        self.host_user_id == user_id
    }

    /// Reset a completed game back to `waiting` (spec §4.5 `REMATCH`).
    pub fn reset_for_rematch(&mut self) {
        self.status = RoomStatus::Waiting;
        self.started_at = None;
        self.paused_at = None;
    }
}

/// A reserved human-player slot (spec §3 `PlayerSeat`, key `seats`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSeat {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_seed: String,
    pub joined_at: chrono::DateTime<chrono::Utc>,
    pub is_connected: bool,
    pub disconnected_at: Option<chrono::DateTime<chrono::Utc>>,
    pub reconnect_deadline: Option<chrono::DateTime<chrono::Utc>>,
    pub is_host: bool,
    pub turn_order: u8,
    /// Seat odal: opaque unique id used when scheduling seat-targeted alarms.
    pub seat_id: super::types::SeatId,
}

impl PlayerSeat {
    /// True iff this seat still counts toward capacity: connected, or
    /// disconnected but still within its reconnect window (spec invariant 2).
    pub fn is_active(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.is_connected || self.reconnect_deadline.map(|d| now <= d).unwrap_or(false)
    }

    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        !self.is_connected && self.reconnect_deadline.map(|d| now > d).unwrap_or(true)
    }
}

/// Alarm subsystem discriminator (spec §3 `AlarmData`, key `alarm_data`).
/// The actor has exactly one scheduled fire-time; this enum disambiguates
/// which subsystem owns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AlarmData {
    TurnTimeout {
        user_id: UserId,
    },
    AfkCheck {
        user_id: UserId,
    },
    RoomCleanup {
        /// Spec §9 Open Question 3: a dedicated alarm type rather than
        /// overloading `ROOM_CLEANUP` with a `warmSeat` metadata flag.
        warm_seat: bool,
    },
    SeatExpiration,
    JoinRequestExpiration {
        request_id: String,
    },
    AiTurnTimeout {
        user_id: UserId,
        retry_count: u8,
    },
    PauseTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn seat_is_active_while_connected() {
        let seat = PlayerSeat {
            user_id: Uuid::new_v4(),
            display_name: "P".into(),
            avatar_seed: "seed".into(),
            joined_at: chrono::Utc::now(),
            is_connected: true,
            disconnected_at: None,
            reconnect_deadline: None,
            is_host: false,
            turn_order: 0,
            seat_id: Uuid::new_v4(),
        };
        assert!(seat.is_active(chrono::Utc::now()));
        assert!(!seat.is_expired(chrono::Utc::now()));
    }

    #[test]
    fn seat_expires_past_deadline() {
        let now = chrono::Utc::now();
        let seat = PlayerSeat {
            user_id: Uuid::new_v4(),
            display_name: "P".into(),
            avatar_seed: "seed".into(),
            joined_at: now,
            is_connected: false,
            disconnected_at: Some(now - chrono::Duration::seconds(400)),
            reconnect_deadline: Some(now - chrono::Duration::seconds(100)),
            is_host: false,
            turn_order: 0,
            seat_id: Uuid::new_v4(),
        };
        assert!(!seat.is_active(now));
        assert!(seat.is_expired(now));
    }

    #[test]
    fn room_state_new_seeds_host_as_sole_player() {
        let host = Uuid::new_v4();
        let room = RoomState::new(RoomCode::normalize("ABCDEF"), host, RoomSettings::default());
        assert!(room.is_host(host));
        assert_eq!(room.player_order, vec![host]);
        assert_eq!(room.status, RoomStatus::Waiting);
    }
}
