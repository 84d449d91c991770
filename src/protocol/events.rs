use serde::{Deserialize, Serialize};

use super::error_codes::ErrorCode;
use super::game_state::{Category, Ranking};
use super::types::{AiPlayerInfo, PlayerInfo, SpectatorInfo, UserId};

/// Events broadcast or sent privately by the Room actor (spec §6, "Events
/// emitted by Room actor"). One variant per event name in that list; unit
/// variants carry no payload beyond what the envelope itself conveys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomEvent {
    Connected {
        players: Vec<PlayerInfo>,
        ai_players: Vec<AiPlayerInfo>,
        spectators: Vec<SpectatorInfo>,
        reconnected: bool,
    },
    SpectatorConnected {
        spectators: Vec<SpectatorInfo>,
    },
    PlayerJoined {
        player: PlayerInfo,
    },
    PlayerDisconnected {
        user_id: UserId,
        reconnect_deadline: chrono::DateTime<chrono::Utc>,
    },
    PlayerReconnected {
        user_id: UserId,
    },
    PlayerLeft {
        user_id: UserId,
    },
    PlayerSeatExpired {
        user_id: UserId,
    },
    SpectatorJoined {
        spectator: SpectatorInfo,
    },
    SpectatorLeft {
        user_id: UserId,
    },

    GameStarting,
    GameStarted {
        player_order: Vec<UserId>,
        current_player_id: UserId,
        turn_number: u8,
        round_number: u8,
    },
    QuickPlayStarted {
        players: Vec<PlayerInfo>,
        current_player_id: UserId,
    },
    TurnChanged {
        current_player_id: UserId,
        turn_number: u8,
        round_number: u8,
    },
    TurnSkipped {
        user_id: UserId,
        reason: String,
    },
    PlayerAfk {
        user_id: UserId,
    },

    DiceRolled {
        player_id: UserId,
        dice: [u8; 5],
        roll_number: u8,
        rolls_remaining: u8,
    },
    DiceKept {
        player_id: UserId,
        kept_mask: u8,
    },
    CategoryScored {
        player_id: UserId,
        category: Category,
        score: u8,
        total_score: u32,
        is_dicee_bonus: bool,
    },
    GameStateSync {
        phase: super::game_state::Phase,
        current_player_id: Option<UserId>,
    },
    GameOver {
        rankings: Vec<Ranking>,
    },
    RematchStarted,
    RoomStatus {
        status: super::room_state::RoomStatus,
        reason: String,
    },

    AiPlayerJoined {
        ai_player: AiPlayerInfo,
    },
    AiPlayerRemoved {
        player_id: String,
    },

    PredictionConfirmed {
        prediction_id: String,
    },
    PredictionMade {
        spectator_id: UserId,
        prediction_type: super::commands::PredictionType,
        count: u8,
    },
    PredictionResults {
        player_id: UserId,
        awarded_points: u32,
    },
    PredictionCancelled {
        prediction_id: String,
    },
    Predictions {
        predictions: Vec<serde_json::Value>,
    },
    PredictionStats {
        stats: serde_json::Value,
    },

    RootingConfirmed {
        target_user_id: UserId,
    },
    RootingCleared,
    RootingUpdate {
        counts: Vec<(UserId, u32)>,
        preview: Vec<String>,
    },
    RootingState {
        rooting: serde_json::Value,
    },
    RootingBonus {
        user_id: UserId,
        points: u32,
    },

    KibitzConfirmed,
    KibitzCleared,
    KibitzUpdate {
        options: Vec<KibitzOption>,
    },
    KibitzState {
        votes: serde_json::Value,
    },

    ReactionSent {
        emoji: String,
    },
    SpectatorReaction {
        spectator_id: UserId,
        emoji: String,
        target_user_id: Option<UserId>,
        play_sound: bool,
    },

    QueueJoined {
        position: u32,
    },
    QueueLeft,
    QueueUpdate {
        entries: Vec<UserId>,
    },
    QueueState {
        entries: Vec<UserId>,
    },
    WarmSeatTransition {
        user_id: UserId,
        countdown_seconds: u32,
    },
    WarmSeatComplete {
        user_id: UserId,
    },
    YouAreTransitioning {
        countdown_seconds: u32,
    },
    TransitionComplete,

    GalleryPoints {
        spectator_id: UserId,
        points: u32,
    },
    GalleryPointsUpdate {
        spectator_id: UserId,
        points: u32,
    },
    GalleryGameSummary {
        summary: serde_json::Value,
    },

    InviteSent {
        invite_id: String,
        target_user_id: UserId,
    },
    InviteAccepted {
        invite_id: String,
        target_user_id: UserId,
    },
    InviteDeclined {
        invite_id: String,
        target_user_id: UserId,
    },
    InviteExpired {
        invite_id: String,
    },

    JoinRequestReceived {
        request_id: String,
        requester_id: UserId,
        display_name: String,
    },
    JoinRequestExpired {
        request_id: String,
    },
    JoinRequestCancelled {
        request_id: String,
    },

    Error {
        code: ErrorCode,
        message: String,
    },
    Pong,
}

/// A single tallied kibitz option (spec §4.8: "sorted options and
/// percentages").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KibitzOption {
    pub option_id: String,
    pub vote_count: u32,
    pub percentage: f32,
}

/// Events broadcast or sent privately by the Lobby actor (spec §6, "Events
/// emitted by Lobby actor").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LobbyEvent {
    PresenceInit {
        online_users: Vec<UserId>,
    },
    PresenceJoin {
        user_id: UserId,
    },
    PresenceLeave {
        user_id: UserId,
    },
    LobbyOnlineUsers {
        users: Vec<UserId>,
    },
    LobbyRoomsList {
        rooms: Vec<serde_json::Value>,
    },
    LobbyRoomUpdate {
        room: serde_json::Value,
    },
    LobbyChatMessage {
        user_id: UserId,
        text: String,
    },
    LobbyChatHistory {
        messages: Vec<serde_json::Value>,
    },
    LobbyHighlight {
        highlight: serde_json::Value,
    },
    LobbyError {
        code: ErrorCode,
        message: String,
    },

    InviteReceived {
        invite_id: String,
        room_code: String,
        host_user_id: UserId,
    },
    InviteCancelled {
        invite_id: String,
    },

    JoinRequestSent {
        request_id: String,
        room_code: String,
    },
    JoinRequestCancelled {
        request_id: String,
    },
    JoinRequestError {
        code: ErrorCode,
        message: String,
    },
    JoinApproved {
        room_code: String,
    },
    JoinDeclined {
        room_code: String,
    },
    JoinRequestExpired {
        request_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_event_serializes_code_and_message() {
        let event = RoomEvent::Error {
            code: ErrorCode::RoomNotFound,
            message: ErrorCode::RoomNotFound.description().to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ERROR");
        assert_eq!(json["payload"]["code"], "ROOM_NOT_FOUND");
    }

    #[test]
    fn pong_has_no_payload_fields() {
        let event = RoomEvent::Pong;
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PONG");
    }

    #[test]
    fn lobby_invite_received_round_trips() {
        let event = LobbyEvent::InviteReceived {
            invite_id: "inv1".into(),
            room_code: "ABCDEF".into(),
            host_user_id: UserId::nil(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "INVITE_RECEIVED");
        assert_eq!(json["payload"]["room_code"], "ABCDEF");
    }
}
