use serde::{Deserialize, Serialize};

use super::game_state::Category;
use super::types::UserId;

/// Commands accepted by the Room actor, excluding chat (spec §6: "Chat types
/// route through an external `ChatManager` with a fixed contract").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomCommand {
    StartGame,
    QuickPlayStart { ai_profiles: Vec<String> },
    AddAiPlayer { profile_id: String },
    RemoveAiPlayer { player_id: String },

    DiceRoll { kept: Option<u8> },
    DiceKeep { indices: Vec<u8> },
    CategoryScore { category: Category },
    Rematch,

    Prediction {
        target_user_id: UserId,
        prediction_type: PredictionType,
        exact_score: Option<u8>,
    },
    CancelPrediction { prediction_id: String },
    GetPredictions,
    GetPredictionStats,

    RootForPlayer { target_user_id: UserId },
    ClearRooting,
    GetRooting,

    Kibitz { vote: KibitzVote },
    ClearKibitz,
    GetKibitz,

    SpectatorReaction { emoji: String, target_user_id: Option<UserId> },

    JoinQueue,
    LeaveQueue,
    GetQueue,
    GetGalleryPoints,

    SendInvite { target_user_id: UserId },
    CancelInvite { invite_id: String },
    JoinRequestResponse { request_id: String, approved: bool },

    Ping,
}

/// Prediction kinds (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionType {
    Dicee,
    Exact,
    Improves,
    Bricks,
}

/// Kibitz vote payload (spec §4.8: "Three vote types: `category` ..., `keep`
/// ..., `action` ...").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "voteType", rename_all = "snake_case")]
pub enum KibitzVote {
    Category { category: Category },
    Keep { mask: u8 },
    Action { action: KibitzAction },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KibitzAction {
    Roll,
    Score,
}

/// Commands accepted by the Lobby actor (spec §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LobbyCommand {
    LobbyChat { text: String },
    GetRooms,
    GetOnlineUsers,
    RequestJoin { room_code: String },
    CancelJoinRequest { request_id: String, room_code: String },
    SendInvite { target_user_id: UserId, room_code: String },
    CancelInvite { invite_id: String },
    /// No-op, backwards-compat only (spec §4.10).
    RoomCreated,
    RoomUpdated,
    RoomClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_game_has_no_payload() {
        let raw = r#"{"type":"START_GAME"}"#;
        let cmd: RoomCommand = serde_json::from_str(raw).unwrap();
        assert!(matches!(cmd, RoomCommand::StartGame));
    }

    #[test]
    fn quick_play_start_parses_ai_profiles() {
        let raw = r#"{"type":"QUICK_PLAY_START","payload":{"ai_profiles":["carmen"]}}"#;
        let cmd: RoomCommand = serde_json::from_str(raw).unwrap();
        match cmd {
            RoomCommand::QuickPlayStart { ai_profiles } => assert_eq!(ai_profiles, vec!["carmen"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn kibitz_category_vote_round_trips() {
        let vote = KibitzVote::Category { category: Category::Fours };
        let json = serde_json::to_value(&vote).unwrap();
        assert_eq!(json["voteType"], "category");
        let back: KibitzVote = serde_json::from_value(json).unwrap();
        assert!(matches!(back, KibitzVote::Category { category: Category::Fours }));
    }

    #[test]
    fn lobby_command_request_join_round_trips() {
        let raw = r#"{"type":"REQUEST_JOIN","payload":{"room_code":"ABCDEF"}}"#;
        let cmd: LobbyCommand = serde_json::from_str(raw).unwrap();
        match cmd {
            LobbyCommand::RequestJoin { room_code } => assert_eq!(room_code, "ABCDEF"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
