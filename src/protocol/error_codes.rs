use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error codes sent in `ERROR{code,message}` events.
///
/// Grouped per the kind table in spec §7 (Auth/Transport/Authorization/
/// State/Capacity/NotFound/Internal).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Transport (1xxx)
    InvalidMessage,
    UnknownCommand,

    // Authorization (2xxx)
    NotHost,
    NotSpectator,
    NotPlayer,

    // State (3xxx)
    WrongPhase,
    NotYourTurn,
    NoActiveTurn,
    InvalidRoomState,
    GameInProgress,
    RoomNotFound,
    PlayerNotFound,
    InvalidProfile,
    CategoryAlreadyScored,

    // Capacity / rate (4xxx)
    RoomFull,
    QueueFull,
    AlreadyInvited,
    AlreadyRooting,
    PredictionLimit,
    RootingLimit,
    RateLimited,

    // Not found (5xxx)
    InviteNotFound,
    PredictionNotFound,
    JoinRequestNotFound,

    // Internal (9xxx)
    InternalError,
    DeliveryFailed,
}

impl ErrorCode {
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidMessage => "The message could not be parsed as a valid command envelope.",
            Self::UnknownCommand => "The command type is not recognized.",
            Self::NotHost => "Only the room host may perform this action.",
            Self::NotSpectator => "This action is only available to spectators.",
            Self::NotPlayer => "This action is only available to seated players.",
            Self::WrongPhase => "The game is not in the correct phase for this action.",
            Self::NotYourTurn => "It is not your turn.",
            Self::NoActiveTurn => "There is no active turn to act on.",
            Self::InvalidRoomState => "The room is not in a state that allows this action.",
            Self::GameInProgress => "A game is already in progress in this room.",
            Self::RoomNotFound => "The requested room could not be found.",
            Self::PlayerNotFound => "The referenced player could not be found.",
            Self::InvalidProfile => "The AI profile id is not recognized.",
            Self::CategoryAlreadyScored => "That scorecard category is already filled.",
            Self::RoomFull => "The room has reached its maximum player capacity.",
            Self::QueueFull => "The spectator join queue is full.",
            Self::AlreadyInvited => "That user already has a pending invite to this room.",
            Self::AlreadyRooting => "You are already rooting for that player.",
            Self::PredictionLimit => "You have reached the prediction limit for this turn.",
            Self::RootingLimit => "You have reached the rooting-change limit for this game.",
            Self::RateLimited => "Too many requests in a short time; slow down.",
            Self::InviteNotFound => "The referenced invite could not be found.",
            Self::PredictionNotFound => "The referenced prediction could not be found.",
            Self::JoinRequestNotFound => "The referenced join request could not be found.",
            Self::InternalError => "An internal server error occurred.",
            Self::DeliveryFailed => "Delivery to the target could not be completed.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::RoomNotFound).unwrap();
        assert_eq!(json, "\"ROOM_NOT_FOUND\"");
    }

    #[test]
    fn display_uses_description() {
        assert_eq!(
            ErrorCode::NotHost.to_string(),
            ErrorCode::NotHost.description()
        );
    }
}
