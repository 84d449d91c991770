//! Wire protocol: envelope framing, command/event payloads, validation, and
//! the pure game-state machine shared between the room actor and its tests.

pub mod commands;
pub mod envelope;
pub mod error_codes;
pub mod events;
pub mod game_state;
pub mod identity;
pub mod room_codes;
pub mod room_state;
pub mod types;
pub mod validation;

pub use commands::{LobbyCommand, RoomCommand};
pub use envelope::{ClientEnvelope, ServerEnvelope};
pub use error_codes::ErrorCode;
pub use events::{LobbyEvent, RoomEvent};
pub use game_state::{Category, GameState, Phase, PlayerGameState};
pub use room_state::{AlarmData, PlayerSeat, RoomSettings, RoomState, RoomStatus};
pub use types::{
    AiPlayerInfo, ConnectionAttachment, ConnectionRole, PlayerInfo, RoomCode, RoomIdentity,
    SeatId, SpectatorInfo, UserId,
};
