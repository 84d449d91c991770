use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error_codes::ErrorCode;
use super::types::UserId;

/// Turn phase (spec §3 `GameState.phase`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    TurnRoll,
    TurnDecide,
    GameOver,
}

/// Dicee scorecard categories. `Scorer` (an external collaborator, spec §6)
/// owns the scoring arithmetic; this enum only names the thirteen slots the
/// state machine tracks as open/filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Ones,
    Twos,
    Threes,
    Fours,
    Fives,
    Sixes,
    ThreeOfAKind,
    FourOfAKind,
    FullHouse,
    SmallStraight,
    LargeStraight,
    Dicee,
    Chance,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::Ones,
        Category::Twos,
        Category::Threes,
        Category::Fours,
        Category::Fives,
        Category::Sixes,
        Category::ThreeOfAKind,
        Category::FourOfAKind,
        Category::FullHouse,
        Category::SmallStraight,
        Category::LargeStraight,
        Category::Dicee,
        Category::Chance,
    ];
}

/// Per-player game state (spec §3 `GameState` per-player fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerGameState {
    pub user_id: UserId,
    pub display_name: String,
    pub is_ai: bool,
    /// Five dice faces, absent before the first roll of a turn.
    pub current_dice: Option<[u8; 5]>,
    /// Bitmask over the five dice positions.
    pub kept_dice: u8,
    pub rolls_remaining: u8,
    pub scorecard: HashMap<Category, u8>,
    pub total_score: u32,
}

impl PlayerGameState {
    pub fn new(user_id: UserId, display_name: String, is_ai: bool) -> Self {
        Self {
            user_id,
            display_name,
            is_ai,
            current_dice: None,
            kept_dice: 0,
            rolls_remaining: 3,
            scorecard: HashMap::new(),
            total_score: 0,
        }
    }

    pub fn is_category_open(&self, category: Category) -> bool {
        !self.scorecard.contains_key(&category)
    }

    pub fn reset_turn(&mut self) {
        self.current_dice = None;
        self.kept_dice = 0;
        self.rolls_remaining = 3;
    }

    pub fn categories_scored(&self) -> usize {
        self.scorecard.len()
    }
}

/// Final standing for a finished game (spec §3 `rankings`, present iff
/// `phase=game_over`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ranking {
    pub user_id: UserId,
    pub total_score: u32,
    pub place: u8,
}

/// Full game state (spec §3 `GameState`, persisted under key `game`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub players: HashMap<UserId, PlayerGameState>,
    pub phase: Phase,
    pub player_order: Vec<UserId>,
    pub current_player_index: usize,
    pub turn_number: u8,
    pub round_number: u8,
    pub rankings: Option<Vec<Ranking>>,
}

impl GameState {
    pub fn new(player_order: Vec<UserId>, players: HashMap<UserId, PlayerGameState>) -> Self {
        Self {
            players,
            phase: Phase::TurnRoll,
            player_order,
            current_player_index: 0,
            turn_number: 1,
            round_number: 1,
            rankings: None,
        }
    }

    pub fn current_player_id(&self) -> Option<UserId> {
        self.player_order.get(self.current_player_index).copied()
    }

    pub fn is_current_player(&self, user_id: UserId) -> bool {
        self.current_player_id() == Some(user_id)
    }

    /// Advance to the next player, wrapping the round counter. Spec §4.5:
    /// "advance currentPlayerIndex modulo |playerOrder|; if wrapped,
    /// increment roundNumber."
    pub fn advance_turn(&mut self) {
        if self.player_order.is_empty() {
            return;
        }
        self.current_player_index += 1;
        if self.current_player_index >= self.player_order.len() {
            self.current_player_index = 0;
            self.round_number += 1;
        }
        self.turn_number += 1;
        self.phase = Phase::TurnRoll;
        if let Some(id) = self.current_player_id() {
            if let Some(player) = self.players.get_mut(&id) {
                player.reset_turn();
            }
        }
    }

    /// True once every player has filled all thirteen scorecard categories.
    pub fn all_categories_scored(&self) -> bool {
        self.players
            .values()
            .all(|p| p.categories_scored() >= Category::ALL.len())
    }
}

/// Result of a pure state-machine validation (spec §4.5: "return either
/// `{success:true}` or `{success:false, error:CODE, message}`").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    WrongPhase,
    NotYourTurn,
    NoActiveTurn,
    CategoryAlreadyScored,
    InvalidIndex,
    InvalidCategory,
}

impl ValidationError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::WrongPhase => ErrorCode::WrongPhase,
            Self::NotYourTurn => ErrorCode::NotYourTurn,
            Self::NoActiveTurn => ErrorCode::NoActiveTurn,
            Self::CategoryAlreadyScored => ErrorCode::CategoryAlreadyScored,
            Self::InvalidIndex | Self::InvalidCategory => ErrorCode::InvalidMessage,
        }
    }
}

/// Validate `DICE_ROLL` preconditions (spec §4.5): phase is roll or decide,
/// the acting user is the current player, and rolls remain.
pub fn validate_dice_roll(state: &GameState, user_id: UserId) -> Result<(), ValidationError> {
    if !matches!(state.phase, Phase::TurnRoll | Phase::TurnDecide) {
        return Err(ValidationError::WrongPhase);
    }
    if !state.is_current_player(user_id) {
        return Err(ValidationError::NotYourTurn);
    }
    let player = state
        .players
        .get(&user_id)
        .ok_or(ValidationError::NoActiveTurn)?;
    if player.rolls_remaining == 0 {
        return Err(ValidationError::NoActiveTurn);
    }
    Ok(())
}

/// Validate `DICE_KEEP{indices}` preconditions.
pub fn validate_dice_keep(
    state: &GameState,
    user_id: UserId,
    indices: &[u8],
) -> Result<(), ValidationError> {
    if state.phase != Phase::TurnDecide {
        return Err(ValidationError::WrongPhase);
    }
    if !state.is_current_player(user_id) {
        return Err(ValidationError::NotYourTurn);
    }
    if indices.iter().any(|&i| i > 4) {
        return Err(ValidationError::InvalidIndex);
    }
    Ok(())
}

/// Validate `CATEGORY_SCORE{category}` preconditions: correct phase, correct
/// player, and the category must still be open.
pub fn validate_category_score(
    state: &GameState,
    user_id: UserId,
    category: Category,
) -> Result<(), ValidationError> {
    if state.phase != Phase::TurnDecide {
        return Err(ValidationError::WrongPhase);
    }
    if !state.is_current_player(user_id) {
        return Err(ValidationError::NotYourTurn);
    }
    let player = state
        .players
        .get(&user_id)
        .ok_or(ValidationError::NoActiveTurn)?;
    if !player.is_category_open(category) {
        return Err(ValidationError::CategoryAlreadyScored);
    }
    Ok(())
}

/// Validate `REMATCH`: only legal once the game has ended.
pub fn validate_rematch(state: &GameState) -> Result<(), ValidationError> {
    if state.phase != Phase::GameOver {
        return Err(ValidationError::WrongPhase);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn state_with_one_player() -> (GameState, UserId) {
        let user = Uuid::new_v4();
        let mut players = HashMap::new();
        players.insert(user, PlayerGameState::new(user, "Host".into(), false));
        (GameState::new(vec![user], players), user)
    }

    #[test]
    fn dice_roll_requires_current_player() {
        let (state, _user) = state_with_one_player();
        let other = Uuid::new_v4();
        assert_eq!(
            validate_dice_roll(&state, other),
            Err(ValidationError::NotYourTurn)
        );
    }

    #[test]
    fn dice_roll_fails_with_no_rolls_left() {
        let (mut state, user) = state_with_one_player();
        state.players.get_mut(&user).unwrap().rolls_remaining = 0;
        assert_eq!(
            validate_dice_roll(&state, user),
            Err(ValidationError::NoActiveTurn)
        );
    }

    #[test]
    fn category_score_rejects_filled_category() {
        let (mut state, user) = state_with_one_player();
        state.phase = Phase::TurnDecide;
        state.players.get_mut(&user).unwrap().scorecard.insert(Category::Ones, 3);
        assert_eq!(
            validate_category_score(&state, user, Category::Ones),
            Err(ValidationError::CategoryAlreadyScored)
        );
    }

    #[test]
    fn rematch_requires_game_over() {
        let (state, _user) = state_with_one_player();
        assert_eq!(validate_rematch(&state), Err(ValidationError::WrongPhase));
    }

    #[test]
    fn advance_turn_wraps_round_number() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut players = HashMap::new();
        players.insert(a, PlayerGameState::new(a, "A".into(), false));
        players.insert(b, PlayerGameState::new(b, "B".into(), false));
        let mut state = GameState::new(vec![a, b], players);

        state.advance_turn();
        assert_eq!(state.current_player_index, 1);
        assert_eq!(state.round_number, 1);

        state.advance_turn();
        assert_eq!(state.current_player_index, 0);
        assert_eq!(state.round_number, 2);
    }
}
