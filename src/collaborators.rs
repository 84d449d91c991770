//! External collaborator contracts (spec §6): token verification, dice
//! scoring, chat, and AI turn execution are deliberately kept outside the
//! actor core and consumed through these traits, mirroring how the teacher
//! keeps storage behind `GameDatabase` (`database/mod.rs`) rather than
//! inlining it into the connection-handling path.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use rand::RngExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::protocol::{AiPlayerInfo, Category, GameState, PlayerGameState, Phase, RoomCode, UserId};

// ===========================================================================
// VerifyToken
// ===========================================================================

/// Claims recovered from a verified token (spec §6 `VerifyToken`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Failure taxonomy the verifier is allowed to return. The spec treats the
/// verifier as opaque beyond this (Design Notes, Open Question 2); anything
/// else it might do internally (JWKS refresh, HS256 fallback) is none of the
/// core's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorCode {
    Expired,
    Invalid,
    JwksError,
}

#[derive(Debug, Clone)]
pub struct TokenError {
    pub code: TokenErrorCode,
    pub message: String,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for TokenError {}

/// Opaque token verifier. Connection upgrade requires `token`; on failure the
/// handshake is rejected without a socket ever being created (spec §6 step 1).
#[async_trait]
pub trait VerifyToken: Send + Sync {
    async fn verify(&self, token: &str) -> Result<TokenClaims, TokenError>;
}

// ===========================================================================
// Scorer
// ===========================================================================

/// Outcome of `scoreCategory` (spec §6 `Scorer`).
#[derive(Debug, Clone)]
pub struct ScoreCategoryOutcome {
    pub score: u8,
    pub total_score: u32,
    pub is_dicee_bonus: bool,
    pub game_completed: bool,
    pub rankings: Option<Vec<crate::protocol::game_state::Ranking>>,
    pub next_player_id: Option<UserId>,
    pub next_turn_number: Option<u8>,
    pub next_round_number: Option<u8>,
    pub next_phase: Option<Phase>,
}

/// Outcome of `skipTurn` (an AFK forfeiture or a forced minimum-score move).
#[derive(Debug, Clone)]
pub struct SkipTurnOutcome {
    pub category_scored: Category,
    pub score: u8,
    pub game_completed: bool,
    pub rankings: Option<Vec<crate::protocol::game_state::Ranking>>,
    pub next_player_id: Option<UserId>,
    pub next_phase: Option<Phase>,
}

/// Outcome of `rollDice`.
#[derive(Debug, Clone)]
pub struct RollDiceOutcome {
    pub dice: [u8; 5],
    pub roll_number: u8,
    pub rolls_remaining: u8,
    pub new_phase: Phase,
}

/// Dice-scoring arithmetic, kept external to the turn state machine (spec §1
/// Non-goals: "dice scoring rules beyond the state-machine transitions").
/// The state machine in [`crate::protocol::game_state`] only tracks which
/// slots are open; this trait computes what a roll is actually worth.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score_category(
        &self,
        user_id: UserId,
        category: Category,
    ) -> Result<ScoreCategoryOutcome>;

    async fn skip_turn(&self, user_id: UserId, reason: &str) -> Result<SkipTurnOutcome>;

    async fn roll_dice(&self, user_id: UserId, kept_mask: u8) -> Result<RollDiceOutcome>;

    async fn keep_dice(&self, user_id: UserId, indices: &[u8]) -> Result<u8>;

    async fn initialize_from_room(
        &self,
        players: &[PlayerGameState],
        settings: &crate::protocol::RoomSettings,
    ) -> Result<()>;

    async fn start_game(&self) -> Result<()>;

    async fn start_game_with_order(&self, order: Vec<UserId>) -> Result<()>;

    async fn schedule_afk_warning(&self, user_id: UserId) -> Result<()>;

    async fn get_state(&self) -> GameState;

    async fn reset_for_rematch(&self) -> Result<()>;
}

/// Standard five-dice Dicee scoring table, used when no bespoke `Scorer` is
/// supplied. Faithful dice-scoring arithmetic is out of scope of the core
/// state machine (spec §1), so this is a reasonable default rather than a
/// contractual reference implementation.
pub struct StandardScorer {
    state: Mutex<GameState>,
}

impl StandardScorer {
    pub fn new(initial: GameState) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }

    fn category_value(category: Category, dice: &[u8; 5]) -> u8 {
        let mut counts = [0u8; 7];
        for &d in dice {
            if (1..=6).contains(&d) {
                counts[d as usize] += 1;
            }
        }
        let sum: u16 = dice.iter().map(|&d| d as u16).sum();
        match category {
            Category::Ones => counts[1] * 1,
            Category::Twos => counts[2] * 2,
            Category::Threes => counts[3] * 3,
            Category::Fours => counts[4] * 4,
            Category::Fives => counts[5] * 5,
            Category::Sixes => counts[6] * 6,
            Category::ThreeOfAKind => {
                if counts.iter().any(|&c| c >= 3) {
                    sum as u8
                } else {
                    0
                }
            }
            Category::FourOfAKind => {
                if counts.iter().any(|&c| c >= 4) {
                    sum as u8
                } else {
                    0
                }
            }
            Category::FullHouse => {
                let has_three = counts.iter().any(|&c| c == 3);
                let has_two = counts.iter().any(|&c| c == 2);
                let has_five_of_kind = counts.iter().any(|&c| c == 5);
                if (has_three && has_two) || has_five_of_kind {
                    25
                } else {
                    0
                }
            }
            Category::SmallStraight => {
                let present: Vec<bool> = (1..=6).map(|f| counts[f] > 0).collect();
                let runs = [[0, 1, 2, 3], [1, 2, 3, 4], [2, 3, 4, 5]];
                if runs.iter().any(|run| run.iter().all(|&i| present[i])) {
                    30
                } else {
                    0
                }
            }
            Category::LargeStraight => {
                let present: Vec<bool> = (1..=6).map(|f| counts[f] > 0).collect();
                if present[0..5].iter().all(|&p| p) || present[1..6].iter().all(|&p| p) {
                    40
                } else {
                    0
                }
            }
            Category::Dicee => {
                if counts.iter().any(|&c| c == 5) {
                    50
                } else {
                    0
                }
            }
            Category::Chance => sum as u8,
        }
    }
}

#[async_trait]
impl Scorer for StandardScorer {
    async fn score_category(
        &self,
        user_id: UserId,
        category: Category,
    ) -> Result<ScoreCategoryOutcome> {
        let mut state = self.state.lock().await;
        let dice = state
            .players
            .get(&user_id)
            .and_then(|p| p.current_dice)
            .ok_or_else(|| anyhow::anyhow!("no dice rolled this turn"))?;
        let score = Self::category_value(category, &dice);
        let is_dicee_bonus = category != Category::Dicee
            && dice.iter().all(|&d| d == dice[0])
            && state
                .players
                .get(&user_id)
                .map(|p| p.scorecard.get(&Category::Dicee) == Some(&50))
                .unwrap_or(false);

        let player = state
            .players
            .get_mut(&user_id)
            .ok_or_else(|| anyhow::anyhow!("unknown player"))?;
        player.scorecard.insert(category, score);
        player.total_score += score as u32;
        let total_score = player.total_score;

        let game_completed = state.all_categories_scored();
        if game_completed {
            state.phase = Phase::GameOver;
            state.rankings = Some(Self::compute_rankings(&state));
        } else {
            state.advance_turn();
        }

        Ok(ScoreCategoryOutcome {
            score,
            total_score,
            is_dicee_bonus,
            game_completed,
            rankings: state.rankings.clone(),
            next_player_id: if game_completed {
                None
            } else {
                state.current_player_id()
            },
            next_turn_number: if game_completed {
                None
            } else {
                Some(state.turn_number)
            },
            next_round_number: if game_completed {
                None
            } else {
                Some(state.round_number)
            },
            next_phase: if game_completed {
                None
            } else {
                Some(state.phase)
            },
        })
    }

    async fn skip_turn(&self, user_id: UserId, _reason: &str) -> Result<SkipTurnOutcome> {
        let mut state = self.state.lock().await;
        let category = {
            let player = state
                .players
                .get(&user_id)
                .ok_or_else(|| anyhow::anyhow!("unknown player"))?;
            Category::ALL
                .iter()
                .copied()
                .find(|c| player.is_category_open(*c))
                .ok_or_else(|| anyhow::anyhow!("no open category to forfeit"))?
        };
        if let Some(player) = state.players.get_mut(&user_id) {
            player.scorecard.insert(category, 0);
        }
        let game_completed = state.all_categories_scored();
        if game_completed {
            state.phase = Phase::GameOver;
            state.rankings = Some(Self::compute_rankings(&state));
        } else {
            state.advance_turn();
        }
        Ok(SkipTurnOutcome {
            category_scored: category,
            score: 0,
            game_completed,
            rankings: state.rankings.clone(),
            next_player_id: if game_completed {
                None
            } else {
                state.current_player_id()
            },
            next_phase: if game_completed {
                None
            } else {
                Some(state.phase)
            },
        })
    }

    async fn roll_dice(&self, user_id: UserId, kept_mask: u8) -> Result<RollDiceOutcome> {
        let mut state = self.state.lock().await;
        let player = state
            .players
            .get_mut(&user_id)
            .ok_or_else(|| anyhow::anyhow!("unknown player"))?;
        if player.rolls_remaining == 0 {
            return Err(anyhow::anyhow!("no rolls remaining"));
        }
        let previous = player.current_dice.unwrap_or([1, 1, 1, 1, 1]);
        let mut dice = previous;
        let mut rng = rand::rng();
        for (i, face) in dice.iter_mut().enumerate() {
            if kept_mask & (1 << i) == 0 {
                *face = rng.random_range(1..=6);
            }
        }
        player.current_dice = Some(dice);
        player.kept_dice = kept_mask;
        player.rolls_remaining -= 1;
        let rolls_remaining = player.rolls_remaining;
        let roll_number = 3 - rolls_remaining;
        state.phase = Phase::TurnDecide;
        Ok(RollDiceOutcome {
            dice,
            roll_number,
            rolls_remaining,
            new_phase: Phase::TurnDecide,
        })
    }

    async fn keep_dice(&self, user_id: UserId, indices: &[u8]) -> Result<u8> {
        let mut state = self.state.lock().await;
        let player = state
            .players
            .get_mut(&user_id)
            .ok_or_else(|| anyhow::anyhow!("unknown player"))?;
        let mut mask = 0u8;
        for &i in indices {
            if i > 4 {
                return Err(anyhow::anyhow!("dice index out of range"));
            }
            mask |= 1 << i;
        }
        player.kept_dice = mask;
        Ok(mask)
    }

    async fn initialize_from_room(
        &self,
        players: &[PlayerGameState],
        _settings: &crate::protocol::RoomSettings,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.players = players
            .iter()
            .cloned()
            .map(|p| (p.user_id, p))
            .collect();
        state.player_order = players.iter().map(|p| p.user_id).collect();
        Ok(())
    }

    async fn start_game(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.current_player_index = 0;
        state.phase = Phase::TurnRoll;
        Ok(())
    }

    async fn start_game_with_order(&self, order: Vec<UserId>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.player_order = order;
        state.current_player_index = 0;
        state.phase = Phase::TurnRoll;
        Ok(())
    }

    async fn schedule_afk_warning(&self, _user_id: UserId) -> Result<()> {
        Ok(())
    }

    async fn get_state(&self) -> GameState {
        self.state.lock().await.clone()
    }

    async fn reset_for_rematch(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        for player in state.players.values_mut() {
            player.current_dice = None;
            player.kept_dice = 0;
            player.rolls_remaining = 3;
            player.scorecard.clear();
            player.total_score = 0;
        }
        state.phase = Phase::TurnRoll;
        state.current_player_index = 0;
        state.turn_number = 1;
        state.round_number = 1;
        state.rankings = None;
        Ok(())
    }
}

impl StandardScorer {
    fn compute_rankings(state: &GameState) -> Vec<crate::protocol::game_state::Ranking> {
        let mut ranked: Vec<_> = state
            .players
            .values()
            .map(|p| (p.user_id, p.total_score))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
            .into_iter()
            .enumerate()
            .map(|(idx, (user_id, total_score))| crate::protocol::game_state::Ranking {
                user_id,
                total_score,
                place: (idx + 1) as u8,
            })
            .collect()
    }
}

// ===========================================================================
// ChatManager
// ===========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub user_id: UserId,
    pub display_name: String,
    pub body: String,
    pub created_at_epoch_ms: i64,
}

/// Chat lives outside `RoomCommand`/`RoomEvent` entirely (spec §6: "chat
/// types route through an external `ChatManager` with a fixed contract").
#[async_trait]
pub trait ChatManager: Send + Sync {
    async fn initialize(&self, room_code: &RoomCode) -> Result<()>;
    async fn handle_text_message(
        &self,
        user_id: UserId,
        display_name: &str,
        body: &str,
    ) -> Result<ChatMessage>;
    async fn handle_quick_chat(&self, user_id: UserId, phrase_id: &str) -> Result<ChatMessage>;
    async fn handle_reaction(&self, user_id: UserId, emoji: &str) -> Result<ChatMessage>;
    async fn handle_typing_start(&self, user_id: UserId) -> Result<()>;
    async fn handle_typing_stop(&self, user_id: UserId) -> Result<()>;
    async fn handle_shout(&self, user_id: UserId, body: &str) -> Result<ChatMessage>;
    async fn get_typing_users(&self) -> Vec<UserId>;
    async fn get_history(&self) -> Vec<ChatMessage>;
    async fn create_system_message(&self, body: &str) -> ChatMessage;
    async fn clear_typing(&self, user_id: UserId) -> Result<()>;
}

/// In-memory `ChatManager`, the default since chat persistence beyond a
/// room's lifetime is out of scope (spec §1 Non-goals).
pub struct InMemoryChatManager {
    history: Mutex<Vec<ChatMessage>>,
    typing: DashMap<UserId, ()>,
}

impl Default for InMemoryChatManager {
    fn default() -> Self {
        Self {
            history: Mutex::new(Vec::new()),
            typing: DashMap::new(),
        }
    }
}

impl InMemoryChatManager {
    pub fn new() -> Self {
        Self::default()
    }

    async fn push(&self, message: ChatMessage) -> ChatMessage {
        let mut history = self.history.lock().await;
        history.push(message.clone());
        message
    }
}

#[async_trait]
impl ChatManager for InMemoryChatManager {
    async fn initialize(&self, _room_code: &RoomCode) -> Result<()> {
        Ok(())
    }

    async fn handle_text_message(
        &self,
        user_id: UserId,
        display_name: &str,
        body: &str,
    ) -> Result<ChatMessage> {
        Ok(self
            .push(ChatMessage {
                id: Uuid::new_v4(),
                user_id,
                display_name: display_name.to_string(),
                body: body.to_string(),
                created_at_epoch_ms: now_epoch_ms(),
            })
            .await)
    }

    async fn handle_quick_chat(&self, user_id: UserId, phrase_id: &str) -> Result<ChatMessage> {
        self.handle_text_message(user_id, "", phrase_id).await
    }

    async fn handle_reaction(&self, user_id: UserId, emoji: &str) -> Result<ChatMessage> {
        self.handle_text_message(user_id, "", emoji).await
    }

    async fn handle_typing_start(&self, user_id: UserId) -> Result<()> {
        self.typing.insert(user_id, ());
        Ok(())
    }

    async fn handle_typing_stop(&self, user_id: UserId) -> Result<()> {
        self.typing.remove(&user_id);
        Ok(())
    }

    async fn handle_shout(&self, user_id: UserId, body: &str) -> Result<ChatMessage> {
        self.handle_text_message(user_id, "", body).await
    }

    async fn get_typing_users(&self) -> Vec<UserId> {
        self.typing.iter().map(|entry| *entry.key()).collect()
    }

    async fn get_history(&self) -> Vec<ChatMessage> {
        self.history.lock().await.clone()
    }

    async fn create_system_message(&self, body: &str) -> ChatMessage {
        self.push(ChatMessage {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            display_name: "system".to_string(),
            body: body.to_string(),
            created_at_epoch_ms: now_epoch_ms(),
        })
        .await
    }

    async fn clear_typing(&self, user_id: UserId) -> Result<()> {
        self.typing.remove(&user_id);
        Ok(())
    }
}

fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// ===========================================================================
// AIRoomManager
// ===========================================================================

/// Accessor/executor functions the AI runner is given instead of a
/// back-reference into the Room actor (spec §9 Design Notes: "pass the state
/// accessor and command executor as explicit functions").
pub type GetStateFn = Arc<dyn Fn() -> GameState + Send + Sync>;
pub type ExecuteCommandFn =
    Arc<dyn Fn(crate::protocol::RoomCommand) -> Result<()> + Send + Sync>;
pub type BroadcastFn = Arc<dyn Fn(crate::protocol::RoomEvent) + Send + Sync>;

#[async_trait]
pub trait AIRoomManager: Send + Sync {
    async fn initialize(&self, room_code: &RoomCode) -> Result<()>;
    async fn add_ai_player(&self, display_name: String) -> Result<AiPlayerInfo>;
    fn is_ai_player(&self, user_id: UserId) -> bool;
    async fn execute_ai_turn(
        &self,
        player_id: UserId,
        get_state: GetStateFn,
        execute_command: ExecuteCommandFn,
        broadcast: BroadcastFn,
    ) -> Result<()>;
}

/// Default AI: plays the first legal move each step (spec §4.7's per-step
/// loop), with no lookahead. Strategy quality is not a tested property.
pub struct SimpleAIRoomManager {
    ai_players: DashMap<UserId, AiPlayerInfo>,
}

impl Default for SimpleAIRoomManager {
    fn default() -> Self {
        Self {
            ai_players: DashMap::new(),
        }
    }
}

impl SimpleAIRoomManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AIRoomManager for SimpleAIRoomManager {
    async fn initialize(&self, _room_code: &RoomCode) -> Result<()> {
        Ok(())
    }

    async fn add_ai_player(&self, display_name: String) -> Result<AiPlayerInfo> {
        let user_id = Uuid::new_v4();
        let info = AiPlayerInfo {
            id: user_id.to_string(),
            profile_id: "default".to_string(),
            display_name,
            avatar_seed: Uuid::new_v4().to_string(),
        };
        self.ai_players.insert(user_id, info.clone());
        Ok(info)
    }

    fn is_ai_player(&self, user_id: UserId) -> bool {
        self.ai_players.contains_key(&user_id)
    }

    async fn execute_ai_turn(
        &self,
        player_id: UserId,
        get_state: GetStateFn,
        execute_command: ExecuteCommandFn,
        broadcast: BroadcastFn,
    ) -> Result<()> {
        use crate::protocol::RoomCommand;

        let state = get_state();
        if !state.is_current_player(player_id) {
            return Ok(());
        }

        if matches!(state.phase, Phase::TurnRoll) {
            execute_command(RoomCommand::DiceRoll { kept: None })?;
        } else if matches!(state.phase, Phase::TurnDecide) {
            let player = state
                .players
                .get(&player_id)
                .ok_or_else(|| anyhow::anyhow!("AI player missing from game state"))?;
            if player.rolls_remaining > 0 {
                execute_command(RoomCommand::DiceRoll { kept: None })?;
            } else {
                let category = Category::ALL
                    .iter()
                    .copied()
                    .find(|c| player.is_category_open(*c))
                    .ok_or_else(|| anyhow::anyhow!("no open category for AI player"))?;
                execute_command(RoomCommand::CategoryScore { category })?;
            }
        }

        let _ = broadcast;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn one_player_state() -> (GameState, UserId) {
        let user = Uuid::new_v4();
        let mut players = HashMap::new();
        players.insert(user, PlayerGameState::new(user, "Host".into(), false));
        (GameState::new(vec![user], players), user)
    }

    #[tokio::test]
    async fn roll_dice_decrements_rolls_remaining() {
        let (state, user) = one_player_state();
        let scorer = StandardScorer::new(state);
        let outcome = scorer.roll_dice(user, 0).await.unwrap();
        assert_eq!(outcome.rolls_remaining, 2);
        assert!(outcome.dice.iter().all(|&d| (1..=6).contains(&d)));
    }

    #[tokio::test]
    async fn roll_dice_fails_once_exhausted() {
        let (state, user) = one_player_state();
        let scorer = StandardScorer::new(state);
        scorer.roll_dice(user, 0).await.unwrap();
        scorer.roll_dice(user, 0).await.unwrap();
        scorer.roll_dice(user, 0).await.unwrap();
        assert!(scorer.roll_dice(user, 0).await.is_err());
    }

    #[tokio::test]
    async fn score_category_fails_before_any_roll() {
        let (state, user) = one_player_state();
        let scorer = StandardScorer::new(state);
        assert!(scorer.score_category(user, Category::Chance).await.is_err());
    }

    #[tokio::test]
    async fn score_category_chance_sums_all_dice() {
        let (mut state, user) = one_player_state();
        state.players.get_mut(&user).unwrap().current_dice = Some([1, 2, 3, 4, 5]);
        let scorer = StandardScorer::new(state);
        let outcome = scorer.score_category(user, Category::Chance).await.unwrap();
        assert_eq!(outcome.score, 15);
        assert_eq!(outcome.total_score, 15);
        assert!(outcome.game_completed);
    }

    #[tokio::test]
    async fn score_category_dicee_pays_fifty() {
        let (mut state, user) = one_player_state();
        state.players.get_mut(&user).unwrap().current_dice = Some([6, 6, 6, 6, 6]);
        let scorer = StandardScorer::new(state);
        let outcome = scorer.score_category(user, Category::Dicee).await.unwrap();
        assert_eq!(outcome.score, 50);
    }

    #[tokio::test]
    async fn skip_turn_forfeits_an_open_category() {
        let (state, user) = one_player_state();
        let scorer = StandardScorer::new(state);
        let outcome = scorer.skip_turn(user, "afk").await.unwrap();
        assert_eq!(outcome.score, 0);
        let state_after = scorer.get_state().await;
        assert!(!state_after
            .players
            .get(&user)
            .unwrap()
            .is_category_open(outcome.category_scored));
    }

    #[tokio::test]
    async fn reset_for_rematch_clears_scorecards() {
        let (mut state, user) = one_player_state();
        state
            .players
            .get_mut(&user)
            .unwrap()
            .scorecard
            .insert(Category::Ones, 3);
        let scorer = StandardScorer::new(state);
        scorer.reset_for_rematch().await.unwrap();
        let after = scorer.get_state().await;
        assert_eq!(after.players.get(&user).unwrap().categories_scored(), 0);
        assert_eq!(after.phase, Phase::TurnRoll);
    }

    #[tokio::test]
    async fn chat_manager_records_history_in_order() {
        let chat = InMemoryChatManager::new();
        let user = Uuid::new_v4();
        chat.handle_text_message(user, "Alice", "hello").await.unwrap();
        chat.handle_text_message(user, "Alice", "world").await.unwrap();
        let history = chat.get_history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].body, "world");
    }

    #[tokio::test]
    async fn chat_manager_typing_set_tracks_start_and_stop() {
        let chat = InMemoryChatManager::new();
        let user = Uuid::new_v4();
        chat.handle_typing_start(user).await.unwrap();
        assert_eq!(chat.get_typing_users().await, vec![user]);
        chat.handle_typing_stop(user).await.unwrap();
        assert!(chat.get_typing_users().await.is_empty());
    }

    #[tokio::test]
    async fn ai_room_manager_tracks_added_players() {
        let manager = SimpleAIRoomManager::new();
        let info = manager.add_ai_player("Bot".into()).await.unwrap();
        let ai_user_id = Uuid::parse_str(&info.id).unwrap();
        assert!(manager.is_ai_player(ai_user_id));
        assert!(!manager.is_ai_player(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn ai_turn_rolls_when_phase_is_turn_roll() {
        let manager = SimpleAIRoomManager::new();
        let (state, user) = one_player_state();
        let executed = Arc::new(std::sync::Mutex::new(Vec::new()));
        let executed_clone = executed.clone();
        let state_for_closure = state.clone();
        let get_state: GetStateFn = Arc::new(move || state_for_closure.clone());
        let execute_command: ExecuteCommandFn = Arc::new(move |cmd| {
            executed_clone.lock().unwrap().push(cmd);
            Ok(())
        });
        let broadcast: BroadcastFn = Arc::new(|_event| {});

        manager
            .execute_ai_turn(user, get_state, execute_command, broadcast)
            .await
            .unwrap();

        assert_eq!(executed.lock().unwrap().len(), 1);
    }
}
