use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::metrics::ServerMetrics;
use crate::protocol::{RoomCode, UserId};

/// Fixed-window request counter, reused for every time-windowed limit below.
#[derive(Debug, Clone)]
struct WindowedCounter {
    count: u32,
    window_start: Instant,
}

impl WindowedCounter {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
        }
    }

    fn maybe_reset(&mut self, window: Duration) {
        if self.window_start.elapsed() >= window {
            self.count = 0;
            self.window_start = Instant::now();
        }
    }

    fn try_consume(&mut self, limit: u32, window: Duration) -> bool {
        self.maybe_reset(window);
        if self.count < limit {
            self.count += 1;
            true
        } else {
            false
        }
    }

    fn time_until_reset(&self, window: Duration) -> Duration {
        window.saturating_sub(self.window_start.elapsed())
    }
}

/// Rate limiter for spectator engagement (reactions, rooting, predictions)
/// and lobby chat (spec §4.8, §4.10).
///
/// Reactions and lobby chat are time-windowed (`N per window`). Rooting
/// changes and predictions are scoped to a single game/turn instead — a
/// spectator gets a fixed budget per room or per `(turnNumber, playerId)`
/// key, with no time-based reset; the budget is cleared when the room (or
/// turn) goes away via [`Self::clear_room`] / [`Self::advance_turn`].
pub struct SpectatorRateLimiter {
    config: RateLimitConfig,
    reactions: Arc<RwLock<HashMap<UserId, WindowedCounter>>>,
    lobby_chat: Arc<RwLock<HashMap<UserId, WindowedCounter>>>,
    rooting_changes: Arc<RwLock<HashMap<(RoomCode, UserId), u32>>>,
    predictions: Arc<RwLock<HashMap<(RoomCode, u32, UserId), u32>>>,
    metrics: Option<Arc<ServerMetrics>>,
}

impl SpectatorRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            reactions: Arc::new(RwLock::new(HashMap::new())),
            lobby_chat: Arc::new(RwLock::new(HashMap::new())),
            rooting_changes: Arc::new(RwLock::new(HashMap::new())),
            predictions: Arc::new(RwLock::new(HashMap::new())),
            metrics: None,
        }
    }

    pub fn with_metrics(config: RateLimitConfig, metrics: Arc<ServerMetrics>) -> Self {
        metrics.record_rate_limit_limit(
            crate::metrics::RateLimitKind::Reaction,
            config.reaction_limit_count,
        );
        metrics.record_rate_limit_limit(
            crate::metrics::RateLimitKind::LobbyChat,
            config.lobby_chat_limit_count,
        );
        metrics.record_rate_limit_limit(
            crate::metrics::RateLimitKind::RootingChange,
            config.rooting_change_limit,
        );
        metrics.record_rate_limit_limit(
            crate::metrics::RateLimitKind::Prediction,
            config.prediction_limit_per_turn,
        );
        Self {
            config,
            reactions: Arc::new(RwLock::new(HashMap::new())),
            lobby_chat: Arc::new(RwLock::new(HashMap::new())),
            rooting_changes: Arc::new(RwLock::new(HashMap::new())),
            predictions: Arc::new(RwLock::new(HashMap::new())),
            metrics: Some(metrics),
        }
    }

    fn record_check(&self, kind: RateLimitKind) {
        if let Some(metrics) = &self.metrics {
            metrics.record_rate_limit_check(kind.into());
        }
    }

    fn record_rejection(&self, kind: RateLimitKind) {
        if let Some(metrics) = &self.metrics {
            metrics.record_rate_limit_rejection(kind.into());
        }
    }

    /// Check and consume one spectator reaction for `user_id`.
    pub async fn check_reaction(&self, user_id: UserId) -> Result<(), RateLimitError> {
        self.record_check(RateLimitKind::Reaction);
        let window = Duration::from_secs(self.config.reaction_limit_window_secs);
        let mut entries = self.reactions.write().await;
        let entry = entries.entry(user_id).or_insert_with(WindowedCounter::new);
        if entry.try_consume(self.config.reaction_limit_count, window) {
            Ok(())
        } else {
            let retry_after = entry.time_until_reset(window);
            drop(entries);
            self.record_rejection(RateLimitKind::Reaction);
            Err(RateLimitError::Exceeded {
                kind: RateLimitKind::Reaction,
                retry_after,
            })
        }
    }

    /// Check and consume one lobby chat message for `user_id`.
    pub async fn check_lobby_chat(&self, user_id: UserId) -> Result<(), RateLimitError> {
        self.record_check(RateLimitKind::LobbyChat);
        let window = Duration::from_secs(self.config.lobby_chat_limit_window_secs);
        let mut entries = self.lobby_chat.write().await;
        let entry = entries.entry(user_id).or_insert_with(WindowedCounter::new);
        if entry.try_consume(self.config.lobby_chat_limit_count, window) {
            Ok(())
        } else {
            let retry_after = entry.time_until_reset(window);
            drop(entries);
            self.record_rejection(RateLimitKind::LobbyChat);
            Err(RateLimitError::Exceeded {
                kind: RateLimitKind::LobbyChat,
                retry_after,
            })
        }
    }

    /// Check and consume one rooting change for `user_id` within `room`.
    pub async fn check_rooting_change(
        &self,
        room: &RoomCode,
        user_id: UserId,
    ) -> Result<(), RateLimitError> {
        self.record_check(RateLimitKind::RootingChange);
        let mut entries = self.rooting_changes.write().await;
        let count = entries.entry((room.clone(), user_id)).or_insert(0);
        if *count < self.config.rooting_change_limit {
            *count += 1;
            Ok(())
        } else {
            drop(entries);
            self.record_rejection(RateLimitKind::RootingChange);
            Err(RateLimitError::Exceeded {
                kind: RateLimitKind::RootingChange,
                retry_after: Duration::ZERO,
            })
        }
    }

    /// Check and consume one prediction slot for `user_id`, scoped to a
    /// specific turn and the player being predicted about.
    pub async fn check_prediction(
        &self,
        room: &RoomCode,
        turn_number: u32,
        user_id: UserId,
    ) -> Result<(), RateLimitError> {
        self.record_check(RateLimitKind::Prediction);
        let mut entries = self.predictions.write().await;
        let count = entries
            .entry((room.clone(), turn_number, user_id))
            .or_insert(0);
        if *count < self.config.prediction_limit_per_turn {
            *count += 1;
            Ok(())
        } else {
            drop(entries);
            self.record_rejection(RateLimitKind::Prediction);
            Err(RateLimitError::Exceeded {
                kind: RateLimitKind::Prediction,
                retry_after: Duration::ZERO,
            })
        }
    }

    /// Drop all per-room counters when a room closes.
    pub async fn clear_room(&self, room: &RoomCode) {
        self.rooting_changes
            .write()
            .await
            .retain(|(code, _), _| code != room);
        self.predictions
            .write()
            .await
            .retain(|(code, _, _), _| code != room);
    }

    /// Start a background task to periodically clean up stale windowed
    /// entries so memory doesn't grow unbounded for long-lived lobbies.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let reaction_window = Duration::from_secs(self.config.reaction_limit_window_secs);
            let chat_window = Duration::from_secs(self.config.lobby_chat_limit_window_secs);
            let interval_duration = reaction_window.max(chat_window).max(Duration::from_secs(1));
            let mut interval = tokio::time::interval(interval_duration);
            loop {
                interval.tick().await;
                self.cleanup_old_entries(reaction_window, chat_window).await;
            }
        });
    }

    async fn cleanup_old_entries(&self, reaction_window: Duration, chat_window: Duration) {
        let cleanup_threshold = |window: Duration| window * 2;
        self.reactions.write().await.retain(|_, entry| {
            entry.window_start.elapsed() < cleanup_threshold(reaction_window)
        });
        self.lobby_chat.write().await.retain(|_, entry| {
            entry.window_start.elapsed() < cleanup_threshold(chat_window)
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKind {
    Reaction,
    LobbyChat,
    RootingChange,
    Prediction,
}

#[derive(Debug, Clone)]
pub enum RateLimitError {
    Exceeded {
        kind: RateLimitKind,
        retry_after: Duration,
    },
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exceeded { kind, retry_after } => {
                write!(
                    f,
                    "{kind:?} rate limit exceeded. Try again in {} seconds.",
                    retry_after.as_secs()
                )
            }
        }
    }
}

impl std::error::Error for RateLimitError {}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            reaction_limit_count: 2,
            reaction_limit_window_secs: 1,
            lobby_chat_limit_count: 2,
            lobby_chat_limit_window_secs: 1,
            rooting_change_limit: 2,
            prediction_limit_per_turn: 1,
        }
    }

    #[tokio::test]
    async fn reaction_limit_enforced_and_resets() {
        let limiter = SpectatorRateLimiter::new(test_config());
        let user = UserId::from(Uuid::new_v4());

        assert!(limiter.check_reaction(user).await.is_ok());
        assert!(limiter.check_reaction(user).await.is_ok());
        assert!(limiter.check_reaction(user).await.is_err());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.check_reaction(user).await.is_ok());
    }

    #[tokio::test]
    async fn rooting_change_limit_is_per_room_not_time_windowed() {
        let limiter = SpectatorRateLimiter::new(test_config());
        let user = UserId::from(Uuid::new_v4());
        let room = RoomCode::from("ABCDEF".to_string());

        assert!(limiter.check_rooting_change(&room, user).await.is_ok());
        assert!(limiter.check_rooting_change(&room, user).await.is_ok());
        assert!(limiter.check_rooting_change(&room, user).await.is_err());

        limiter.clear_room(&room).await;
        assert!(limiter.check_rooting_change(&room, user).await.is_ok());
    }

    #[tokio::test]
    async fn prediction_limit_scoped_to_turn() {
        let limiter = SpectatorRateLimiter::new(test_config());
        let user = UserId::from(Uuid::new_v4());
        let room = RoomCode::from("ABCDEF".to_string());

        assert!(limiter.check_prediction(&room, 1, user).await.is_ok());
        assert!(limiter.check_prediction(&room, 1, user).await.is_err());
        assert!(limiter.check_prediction(&room, 2, user).await.is_ok());
    }

    #[tokio::test]
    async fn different_users_have_independent_limits() {
        let limiter = SpectatorRateLimiter::new(test_config());
        let user1 = UserId::from(Uuid::new_v4());
        let user2 = UserId::from(Uuid::new_v4());

        assert!(limiter.check_reaction(user1).await.is_ok());
        assert!(limiter.check_reaction(user1).await.is_ok());
        assert!(limiter.check_reaction(user1).await.is_err());

        assert!(limiter.check_reaction(user2).await.is_ok());
    }

    #[tokio::test]
    async fn metrics_hooks_record_checks_and_rejections() {
        use crate::metrics::ServerMetrics;
        use std::sync::atomic::Ordering;

        let metrics = Arc::new(ServerMetrics::new());
        let limiter = SpectatorRateLimiter::with_metrics(test_config(), metrics.clone());
        let user = UserId::from(Uuid::new_v4());

        assert!(limiter.check_reaction(user).await.is_ok());
        assert!(limiter.check_reaction(user).await.is_ok());
        assert!(limiter.check_reaction(user).await.is_err());

        assert_eq!(metrics.rate_limit_reaction_checks.load(Ordering::Relaxed), 3);
        assert_eq!(
            metrics.rate_limit_reaction_rejections.load(Ordering::Relaxed),
            1
        );
        assert_eq!(metrics.rate_limit_reaction_limit.load(Ordering::Relaxed), 2);
    }
}
