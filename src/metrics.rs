use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Comprehensive metrics collection for the Dicee room/lobby server.
#[derive(Debug)]
pub struct ServerMetrics {
    // Connection metrics
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub disconnections: AtomicU64,
    pub connection_errors: AtomicU64,
    pub websocket_messages_dropped: AtomicU64,

    // Room lifecycle metrics
    pub rooms_created: AtomicU64,
    pub rooms_joined: AtomicU64,
    pub room_creation_failures: AtomicU64,
    pub room_join_failures: AtomicU64,
    pub rooms_deleted: AtomicU64,

    // Room code generation and retry metrics
    pub room_code_collisions: AtomicU64,
    pub retry_attempts: AtomicU64,
    pub retry_successes: AtomicU64,

    // Game lifecycle metrics (spec §4.4-§4.5)
    pub games_started: AtomicU64,
    pub games_completed: AtomicU64,
    pub turns_played: AtomicU64,
    pub dice_rolls: AtomicU64,
    pub category_scores: AtomicU64,
    pub rematches_started: AtomicU64,
    pub ai_players_added: AtomicU64,
    pub ai_moves_made: AtomicU64,
    pub ai_turn_timeouts: AtomicU64,

    // Alarm metrics (spec §4.6)
    pub alarms_scheduled: AtomicU64,
    pub alarms_fired: AtomicU64,
    pub alarms_cancelled: AtomicU64,

    // Spectator engagement metrics (spec §4.8)
    pub spectators_joined: AtomicU64,
    pub spectators_left: AtomicU64,
    pub spectator_reactions: AtomicU64,
    pub predictions_made: AtomicU64,
    pub rooting_changes: AtomicU64,
    pub kibitz_votes: AtomicU64,
    pub warm_seat_promotions: AtomicU64,

    // Lobby metrics (spec §4.9-§4.10)
    pub lobby_chat_messages: AtomicU64,
    pub invites_sent: AtomicU64,
    pub join_requests_received: AtomicU64,
    pub join_requests_approved: AtomicU64,

    // Performance metrics
    pub query_count: AtomicU64,
    pub average_response_times: Arc<RwLock<ResponseTimeTracker>>,
    pub dashboard_cache_last_refresh_epoch: AtomicU64,
    pub dashboard_cache_refresh_failures: AtomicU64,
    pub latency_histogram_clamped_samples: AtomicU64,

    // Rate limiting metrics, one counter family per spectator/lobby limit
    pub rate_limit_rejections: AtomicU64,
    pub rate_limit_resets: AtomicU64,
    pub rate_limit_reaction_limit: AtomicU64,
    pub rate_limit_lobby_chat_limit: AtomicU64,
    pub rate_limit_rooting_limit: AtomicU64,
    pub rate_limit_prediction_limit: AtomicU64,
    pub rate_limit_reaction_checks: AtomicU64,
    pub rate_limit_lobby_chat_checks: AtomicU64,
    pub rate_limit_rooting_checks: AtomicU64,
    pub rate_limit_prediction_checks: AtomicU64,
    pub rate_limit_reaction_rejections: AtomicU64,
    pub rate_limit_lobby_chat_rejections: AtomicU64,
    pub rate_limit_rooting_rejections: AtomicU64,
    pub rate_limit_prediction_rejections: AtomicU64,

    // Player activity metrics
    pub players_joined: AtomicU64,
    pub players_left: AtomicU64,

    // Heartbeat throttling metrics
    /// Updates performed for player last_seen timestamps
    pub heartbeat_updates: AtomicU64,
    /// Updates skipped due to threshold-based throttling
    pub heartbeat_skipped: AtomicU64,

    // Reconnection metrics
    pub reconnection_tokens_issued: AtomicU64,
    pub reconnection_sessions_active: AtomicU64,
    pub reconnection_validations_failed: AtomicU64,
    pub reconnection_completions: AtomicU64,
    pub reconnection_events_buffered: AtomicU64,

    // Error tracking
    pub validation_errors: AtomicU64,
    pub internal_errors: AtomicU64,
    pub websocket_errors: AtomicU64,

    // Cleanup metrics
    pub abandoned_rooms_cleaned: AtomicU64,
    pub expired_seats_cleaned: AtomicU64,
    pub expired_join_requests_cleaned: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKind {
    Reaction,
    LobbyChat,
    RootingChange,
    Prediction,
}

impl From<crate::rate_limit::RateLimitKind> for RateLimitKind {
    fn from(kind: crate::rate_limit::RateLimitKind) -> Self {
        match kind {
            crate::rate_limit::RateLimitKind::Reaction => Self::Reaction,
            crate::rate_limit::RateLimitKind::LobbyChat => Self::LobbyChat,
            crate::rate_limit::RateLimitKind::RootingChange => Self::RootingChange,
            crate::rate_limit::RateLimitKind::Prediction => Self::Prediction,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseTimeTracker {
    operations: HashMap<String, OperationLatencyHistogram>,
    lowest_discernible_micros: u64,
    highest_trackable_micros: u64,
    significant_figures: u8,
}

const DEFAULT_LOWEST_DISCERNIBLE_MICROS: u64 = 1;
const DEFAULT_HIGHEST_TRACKABLE_MICROS: u64 = 300_000_000; // 5 minutes in microseconds
const DEFAULT_SIGNIFICANT_FIGURES: u8 = 3;

#[derive(Debug, Clone)]
struct OperationLatencyHistogram {
    /// Optional histogram - None if all creation attempts failed (should be rare)
    histogram: Option<Histogram<u64>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub connections: ConnectionMetrics,
    pub rooms: RoomMetrics,
    pub retries: RetryMetrics,
    pub games: GameMetrics,
    pub alarms: AlarmMetrics,
    pub spectators: SpectatorMetrics,
    pub lobby: LobbyMetrics,
    pub performance: PerformanceMetrics,
    pub dashboard_cache: DashboardCacheMetrics,
    pub rate_limiting: RateLimitingMetrics,
    pub players: PlayerMetrics,
    pub errors: ErrorMetrics,
    pub cleanup: CleanupMetrics,
    pub reconnection: ReconnectionMetrics,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectionMetrics {
    pub total_connections: u64,
    pub active_connections: u64,
    pub disconnections: u64,
    pub connection_errors: u64,
    pub websocket_messages_dropped: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RoomMetrics {
    pub rooms_created: u64,
    pub rooms_joined: u64,
    pub room_creation_failures: u64,
    pub room_join_failures: u64,
    pub rooms_deleted: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryMetrics {
    pub room_code_collisions: u64,
    pub retry_attempts: u64,
    pub retry_successes: u64,
    pub retry_success_rate: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GameMetrics {
    pub games_started: u64,
    pub games_completed: u64,
    pub turns_played: u64,
    pub dice_rolls: u64,
    pub category_scores: u64,
    pub rematches_started: u64,
    pub ai_players_added: u64,
    pub ai_moves_made: u64,
    pub ai_turn_timeouts: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AlarmMetrics {
    pub alarms_scheduled: u64,
    pub alarms_fired: u64,
    pub alarms_cancelled: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpectatorMetrics {
    pub spectators_joined: u64,
    pub spectators_left: u64,
    pub spectator_reactions: u64,
    pub predictions_made: u64,
    pub rooting_changes: u64,
    pub kibitz_votes: u64,
    pub warm_seat_promotions: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LobbyMetrics {
    pub lobby_chat_messages: u64,
    pub invites_sent: u64,
    pub join_requests_received: u64,
    pub join_requests_approved: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PerformanceMetrics {
    pub query_count: u64,
    pub average_room_creation_ms: Option<f64>,
    pub average_room_join_ms: Option<f64>,
    pub average_query_ms: Option<f64>,
    pub room_creation_latency: OperationLatencyMetrics,
    pub room_join_latency: OperationLatencyMetrics,
    pub query_latency: OperationLatencyMetrics,
    pub latency_histogram_clamped_samples: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default)]
pub struct OperationLatencyMetrics {
    pub average_ms: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub sample_count: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RateLimitingMetrics {
    pub rate_limit_rejections: u64,
    pub rate_limit_resets: u64,
    pub reaction_limit: u64,
    pub lobby_chat_limit: u64,
    pub rooting_limit: u64,
    pub prediction_limit: u64,
    pub reaction_checks: u64,
    pub lobby_chat_checks: u64,
    pub rooting_checks: u64,
    pub prediction_checks: u64,
    pub reaction_rejections: u64,
    pub lobby_chat_rejections: u64,
    pub rooting_rejections: u64,
    pub prediction_rejections: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlayerMetrics {
    pub players_joined: u64,
    pub players_left: u64,
    /// Updates performed for player last_seen timestamps
    pub heartbeat_updates: u64,
    /// Updates skipped due to threshold-based throttling
    pub heartbeat_skipped: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReconnectionMetrics {
    pub tokens_issued: u64,
    pub sessions_active: u64,
    pub validations_failed: u64,
    pub completions: u64,
    pub events_buffered: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorMetrics {
    pub validation_errors: u64,
    pub internal_errors: u64,
    pub websocket_errors: u64,
    pub total_errors: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CleanupMetrics {
    pub abandoned_rooms_cleaned: u64,
    pub expired_seats_cleaned: u64,
    pub expired_join_requests_cleaned: u64,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            disconnections: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            websocket_messages_dropped: AtomicU64::new(0),
            rooms_created: AtomicU64::new(0),
            rooms_joined: AtomicU64::new(0),
            room_creation_failures: AtomicU64::new(0),
            room_join_failures: AtomicU64::new(0),
            rooms_deleted: AtomicU64::new(0),
            room_code_collisions: AtomicU64::new(0),
            retry_attempts: AtomicU64::new(0),
            retry_successes: AtomicU64::new(0),
            games_started: AtomicU64::new(0),
            games_completed: AtomicU64::new(0),
            turns_played: AtomicU64::new(0),
            dice_rolls: AtomicU64::new(0),
            category_scores: AtomicU64::new(0),
            rematches_started: AtomicU64::new(0),
            ai_players_added: AtomicU64::new(0),
            ai_moves_made: AtomicU64::new(0),
            ai_turn_timeouts: AtomicU64::new(0),
            alarms_scheduled: AtomicU64::new(0),
            alarms_fired: AtomicU64::new(0),
            alarms_cancelled: AtomicU64::new(0),
            spectators_joined: AtomicU64::new(0),
            spectators_left: AtomicU64::new(0),
            spectator_reactions: AtomicU64::new(0),
            predictions_made: AtomicU64::new(0),
            rooting_changes: AtomicU64::new(0),
            kibitz_votes: AtomicU64::new(0),
            warm_seat_promotions: AtomicU64::new(0),
            lobby_chat_messages: AtomicU64::new(0),
            invites_sent: AtomicU64::new(0),
            join_requests_received: AtomicU64::new(0),
            join_requests_approved: AtomicU64::new(0),
            query_count: AtomicU64::new(0),
            average_response_times: Arc::new(RwLock::new(ResponseTimeTracker::new())),
            dashboard_cache_last_refresh_epoch: AtomicU64::new(0),
            dashboard_cache_refresh_failures: AtomicU64::new(0),
            latency_histogram_clamped_samples: AtomicU64::new(0),
            rate_limit_rejections: AtomicU64::new(0),
            rate_limit_resets: AtomicU64::new(0),
            rate_limit_reaction_limit: AtomicU64::new(0),
            rate_limit_lobby_chat_limit: AtomicU64::new(0),
            rate_limit_rooting_limit: AtomicU64::new(0),
            rate_limit_prediction_limit: AtomicU64::new(0),
            rate_limit_reaction_checks: AtomicU64::new(0),
            rate_limit_lobby_chat_checks: AtomicU64::new(0),
            rate_limit_rooting_checks: AtomicU64::new(0),
            rate_limit_prediction_checks: AtomicU64::new(0),
            rate_limit_reaction_rejections: AtomicU64::new(0),
            rate_limit_lobby_chat_rejections: AtomicU64::new(0),
            rate_limit_rooting_rejections: AtomicU64::new(0),
            rate_limit_prediction_rejections: AtomicU64::new(0),
            players_joined: AtomicU64::new(0),
            players_left: AtomicU64::new(0),
            heartbeat_updates: AtomicU64::new(0),
            heartbeat_skipped: AtomicU64::new(0),
            reconnection_tokens_issued: AtomicU64::new(0),
            reconnection_sessions_active: AtomicU64::new(0),
            reconnection_validations_failed: AtomicU64::new(0),
            reconnection_completions: AtomicU64::new(0),
            reconnection_events_buffered: AtomicU64::new(0),
            validation_errors: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
            websocket_errors: AtomicU64::new(0),
            abandoned_rooms_cleaned: AtomicU64::new(0),
            expired_seats_cleaned: AtomicU64::new(0),
            expired_join_requests_cleaned: AtomicU64::new(0),
        }
    }

    // Connection metrics
    pub fn increment_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        let _ =
            self.active_connections
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                    if current > 0 {
                        Some(current - 1)
                    } else {
                        None
                    }
                });
        self.disconnections.fetch_add(1, Ordering::Relaxed);
    }

    #[allow(dead_code)]
    pub fn increment_connection_errors(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_websocket_messages_dropped(&self) {
        self.websocket_messages_dropped
            .fetch_add(1, Ordering::Relaxed);
    }

    // Room lifecycle metrics
    pub fn increment_rooms_created(&self) {
        self.rooms_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_joined(&self) {
        self.rooms_joined.fetch_add(1, Ordering::Relaxed);
    }

    #[allow(dead_code)]
    pub fn increment_room_creation_failures(&self) {
        self.room_creation_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[allow(dead_code)]
    pub fn increment_room_join_failures(&self) {
        self.room_join_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_deleted(&self) {
        self.rooms_deleted.fetch_add(1, Ordering::Relaxed);
    }

    // Room code generation and retry metrics
    pub fn increment_room_code_collisions(&self) {
        self.room_code_collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retry_attempts(&self) {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retry_successes(&self) {
        self.retry_successes.fetch_add(1, Ordering::Relaxed);
    }

    // Game lifecycle metrics
    pub fn increment_games_started(&self) {
        self.games_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_games_completed(&self) {
        self.games_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_turns_played(&self) {
        self.turns_played.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_dice_rolls(&self) {
        self.dice_rolls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_category_scores(&self) {
        self.category_scores.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rematches_started(&self) {
        self.rematches_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_ai_players_added(&self) {
        self.ai_players_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_ai_moves_made(&self) {
        self.ai_moves_made.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_ai_turn_timeouts(&self) {
        self.ai_turn_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    // Alarm metrics
    pub fn increment_alarms_scheduled(&self) {
        self.alarms_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_alarms_fired(&self) {
        self.alarms_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_alarms_cancelled(&self) {
        self.alarms_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    // Spectator engagement metrics
    pub fn increment_spectators_joined(&self) {
        self.spectators_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_spectators_left(&self) {
        self.spectators_left.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_spectator_reactions(&self) {
        self.spectator_reactions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_predictions_made(&self) {
        self.predictions_made.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooting_changes(&self) {
        self.rooting_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_kibitz_votes(&self) {
        self.kibitz_votes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_warm_seat_promotions(&self) {
        self.warm_seat_promotions.fetch_add(1, Ordering::Relaxed);
    }

    // Lobby metrics
    pub fn increment_lobby_chat_messages(&self) {
        self.lobby_chat_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_invites_sent(&self) {
        self.invites_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_join_requests_received(&self) {
        self.join_requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_join_requests_approved(&self) {
        self.join_requests_approved.fetch_add(1, Ordering::Relaxed);
    }

    // Performance metrics
    pub fn increment_query_count(&self) {
        self.query_count.fetch_add(1, Ordering::Relaxed);
    }

    #[allow(dead_code)]
    pub async fn record_response_time(&self, operation: &str, duration: Duration) {
        let mut tracker = self.average_response_times.write().await;
        let clamped = tracker.add_sample(operation, duration);
        drop(tracker);
        if clamped {
            self.increment_latency_histogram_clamps();
        }
    }

    pub fn set_dashboard_cache_last_refresh(&self, timestamp: chrono::DateTime<chrono::Utc>) {
        let epoch = timestamp.timestamp().max(0) as u64;
        self.dashboard_cache_last_refresh_epoch
            .store(epoch, Ordering::Relaxed);
    }

    pub fn increment_dashboard_cache_refresh_failures(&self) {
        self.dashboard_cache_refresh_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_latency_histogram_clamps(&self) {
        self.latency_histogram_clamped_samples
            .fetch_add(1, Ordering::Relaxed);
    }

    // Rate limiting metrics
    pub fn record_rate_limit_limit(&self, kind: RateLimitKind, limit: u32) {
        let limit = u64::from(limit);
        match kind {
            RateLimitKind::Reaction => self.rate_limit_reaction_limit.store(limit, Ordering::Relaxed),
            RateLimitKind::LobbyChat => {
                self.rate_limit_lobby_chat_limit.store(limit, Ordering::Relaxed);
            }
            RateLimitKind::RootingChange => self.rate_limit_rooting_limit.store(limit, Ordering::Relaxed),
            RateLimitKind::Prediction => {
                self.rate_limit_prediction_limit.store(limit, Ordering::Relaxed);
            }
        }
    }

    pub fn record_rate_limit_check(&self, kind: RateLimitKind) {
        match kind {
            RateLimitKind::Reaction => {
                self.rate_limit_reaction_checks.fetch_add(1, Ordering::Relaxed);
            }
            RateLimitKind::LobbyChat => {
                self.rate_limit_lobby_chat_checks
                    .fetch_add(1, Ordering::Relaxed);
            }
            RateLimitKind::RootingChange => {
                self.rate_limit_rooting_checks.fetch_add(1, Ordering::Relaxed);
            }
            RateLimitKind::Prediction => {
                self.rate_limit_prediction_checks
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn record_rate_limit_rejection(&self, kind: RateLimitKind) {
        self.rate_limit_rejections.fetch_add(1, Ordering::Relaxed);
        match kind {
            RateLimitKind::Reaction => {
                self.rate_limit_reaction_rejections
                    .fetch_add(1, Ordering::Relaxed);
            }
            RateLimitKind::LobbyChat => {
                self.rate_limit_lobby_chat_rejections
                    .fetch_add(1, Ordering::Relaxed);
            }
            RateLimitKind::RootingChange => {
                self.rate_limit_rooting_rejections
                    .fetch_add(1, Ordering::Relaxed);
            }
            RateLimitKind::Prediction => {
                self.rate_limit_prediction_rejections
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[allow(dead_code)]
    pub fn increment_rate_limit_resets(&self) {
        self.rate_limit_resets.fetch_add(1, Ordering::Relaxed);
    }

    // Player activity metrics
    pub fn increment_players_joined(&self) {
        self.players_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_players_left(&self) {
        self.players_left.fetch_add(1, Ordering::Relaxed);
    }

    // Heartbeat throttling metrics
    pub fn increment_heartbeat_updates(&self) {
        self.heartbeat_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_heartbeat_skipped(&self) {
        self.heartbeat_skipped.fetch_add(1, Ordering::Relaxed);
    }

    // Reconnection metrics
    pub fn increment_reconnection_tokens_issued(&self) {
        self.reconnection_tokens_issued
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconnection_sessions_active(&self) {
        self.reconnection_sessions_active
            .fetch_add(1, Ordering::Relaxed);
    }

    #[allow(dead_code)]
    pub fn set_reconnection_sessions_active(&self, value: u64) {
        self.reconnection_sessions_active
            .store(value, Ordering::Relaxed);
    }

    pub fn decrement_reconnection_sessions_active(&self) {
        let _ = self.reconnection_sessions_active.fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |current| {
                if current > 0 {
                    Some(current - 1)
                } else {
                    None
                }
            },
        );
    }

    pub fn increment_reconnection_validation_failure(&self) {
        self.reconnection_validations_failed
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconnection_completions(&self) {
        self.reconnection_completions
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_reconnection_events_buffered(&self, count: u64) {
        if count > 0 {
            self.reconnection_events_buffered
                .fetch_add(count, Ordering::Relaxed);
        }
    }

    // Error tracking
    #[allow(dead_code)]
    pub fn increment_validation_errors(&self) {
        self.validation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_internal_errors(&self) {
        self.internal_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[allow(dead_code)]
    pub fn increment_websocket_errors(&self) {
        self.websocket_errors.fetch_add(1, Ordering::Relaxed);
    }

    // Cleanup metrics
    pub fn add_abandoned_rooms_cleaned(&self, count: u64) {
        self.abandoned_rooms_cleaned
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_expired_seats_cleaned(&self, count: u64) {
        self.expired_seats_cleaned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_expired_join_requests_cleaned(&self, count: u64) {
        self.expired_join_requests_cleaned
            .fetch_add(count, Ordering::Relaxed);
    }

    // Snapshot generation
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let tracker = self.average_response_times.read().await;
        let room_creation_latency = tracker
            .get_latency_metrics("room_creation")
            .unwrap_or_default();
        let room_join_latency = tracker.get_latency_metrics("room_join").unwrap_or_default();
        let query_latency = tracker.get_latency_metrics("query").unwrap_or_default();

        let retry_attempts = self.retry_attempts.load(Ordering::Relaxed);
        let retry_successes = self.retry_successes.load(Ordering::Relaxed);
        let retry_success_rate = if retry_attempts > 0 {
            (retry_successes as f64) / (retry_attempts as f64)
        } else {
            1.0
        };

        let validation_errors = self.validation_errors.load(Ordering::Relaxed);
        let internal_errors = self.internal_errors.load(Ordering::Relaxed);
        let websocket_errors = self.websocket_errors.load(Ordering::Relaxed);
        let total_errors = validation_errors + internal_errors + websocket_errors;

        MetricsSnapshot {
            timestamp: chrono::Utc::now(),
            connections: ConnectionMetrics {
                total_connections: self.total_connections.load(Ordering::Relaxed),
                active_connections: self.active_connections.load(Ordering::Relaxed),
                disconnections: self.disconnections.load(Ordering::Relaxed),
                connection_errors: self.connection_errors.load(Ordering::Relaxed),
                websocket_messages_dropped: self.websocket_messages_dropped.load(Ordering::Relaxed),
            },
            rooms: RoomMetrics {
                rooms_created: self.rooms_created.load(Ordering::Relaxed),
                rooms_joined: self.rooms_joined.load(Ordering::Relaxed),
                room_creation_failures: self.room_creation_failures.load(Ordering::Relaxed),
                room_join_failures: self.room_join_failures.load(Ordering::Relaxed),
                rooms_deleted: self.rooms_deleted.load(Ordering::Relaxed),
            },
            retries: RetryMetrics {
                room_code_collisions: self.room_code_collisions.load(Ordering::Relaxed),
                retry_attempts,
                retry_successes,
                retry_success_rate,
            },
            games: GameMetrics {
                games_started: self.games_started.load(Ordering::Relaxed),
                games_completed: self.games_completed.load(Ordering::Relaxed),
                turns_played: self.turns_played.load(Ordering::Relaxed),
                dice_rolls: self.dice_rolls.load(Ordering::Relaxed),
                category_scores: self.category_scores.load(Ordering::Relaxed),
                rematches_started: self.rematches_started.load(Ordering::Relaxed),
                ai_players_added: self.ai_players_added.load(Ordering::Relaxed),
                ai_moves_made: self.ai_moves_made.load(Ordering::Relaxed),
                ai_turn_timeouts: self.ai_turn_timeouts.load(Ordering::Relaxed),
            },
            alarms: AlarmMetrics {
                alarms_scheduled: self.alarms_scheduled.load(Ordering::Relaxed),
                alarms_fired: self.alarms_fired.load(Ordering::Relaxed),
                alarms_cancelled: self.alarms_cancelled.load(Ordering::Relaxed),
            },
            spectators: SpectatorMetrics {
                spectators_joined: self.spectators_joined.load(Ordering::Relaxed),
                spectators_left: self.spectators_left.load(Ordering::Relaxed),
                spectator_reactions: self.spectator_reactions.load(Ordering::Relaxed),
                predictions_made: self.predictions_made.load(Ordering::Relaxed),
                rooting_changes: self.rooting_changes.load(Ordering::Relaxed),
                kibitz_votes: self.kibitz_votes.load(Ordering::Relaxed),
                warm_seat_promotions: self.warm_seat_promotions.load(Ordering::Relaxed),
            },
            lobby: LobbyMetrics {
                lobby_chat_messages: self.lobby_chat_messages.load(Ordering::Relaxed),
                invites_sent: self.invites_sent.load(Ordering::Relaxed),
                join_requests_received: self.join_requests_received.load(Ordering::Relaxed),
                join_requests_approved: self.join_requests_approved.load(Ordering::Relaxed),
            },
            performance: PerformanceMetrics {
                query_count: self.query_count.load(Ordering::Relaxed),
                average_room_creation_ms: room_creation_latency.average_ms,
                average_room_join_ms: room_join_latency.average_ms,
                average_query_ms: query_latency.average_ms,
                room_creation_latency,
                room_join_latency,
                query_latency,
                latency_histogram_clamped_samples: self
                    .latency_histogram_clamped_samples
                    .load(Ordering::Relaxed),
            },
            dashboard_cache: DashboardCacheMetrics {
                refresh_count: 0,
                refresh_errors: 0,
                last_refresh_timestamp: self
                    .dashboard_cache_last_refresh_epoch
                    .load(Ordering::Relaxed),
                refresh_failures: self
                    .dashboard_cache_refresh_failures
                    .load(Ordering::Relaxed),
            },
            rate_limiting: RateLimitingMetrics {
                rate_limit_rejections: self.rate_limit_rejections.load(Ordering::Relaxed),
                rate_limit_resets: self.rate_limit_resets.load(Ordering::Relaxed),
                reaction_limit: self.rate_limit_reaction_limit.load(Ordering::Relaxed),
                lobby_chat_limit: self.rate_limit_lobby_chat_limit.load(Ordering::Relaxed),
                rooting_limit: self.rate_limit_rooting_limit.load(Ordering::Relaxed),
                prediction_limit: self.rate_limit_prediction_limit.load(Ordering::Relaxed),
                reaction_checks: self.rate_limit_reaction_checks.load(Ordering::Relaxed),
                lobby_chat_checks: self.rate_limit_lobby_chat_checks.load(Ordering::Relaxed),
                rooting_checks: self.rate_limit_rooting_checks.load(Ordering::Relaxed),
                prediction_checks: self.rate_limit_prediction_checks.load(Ordering::Relaxed),
                reaction_rejections: self.rate_limit_reaction_rejections.load(Ordering::Relaxed),
                lobby_chat_rejections: self
                    .rate_limit_lobby_chat_rejections
                    .load(Ordering::Relaxed),
                rooting_rejections: self.rate_limit_rooting_rejections.load(Ordering::Relaxed),
                prediction_rejections: self
                    .rate_limit_prediction_rejections
                    .load(Ordering::Relaxed),
            },
            players: PlayerMetrics {
                players_joined: self.players_joined.load(Ordering::Relaxed),
                players_left: self.players_left.load(Ordering::Relaxed),
                heartbeat_updates: self.heartbeat_updates.load(Ordering::Relaxed),
                heartbeat_skipped: self.heartbeat_skipped.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                validation_errors,
                internal_errors,
                websocket_errors,
                total_errors,
            },
            cleanup: CleanupMetrics {
                abandoned_rooms_cleaned: self.abandoned_rooms_cleaned.load(Ordering::Relaxed),
                expired_seats_cleaned: self.expired_seats_cleaned.load(Ordering::Relaxed),
                expired_join_requests_cleaned: self
                    .expired_join_requests_cleaned
                    .load(Ordering::Relaxed),
            },
            reconnection: ReconnectionMetrics {
                tokens_issued: self.reconnection_tokens_issued.load(Ordering::Relaxed),
                sessions_active: self.reconnection_sessions_active.load(Ordering::Relaxed),
                validations_failed: self.reconnection_validations_failed.load(Ordering::Relaxed),
                completions: self.reconnection_completions.load(Ordering::Relaxed),
                events_buffered: self.reconnection_events_buffered.load(Ordering::Relaxed),
            },
        }
    }

    /// Get a human-readable health status based on metrics
    #[allow(dead_code)]
    pub async fn health_status(&self) -> HealthStatus {
        let snapshot = self.snapshot().await;

        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        let total_operations = snapshot.rooms.rooms_created + snapshot.rooms.rooms_joined;
        let total_failures =
            snapshot.rooms.room_creation_failures + snapshot.rooms.room_join_failures;

        if total_operations > 0 {
            let failure_rate = (total_failures as f64) / (total_operations as f64);
            if failure_rate > 0.1 {
                issues.push(format!("High failure rate: {:.1}%", failure_rate * 100.0));
            } else if failure_rate > 0.05 {
                warnings.push(format!(
                    "Elevated failure rate: {:.1}%",
                    failure_rate * 100.0
                ));
            }
        }

        if snapshot.retries.room_code_collisions > 0 {
            warnings.push(format!(
                "Room code collisions: {}",
                snapshot.retries.room_code_collisions
            ));
        }

        if snapshot.retries.retry_success_rate < 0.9 && snapshot.retries.retry_attempts > 0 {
            warnings.push(format!(
                "Retry issues: {:.1}% success rate",
                snapshot.retries.retry_success_rate * 100.0
            ));
        }

        let status = if !issues.is_empty() {
            HealthStatusLevel::Unhealthy
        } else if !warnings.is_empty() {
            HealthStatusLevel::Degraded
        } else {
            HealthStatusLevel::Healthy
        };

        HealthStatus {
            status,
            issues,
            warnings,
            metrics: snapshot,
        }
    }
}

impl Default for ResponseTimeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseTimeTracker {
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
            lowest_discernible_micros: DEFAULT_LOWEST_DISCERNIBLE_MICROS,
            highest_trackable_micros: DEFAULT_HIGHEST_TRACKABLE_MICROS,
            significant_figures: DEFAULT_SIGNIFICANT_FIGURES,
        }
    }

    #[cfg(test)]
    pub fn with_bounds(
        lowest_discernible_micros: u64,
        highest_trackable_micros: u64,
        significant_figures: u8,
    ) -> Self {
        Self {
            operations: HashMap::new(),
            lowest_discernible_micros: lowest_discernible_micros.max(1),
            highest_trackable_micros: highest_trackable_micros
                .max(lowest_discernible_micros.max(1)),
            significant_figures: significant_figures.clamp(1, 5),
        }
    }

    #[allow(dead_code)]
    pub fn add_sample(&mut self, operation: &str, duration: Duration) -> bool {
        let micros = duration_to_micros(duration);
        let lowest = self.lowest_discernible_micros;
        let highest = self.highest_trackable_micros;
        let significant = self.significant_figures;
        let histogram = self
            .operations
            .entry(operation.to_string())
            .or_insert_with(|| OperationLatencyHistogram::new(lowest, highest, significant));

        histogram.record(micros, highest)
    }

    pub fn get_average(&self, operation: &str) -> Option<f64> {
        self.get_latency_metrics(operation)
            .and_then(|metrics| metrics.average_ms)
    }

    pub fn get_latency_metrics(&self, operation: &str) -> Option<OperationLatencyMetrics> {
        let histogram = self.operations.get(operation)?;
        histogram.metrics()
    }
}

impl OperationLatencyHistogram {
    fn new(
        lowest_discernible_micros: u64,
        highest_trackable_micros: u64,
        significant_figures: u8,
    ) -> Self {
        let lowest = lowest_discernible_micros.max(1);
        let highest = highest_trackable_micros.max(lowest);
        let sig_figs = significant_figures.clamp(1, 5);

        let histogram = Histogram::new_with_bounds(lowest, highest, sig_figs)
            .or_else(|e| {
                tracing::warn!(
                    target: "metrics",
                    error = %e,
                    lowest,
                    highest,
                    sig_figs,
                    "Failed to create histogram with requested bounds, using unbounded fallback"
                );
                Histogram::new(2)
            })
            .or_else(|_| {
                tracing::error!(target: "metrics", "Histogram::new(2) failed, trying sig_figs=1");
                Histogram::new(1)
            })
            .ok();

        if histogram.is_none() {
            tracing::error!(target: "metrics", "All histogram creation attempts failed - metrics will not be recorded");
        }

        Self { histogram }
    }

    fn record(&mut self, micros: u64, highest_trackable_micros: u64) -> bool {
        let was_clamped = micros > highest_trackable_micros;
        let value = if was_clamped {
            highest_trackable_micros
        } else {
            micros
        };
        if let Some(ref mut histogram) = self.histogram {
            if let Err(error) = histogram.record(value) {
                tracing::warn!(
                    target: "metrics",
                    %error,
                    clamped_value = value,
                    highest_trackable_micros,
                    "failed to record latency sample"
                );
            }
        }
        was_clamped
    }

    fn metrics(&self) -> Option<OperationLatencyMetrics> {
        let histogram = self.histogram.as_ref()?;
        if histogram.is_empty() {
            return None;
        }

        Some(OperationLatencyMetrics {
            average_ms: Some(histogram.mean() / MICROS_PER_MS),
            p50_ms: Some(self.percentile(50.0)),
            p95_ms: Some(self.percentile(95.0)),
            p99_ms: Some(self.percentile(99.0)),
            min_ms: Some(histogram.min() as f64 / MICROS_PER_MS),
            max_ms: Some(histogram.max() as f64 / MICROS_PER_MS),
            sample_count: histogram.len(),
        })
    }

    fn percentile(&self, percentile: f64) -> f64 {
        self.histogram
            .as_ref()
            .map(|h| h.value_at_percentile(percentile) as f64 / MICROS_PER_MS)
            .unwrap_or(0.0)
    }
}

const MICROS_PER_MS: f64 = 1000.0;

fn duration_to_micros(duration: Duration) -> u64 {
    duration.as_micros().min(u128::from(u64::MAX)) as u64
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthStatus {
    pub status: HealthStatusLevel,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum HealthStatusLevel {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Utility struct for timing operations
#[allow(dead_code)]
pub struct OperationTimer {
    #[allow(dead_code)]
    operation: String,
    #[allow(dead_code)]
    start: Instant,
    #[allow(dead_code)]
    metrics: Arc<ServerMetrics>,
}

impl OperationTimer {
    pub fn new(operation: &str, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
            metrics,
        }
    }

    #[allow(dead_code)]
    pub async fn finish(self) {
        let duration = self.start.elapsed();
        self.metrics
            .record_response_time(&self.operation, duration)
            .await;
    }

    #[allow(dead_code)]
    pub async fn finish_with_result<T, E>(self, result: &Result<T, E>) {
        let duration = self.start.elapsed();
        self.metrics
            .record_response_time(&self.operation, duration)
            .await;

        if result.is_err() {
            match self.operation.as_str() {
                "room_creation" => self.metrics.increment_room_creation_failures(),
                "room_join" => self.metrics.increment_room_join_failures(),
                "query" => self.metrics.increment_internal_errors(),
                _ => {}
            }
        }
    }
}

/// Snapshot cache bookkeeping backing the `/_debug/storage` dashboard
/// (spec §10).
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct DashboardCacheMetrics {
    pub refresh_count: u64,
    pub refresh_errors: u64,
    pub last_refresh_timestamp: u64,
    pub refresh_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_decrement_active_connections_no_underflow() {
        let metrics = ServerMetrics::new();

        for _ in 0..10 {
            metrics.decrement_active_connections();
        }

        let value = metrics.active_connections.load(Ordering::Relaxed);
        assert_eq!(
            value, 0,
            "active_connections should remain 0 after decrement from 0, got {value}"
        );

        assert_eq!(
            metrics.disconnections.load(Ordering::Relaxed),
            10,
            "disconnections should still be incremented 10 times even when active_connections was already 0"
        );
    }

    #[tokio::test]
    async fn test_decrement_reconnection_sessions_no_underflow() {
        let metrics = ServerMetrics::new();

        for _ in 0..10 {
            metrics.decrement_reconnection_sessions_active();
        }

        let value = metrics.reconnection_sessions_active.load(Ordering::Relaxed);
        assert_eq!(
            value, 0,
            "reconnection_sessions_active should remain 0 after decrement from 0, got {value}"
        );
    }

    #[tokio::test]
    async fn test_concurrent_increment_decrement_active_connections() {
        let metrics = Arc::new(ServerMetrics::new());

        let inc_barrier = Arc::new(tokio::sync::Barrier::new(100));
        let mut handles = Vec::with_capacity(100);
        for _ in 0..100 {
            let metrics = Arc::clone(&metrics);
            let barrier = Arc::clone(&inc_barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                metrics.increment_connections();
            }));
        }
        for handle in handles {
            handle.await.expect("increment task should not panic");
        }

        let after_inc = metrics.active_connections.load(Ordering::Relaxed);
        assert_eq!(
            after_inc, 100,
            "After 100 increments, active_connections should be 100, got {after_inc}"
        );

        let dec_barrier = Arc::new(tokio::sync::Barrier::new(50));
        let mut handles = Vec::with_capacity(50);
        for _ in 0..50 {
            let metrics = Arc::clone(&metrics);
            let barrier = Arc::clone(&dec_barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                metrics.decrement_active_connections();
            }));
        }
        for handle in handles {
            handle.await.expect("decrement task should not panic");
        }

        let final_value = metrics.active_connections.load(Ordering::Relaxed);
        assert_eq!(
            final_value, 50,
            "After 100 increments and 50 decrements, active_connections should be 50, got {final_value}"
        );

        let total = metrics.total_connections.load(Ordering::Relaxed);
        assert_eq!(
            total, 100,
            "total_connections should be 100 (never decremented), got {total}"
        );
    }

    #[test]
    fn rate_limit_kind_counters_independent() {
        let metrics = ServerMetrics::new();
        metrics.record_rate_limit_check(RateLimitKind::Reaction);
        metrics.record_rate_limit_rejection(RateLimitKind::RootingChange);

        assert_eq!(metrics.rate_limit_reaction_checks.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.rate_limit_rooting_checks.load(Ordering::Relaxed), 0);
        assert_eq!(
            metrics.rate_limit_rooting_rejections.load(Ordering::Relaxed),
            1
        );
        assert_eq!(metrics.rate_limit_rejections.load(Ordering::Relaxed), 1);
    }
}
