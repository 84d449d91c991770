/// Reconnection support module
///
/// Handles player reconnection after network disruptions including:
/// - Authentication token generation and validation
/// - Event buffering for missed messages
/// - Player disconnection tracking
/// - Reconnection window management (spec §3 `reconnectDeadline`, §8
///   "Seat-connection correspondence")
use crate::metrics::ServerMetrics;
use crate::protocol::{RoomCode, RoomEvent, UserId};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Authentication token for reconnection
#[derive(Debug, Clone)]
pub struct ReconnectionToken {
    /// Token value (UUID)
    pub token: String,
    /// User ID this token is for
    pub user_id: UserId,
    /// Room this token is for
    pub room_code: RoomCode,
    /// When the token was created
    pub created_at: DateTime<Utc>,
    /// When the token expires
    pub expires_at: DateTime<Utc>,
}

impl ReconnectionToken {
    /// Create a new reconnection token
    pub fn new(user_id: UserId, room_code: RoomCode, validity_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            token: Uuid::new_v4().to_string(),
            user_id,
            room_code,
            created_at: now,
            expires_at: now + Duration::seconds(validity_seconds),
        }
    }

    /// Check if token is expired
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Check if token is valid for given user and room
    pub fn is_valid(&self, user_id: &UserId, room_code: &RoomCode) -> bool {
        !self.is_expired() && self.user_id == *user_id && self.room_code == *room_code
    }
}

/// Event buffer for a room
#[derive(Debug, Clone)]
pub struct EventBuffer {
    /// Room this buffer belongs to
    pub room_code: RoomCode,
    /// Maximum number of events to buffer
    pub max_size: usize,
    /// Buffered events (oldest to newest)
    pub events: VecDeque<BufferedEvent>,
}

/// A buffered event with metadata
#[derive(Debug, Clone)]
pub struct BufferedEvent {
    /// The room event that was sent
    pub event: RoomEvent,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// Sequence number (for ordering)
    pub sequence: u64,
}

impl EventBuffer {
    /// Create a new event buffer
    pub fn new(room_code: RoomCode, max_size: usize) -> Self {
        Self {
            room_code,
            max_size,
            events: VecDeque::with_capacity(max_size),
        }
    }

    /// Add an event to the buffer
    pub fn push(&mut self, event: RoomEvent, sequence: u64) {
        let buffered = BufferedEvent {
            event,
            timestamp: Utc::now(),
            sequence,
        };

        self.events.push_back(buffered);

        // Remove oldest events if buffer is full
        while self.events.len() > self.max_size {
            self.events.pop_front();
        }
    }

    /// Get events that occurred after a specific sequence number
    pub fn get_events_after(&self, after_sequence: u64) -> Vec<RoomEvent> {
        self.events
            .iter()
            .filter(|e| e.sequence > after_sequence)
            .map(|e| e.event.clone())
            .collect()
    }

    /// Get all buffered events
    pub fn get_all_events(&self) -> Vec<RoomEvent> {
        self.events.iter().map(|e| e.event.clone()).collect()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// Disconnected player information
#[derive(Debug, Clone)]
pub struct DisconnectedPlayer {
    /// User ID
    pub user_id: UserId,
    /// Room they were in
    pub room_code: RoomCode,
    /// When they disconnected
    pub disconnected_at: DateTime<Utc>,
    /// Reconnection token
    pub token: ReconnectionToken,
    /// Last event sequence number they saw
    pub last_sequence: u64,
    /// Was this player the host?
    pub was_host: bool,
}

impl DisconnectedPlayer {
    /// Check if the reconnection window has expired
    pub fn is_expired(&self, window_seconds: i64) -> bool {
        let expiry = self.disconnected_at + Duration::seconds(window_seconds);
        Utc::now() > expiry
    }
}

/// Tracks disconnected players and buffers room events so reconnecting
/// clients can be caught up, per spec §4.3 pause/resume and §3's
/// `reconnectDeadline` seat field.
pub struct ReconnectionManager {
    /// Disconnected players awaiting reconnection
    disconnected_players: RwLock<HashMap<UserId, DisconnectedPlayer>>,
    /// Event buffers per room
    event_buffers: RwLock<HashMap<RoomCode, EventBuffer>>,
    /// Reconnection window in seconds
    reconnection_window: i64,
    /// Event buffer size per room
    event_buffer_size: usize,
    /// Next sequence number for events
    next_sequence: RwLock<u64>,
    /// Metrics sink
    metrics: Arc<ServerMetrics>,
}

impl ReconnectionManager {
    /// Create a new reconnection manager
    pub fn new(reconnection_window: u64, event_buffer_size: usize, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            disconnected_players: RwLock::new(HashMap::new()),
            event_buffers: RwLock::new(HashMap::new()),
            reconnection_window: reconnection_window as i64,
            event_buffer_size,
            next_sequence: RwLock::new(0),
            metrics,
        }
    }

    /// Register a player disconnection
    pub async fn register_disconnection(
        &self,
        user_id: UserId,
        room_code: RoomCode,
        was_host: bool,
    ) -> String {
        let room_for_log = room_code.clone();
        let token = ReconnectionToken::new(user_id, room_code.clone(), self.reconnection_window);
        let token_string = token.token.clone();

        let last_sequence = *self.next_sequence.read().await;

        let disconnected = DisconnectedPlayer {
            user_id,
            room_code,
            disconnected_at: Utc::now(),
            token,
            last_sequence,
            was_host,
        };

        let mut players = self.disconnected_players.write().await;
        let previous = players.insert(user_id, disconnected);
        drop(players);

        self.metrics.increment_reconnection_tokens_issued();
        if previous.is_none() {
            self.metrics.increment_reconnection_sessions_active();
        }

        tracing::info!(
            %user_id,
            room_code = %room_for_log,
            "Player disconnection registered for reconnection"
        );

        token_string
    }

    /// Validate reconnection attempt
    pub async fn validate_reconnection(
        &self,
        user_id: &UserId,
        room_code: &RoomCode,
        token: &str,
    ) -> Result<DisconnectedPlayer, String> {
        let disconnected = self.disconnected_players.read().await;

        let Some(player) = disconnected.get(user_id) else {
            self.metrics.increment_reconnection_validation_failure();
            return Err("No disconnection record found".to_string());
        };

        if player.token.token != token {
            self.metrics.increment_reconnection_validation_failure();
            return Err("Invalid reconnection token".to_string());
        }

        if !player.token.is_valid(user_id, room_code) {
            self.metrics.increment_reconnection_validation_failure();
            return Err("Reconnection token is invalid or expired".to_string());
        }

        if player.is_expired(self.reconnection_window) {
            self.metrics.increment_reconnection_validation_failure();
            return Err("Reconnection window has expired".to_string());
        }

        Ok(player.clone())
    }

    /// Complete reconnection and remove from disconnected players
    pub async fn complete_reconnection(&self, user_id: &UserId) {
        let mut players = self.disconnected_players.write().await;
        let removed = players.remove(user_id);
        let room_to_clear = removed.as_ref().and_then(|player| {
            let room_code = player.room_code.clone();
            let others_waiting = players
                .values()
                .any(|p| p.user_id != player.user_id && p.room_code == room_code);
            if others_waiting {
                None
            } else {
                Some(room_code)
            }
        });
        drop(players);

        if removed.is_some() {
            self.metrics.decrement_reconnection_sessions_active();
            self.metrics.increment_reconnection_completions();
        }

        if let Some(room_code) = room_to_clear {
            let mut buffers = self.event_buffers.write().await;
            buffers.remove(&room_code);
        }

        tracing::info!(%user_id, "Player reconnection completed");
    }

    /// Get missed events for a reconnecting player
    pub async fn get_missed_events(&self, room_code: &RoomCode, last_sequence: u64) -> Vec<RoomEvent> {
        let buffers = self.event_buffers.read().await;
        buffers
            .get(room_code)
            .map(|buffer| buffer.get_events_after(last_sequence))
            .unwrap_or_default()
    }

    /// Buffer an event for a room
    pub async fn buffer_event(&self, room_code: &RoomCode, event: RoomEvent) {
        let mut sequence = self.next_sequence.write().await;
        *sequence += 1;
        let seq = *sequence;
        drop(sequence);

        let mut buffers = self.event_buffers.write().await;
        let buffer = buffers
            .entry(room_code.clone())
            .or_insert_with(|| EventBuffer::new(room_code.clone(), self.event_buffer_size));

        buffer.push(event, seq);
        drop(buffers);

        self.metrics.add_reconnection_events_buffered(1);
    }

    /// Clear event buffer for a room (when room is deleted)
    pub async fn clear_room_buffer(&self, room_code: &RoomCode) {
        self.event_buffers.write().await.remove(room_code);
        tracing::debug!(%room_code, "Event buffer cleared for room");
    }

    /// Clean up expired disconnections
    pub async fn cleanup_expired(&self) -> usize {
        let mut disconnected = self.disconnected_players.write().await;
        let initial_count = disconnected.len();

        disconnected.retain(|user_id, player| {
            let expired = player.is_expired(self.reconnection_window);
            if expired {
                tracing::info!(%user_id, "Removing expired reconnection record");
            }
            !expired
        });
        let removed = initial_count - disconnected.len();
        drop(disconnected);
        if removed > 0 {
            tracing::info!(count = removed, "Cleaned up expired reconnection records");
        }

        removed
    }

    /// Check if a player has a pending disconnection
    pub async fn has_pending_reconnection(&self, user_id: &UserId) -> bool {
        self.disconnected_players.read().await.contains_key(user_id)
    }

    /// Get all disconnected players for a room
    pub async fn get_disconnected_players_in_room(&self, room_code: &RoomCode) -> Vec<UserId> {
        self.disconnected_players
            .read()
            .await
            .values()
            .filter(|p| p.room_code == *room_code)
            .map(|p| p.user_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ServerMetrics;
    use std::sync::Arc;

    fn room() -> RoomCode {
        RoomCode::from("ABCDEF".to_string())
    }

    #[test]
    fn test_reconnection_token_creation() {
        let user_id = Uuid::new_v4();
        let room_code = room();
        let token = ReconnectionToken::new(user_id, room_code.clone(), 300);

        assert_eq!(token.user_id, user_id);
        assert_eq!(token.room_code, room_code);
        assert!(!token.is_expired());
        assert!(token.is_valid(&user_id, &room_code));
    }

    #[test]
    fn test_reconnection_token_validation() {
        let user_id = Uuid::new_v4();
        let room_code = room();
        let other_user = Uuid::new_v4();
        let other_room = RoomCode::from("ZZZZZZ".to_string());

        let token = ReconnectionToken::new(user_id, room_code.clone(), 300);

        assert!(token.is_valid(&user_id, &room_code));
        assert!(!token.is_valid(&other_user, &room_code));
        assert!(!token.is_valid(&user_id, &other_room));
    }

    #[test]
    fn test_event_buffer_push() {
        let room_code = room();
        let mut buffer = EventBuffer::new(room_code, 3);

        for i in 0..5 {
            buffer.push(RoomEvent::Pong, i);
        }

        assert_eq!(buffer.events.len(), 3);
        assert_eq!(buffer.events[0].sequence, 2);
        assert_eq!(buffer.events[2].sequence, 4);
    }

    #[test]
    fn test_event_buffer_get_events_after() {
        let room_code = room();
        let mut buffer = EventBuffer::new(room_code, 10);

        for i in 0..5 {
            buffer.push(RoomEvent::Pong, i);
        }

        let events = buffer.get_events_after(2);
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_reconnection_manager_flow() {
        let metrics = Arc::new(ServerMetrics::new());
        let manager = ReconnectionManager::new(300, 100, metrics);
        let user_id = Uuid::new_v4();
        let room_code = room();

        let token = manager
            .register_disconnection(user_id, room_code.clone(), false)
            .await;

        let result = manager
            .validate_reconnection(&user_id, &room_code, &token)
            .await;
        assert!(result.is_ok());

        manager.complete_reconnection(&user_id).await;

        assert!(!manager.has_pending_reconnection(&user_id).await);
    }

    #[tokio::test]
    async fn test_event_buffering() {
        let metrics = Arc::new(ServerMetrics::new());
        let manager = ReconnectionManager::new(300, 100, metrics);
        let room_code = room();

        manager.buffer_event(&room_code, RoomEvent::Pong).await;
        manager.buffer_event(&room_code, RoomEvent::Pong).await;
        manager.buffer_event(&room_code, RoomEvent::Pong).await;

        let events = manager.get_missed_events(&room_code, 0).await;
        assert_eq!(events.len(), 3);
    }
}
