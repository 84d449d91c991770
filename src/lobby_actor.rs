//! The Lobby actor: a singleton task tracking cross-room presence, the
//! public room directory, lobby-level chat, and invite/join-request fan-out
//! (spec §2, §4.10). Mirrors `room_actor.rs`'s single-writer-task shape at
//! server scope instead of per-room scope.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};

use crate::metrics::ServerMetrics;
use crate::protocol::commands::LobbyCommand;
use crate::protocol::events::LobbyEvent;
use crate::protocol::{ErrorCode, RoomCode, UserId};
use crate::rate_limit::SpectatorRateLimiter;

struct LobbyChatEntry {
    user_id: UserId,
    text: String,
    sent_at: chrono::DateTime<chrono::Utc>,
}

struct PendingJoinRequest {
    requester_id: UserId,
    room_code: RoomCode,
    expires_at: chrono::DateTime<chrono::Utc>,
}

struct RoomSummary {
    room_code: RoomCode,
    host_user_id: UserId,
    player_count: u8,
    is_public: bool,
}

enum LobbyMessage {
    Join {
        user_id: UserId,
        outbound: mpsc::Sender<Arc<LobbyEvent>>,
        reply: oneshot::Sender<()>,
    },
    Leave {
        user_id: UserId,
    },
    Command {
        user_id: UserId,
        command: LobbyCommand,
        reply: oneshot::Sender<Result<(), ErrorCode>>,
    },
    RoomRegistered(RoomSummary),
    RoomUnregistered(RoomCode),
    /// A Room actor forwarding a join decision back to the requester (spec
    /// §4.9's host-approval round trip).
    JoinDecision {
        request_id: String,
        room_code: RoomCode,
        approved: bool,
    },
    /// A Room actor forwarding an outbound invite so the target's lobby
    /// connection (if any) is notified even though they are not yet in the
    /// room.
    InviteForwarded {
        invite_id: String,
        room_code: RoomCode,
        host_user_id: UserId,
        target_user_id: UserId,
    },
}

/// Cheap, cloneable reference to the singleton lobby actor.
#[derive(Clone)]
pub struct LobbyActorHandle {
    sender: mpsc::Sender<LobbyMessage>,
}

impl LobbyActorHandle {
    pub async fn join(
        &self,
        user_id: UserId,
        outbound: mpsc::Sender<Arc<LobbyEvent>>,
    ) {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(LobbyMessage::Join {
                user_id,
                outbound,
                reply,
            })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    pub async fn leave(&self, user_id: UserId) {
        let _ = self.sender.send(LobbyMessage::Leave { user_id }).await;
    }

    pub async fn dispatch(&self, user_id: UserId, command: LobbyCommand) -> Result<(), ErrorCode> {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(LobbyMessage::Command {
                user_id,
                command,
                reply,
            })
            .await
            .is_err()
        {
            return Err(ErrorCode::InternalError);
        }
        rx.await.unwrap_or(Err(ErrorCode::InternalError))
    }

    pub async fn register_room(
        &self,
        room_code: RoomCode,
        host_user_id: UserId,
        player_count: u8,
        is_public: bool,
    ) {
        let _ = self
            .sender
            .send(LobbyMessage::RoomRegistered(RoomSummary {
                room_code,
                host_user_id,
                player_count,
                is_public,
            }))
            .await;
    }

    pub async fn unregister_room(&self, room_code: RoomCode) {
        let _ = self
            .sender
            .send(LobbyMessage::RoomUnregistered(room_code))
            .await;
    }

    /// Called by a Room actor once the host has answered `JOIN_REQUEST_RESPONSE`
    /// (spec §4.9).
    pub async fn notify_join_decision(
        &self,
        request_id: String,
        room_code: RoomCode,
        approved: bool,
    ) {
        let _ = self
            .sender
            .send(LobbyMessage::JoinDecision {
                request_id,
                room_code,
                approved,
            })
            .await;
    }

    /// Called by a Room actor when its host sends an invite to someone who
    /// may currently be idling in the lobby rather than already connected to
    /// the room (spec §4.9).
    pub async fn notify_invite(
        &self,
        invite_id: String,
        room_code: RoomCode,
        host_user_id: UserId,
        target_user_id: UserId,
    ) {
        let _ = self
            .sender
            .send(LobbyMessage::InviteForwarded {
                invite_id,
                room_code,
                host_user_id,
                target_user_id,
            })
            .await;
    }
}

/// Spawn the singleton lobby actor and return a handle to it.
pub fn spawn_lobby(
    event_buffer_size: usize,
    metrics: Arc<ServerMetrics>,
    rate_limiter: Arc<SpectatorRateLimiter>,
    join_request_ttl_secs: u64,
) -> LobbyActorHandle {
    let (tx, rx) = mpsc::channel(event_buffer_size.max(16));
    let handle = LobbyActorHandle { sender: tx };

    let actor = LobbyActor {
        connections: HashMap::new(),
        rooms: HashMap::new(),
        chat_history: Vec::new(),
        join_requests: HashMap::new(),
        metrics,
        rate_limiter,
        join_request_ttl_secs,
    };

    tokio::spawn(actor.run(rx));
    handle
}

struct LobbyActor {
    connections: HashMap<UserId, mpsc::Sender<Arc<LobbyEvent>>>,
    rooms: HashMap<RoomCode, RoomSummary>,
    chat_history: Vec<LobbyChatEntry>,
    join_requests: HashMap<String, PendingJoinRequest>,
    metrics: Arc<ServerMetrics>,
    rate_limiter: Arc<SpectatorRateLimiter>,
    join_request_ttl_secs: u64,
}

const LOBBY_CHAT_HISTORY_LIMIT: usize = 200;

impl LobbyActor {
    async fn run(mut self, mut rx: mpsc::Receiver<LobbyMessage>) {
        let mut cleanup = tokio::time::interval(StdDuration::from_secs(30));
        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(msg) => self.handle_message(msg).await,
                    None => break,
                },
                _ = cleanup.tick() => {
                    self.expire_stale_join_requests();
                }
            }
        }
    }

    /// Drop join requests past their TTL (spec §4.10). Lobby join requests
    /// have no single-alarm slot of their own like the Room actor's alarm
    /// subsystem; a periodic sweep is enough since nothing downstream blocks
    /// waiting on this specific deadline.
    fn expire_stale_join_requests(&mut self) {
        let now = Utc::now();
        self.join_requests.retain(|_, req| req.expires_at > now);
    }

    async fn handle_message(&mut self, msg: LobbyMessage) {
        match msg {
            LobbyMessage::Join {
                user_id,
                outbound,
                reply,
            } => {
                self.handle_join(user_id, outbound).await;
                let _ = reply.send(());
            }
            LobbyMessage::Leave { user_id } => {
                self.handle_leave(user_id).await;
            }
            LobbyMessage::Command {
                user_id,
                command,
                reply,
            } => {
                let result = self.dispatch_command(user_id, command).await;
                let _ = reply.send(result);
            }
            LobbyMessage::RoomRegistered(summary) => {
                let room_code = summary.room_code.clone();
                self.rooms.insert(room_code.clone(), summary);
                self.broadcast(LobbyEvent::LobbyRoomUpdate {
                    room: self.room_summary_json(&room_code),
                })
                .await;
            }
            LobbyMessage::RoomUnregistered(room_code) => {
                self.rooms.remove(&room_code);
                self.join_requests
                    .retain(|_, req| req.room_code != room_code);
            }
            LobbyMessage::JoinDecision {
                request_id,
                room_code,
                approved,
            } => {
                if let Some(request) = self.join_requests.remove(&request_id) {
                    let event = if approved {
                        LobbyEvent::JoinApproved {
                            room_code: room_code.to_string(),
                        }
                    } else {
                        LobbyEvent::JoinDeclined {
                            room_code: room_code.to_string(),
                        }
                    };
                    self.send_to(request.requester_id, event).await;
                }
            }
            LobbyMessage::InviteForwarded {
                invite_id,
                room_code,
                host_user_id,
                target_user_id,
            } => {
                self.send_to(
                    target_user_id,
                    LobbyEvent::InviteReceived {
                        invite_id,
                        room_code: room_code.to_string(),
                        host_user_id,
                    },
                )
                .await;
            }
        }
    }

    async fn handle_join(&mut self, user_id: UserId, outbound: mpsc::Sender<Arc<LobbyEvent>>) {
        self.connections.insert(user_id, outbound.clone());
        let online: Vec<UserId> = self.connections.keys().copied().collect();
        let _ = outbound
            .send(Arc::new(LobbyEvent::PresenceInit {
                online_users: online,
            }))
            .await;
        self.broadcast(LobbyEvent::PresenceJoin { user_id }).await;
    }

    async fn handle_leave(&mut self, user_id: UserId) {
        self.connections.remove(&user_id);
        self.broadcast(LobbyEvent::PresenceLeave { user_id }).await;
    }

    async fn dispatch_command(
        &mut self,
        user_id: UserId,
        command: LobbyCommand,
    ) -> Result<(), ErrorCode> {
        match command {
            LobbyCommand::LobbyChat { text } => self.handle_lobby_chat(user_id, text).await,
            LobbyCommand::GetRooms => {
                let rooms = self.public_rooms_json();
                self.send_to(user_id, LobbyEvent::LobbyRoomsList { rooms }).await;
                Ok(())
            }
            LobbyCommand::GetOnlineUsers => {
                let users = self.connections.keys().copied().collect();
                self.send_to(user_id, LobbyEvent::LobbyOnlineUsers { users })
                    .await;
                Ok(())
            }
            LobbyCommand::RequestJoin { room_code } => {
                self.handle_request_join(user_id, room_code).await
            }
            LobbyCommand::CancelJoinRequest {
                request_id,
                room_code: _,
            } => {
                self.join_requests.remove(&request_id);
                self.send_to(user_id, LobbyEvent::JoinRequestCancelled { request_id })
                    .await;
                Ok(())
            }
            LobbyCommand::SendInvite {
                target_user_id,
                room_code,
            } => {
                let invite_id = uuid::Uuid::new_v4().to_string();
                self.send_to(
                    target_user_id,
                    LobbyEvent::InviteReceived {
                        invite_id,
                        room_code,
                        host_user_id: user_id,
                    },
                )
                .await;
                Ok(())
            }
            LobbyCommand::CancelInvite { invite_id } => {
                self.broadcast(LobbyEvent::InviteCancelled { invite_id }).await;
                Ok(())
            }
            // Backwards-compat no-ops (spec §4.10): the directory is now kept
            // current via `register_room`/`unregister_room` calls from the
            // Room actor lifecycle, not client-issued commands.
            LobbyCommand::RoomCreated | LobbyCommand::RoomUpdated | LobbyCommand::RoomClosed => {
                Ok(())
            }
        }
    }

    async fn handle_lobby_chat(&mut self, user_id: UserId, text: String) -> Result<(), ErrorCode> {
        self.rate_limiter
            .check_lobby_chat(user_id)
            .await
            .map_err(|_| ErrorCode::RateLimited)?;
        self.metrics.increment_lobby_chat_messages();
        self.chat_history.push(LobbyChatEntry {
            user_id,
            text: text.clone(),
            sent_at: Utc::now(),
        });
        if self.chat_history.len() > LOBBY_CHAT_HISTORY_LIMIT {
            let overflow = self.chat_history.len() - LOBBY_CHAT_HISTORY_LIMIT;
            self.chat_history.drain(0..overflow);
        }
        self.broadcast(LobbyEvent::LobbyChatMessage { user_id, text }).await;
        Ok(())
    }

    async fn handle_request_join(
        &mut self,
        user_id: UserId,
        room_code: String,
    ) -> Result<(), ErrorCode> {
        let room_code: RoomCode = room_code.into();
        if !self.rooms.contains_key(&room_code) {
            return Err(ErrorCode::RoomNotFound);
        }
        let request_id = uuid::Uuid::new_v4().to_string();
        let expires_at = Utc::now() + chrono::Duration::seconds(self.join_request_ttl_secs as i64);
        self.join_requests.insert(
            request_id.clone(),
            PendingJoinRequest {
                requester_id: user_id,
                room_code: room_code.clone(),
                expires_at,
            },
        );
        self.metrics.increment_join_requests_received();
        self.send_to(
            user_id,
            LobbyEvent::JoinRequestSent {
                request_id,
                room_code: room_code.to_string(),
            },
        )
        .await;
        Ok(())
    }

    fn room_summary_json(&self, room_code: &RoomCode) -> serde_json::Value {
        self.rooms
            .get(room_code)
            .map(|r| {
                serde_json::json!({
                    "room_code": r.room_code.to_string(),
                    "host_user_id": r.host_user_id,
                    "player_count": r.player_count,
                    "is_public": r.is_public,
                })
            })
            .unwrap_or(serde_json::Value::Null)
    }

    fn public_rooms_json(&self) -> Vec<serde_json::Value> {
        self.rooms
            .values()
            .filter(|r| r.is_public)
            .map(|r| {
                serde_json::json!({
                    "room_code": r.room_code.to_string(),
                    "host_user_id": r.host_user_id,
                    "player_count": r.player_count,
                })
            })
            .collect()
    }

    async fn send_to(&mut self, user_id: UserId, event: LobbyEvent) {
        if let Some(sender) = self.connections.get(&user_id) {
            if sender.send(Arc::new(event)).await.is_err() {
                self.connections.remove(&user_id);
            }
        }
    }

    async fn broadcast(&mut self, event: LobbyEvent) {
        let event = Arc::new(event);
        let mut dropped = Vec::new();
        for (&user_id, sender) in &self.connections {
            if sender.send(event.clone()).await.is_err() {
                dropped.push(user_id);
            }
        }
        for user_id in dropped {
            self.connections.remove(&user_id);
        }
    }
}
