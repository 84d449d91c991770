//! The Room actor: a single cooperative task owning everything about one
//! room code (spec §2, §5 "Concurrency & Resource Model"). Connection
//! lifecycle, pause/resume, game start, the turn state machine, alarms, AI
//! turns, spectator engagement, and invites/join requests are all handled
//! serially from one `run` loop — there is exactly one writer of room state,
//! matching the teacher's single-task-per-connection-group discipline in
//! `server/room_service.rs`, generalized from "per connection" to "per room".

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::collaborators::{
    AIRoomManager, BroadcastFn, ChatManager, ExecuteCommandFn, GetStateFn, Scorer,
};
use crate::config::Config;
use crate::lobby_actor::LobbyActorHandle;
use crate::metrics::ServerMetrics;
use crate::protocol::commands::KibitzVote;
use crate::protocol::{
    AlarmData, Category, ConnectionRole, ErrorCode, PlayerInfo, PlayerSeat, RoomCode,
    RoomCommand, RoomEvent, RoomSettings, RoomState, RoomStatus, SpectatorInfo, UserId,
};
use crate::rate_limit::SpectatorRateLimiter;
use crate::reconnection::ReconnectionManager;

/// Outcome of a connection attempt handed back to the websocket layer.
#[derive(Debug, Clone)]
pub struct ConnectAck {
    pub is_host: bool,
    pub reconnected: bool,
}

struct PendingInvite {
    target_user_id: UserId,
    expires_at: chrono::DateTime<chrono::Utc>,
}

struct PendingPrediction {
    target_user_id: UserId,
    prediction_type: crate::protocol::commands::PredictionType,
}

struct Connection {
    outbound: mpsc::Sender<Arc<RoomEvent>>,
    role: ConnectionRole,
    display_name: String,
    avatar_seed: String,
}

enum RoomMessage {
    Connect {
        user_id: UserId,
        role: ConnectionRole,
        display_name: String,
        avatar_seed: String,
        outbound: mpsc::Sender<Arc<RoomEvent>>,
        reply: oneshot::Sender<Result<ConnectAck, ErrorCode>>,
    },
    Disconnect {
        user_id: UserId,
    },
    Command {
        user_id: UserId,
        command: RoomCommand,
        reply: oneshot::Sender<Result<(), ErrorCode>>,
    },
    /// Fire-and-forget command queued by the AI runner's `executeCommandFn`
    /// (spec §9: "pass the state accessor and command executor as explicit
    /// functions into the AI runner"). Routed back through the same channel
    /// rather than re-entering `&mut self` directly, since the closures
    /// handed to `AIRoomManager::execute_ai_turn` must be `'static`.
    AiCommand {
        user_id: UserId,
        command: RoomCommand,
    },
    AiBroadcast(RoomEvent),
    Shutdown,
}

/// Cheap, cloneable reference to a running room actor.
///
/// `chat` is reached directly rather than through the message queue: spec §6
/// keeps chat "outside" the actor core entirely, so the connection layer
/// talks to it without waiting on the room's serial command processing.
#[derive(Clone)]
pub struct RoomActorHandle {
    pub room_code: RoomCode,
    pub chat: Arc<dyn ChatManager>,
    sender: mpsc::Sender<RoomMessage>,
}

impl RoomActorHandle {
    pub async fn connect(
        &self,
        user_id: UserId,
        role: ConnectionRole,
        display_name: String,
        avatar_seed: String,
        outbound: mpsc::Sender<Arc<RoomEvent>>,
    ) -> Result<ConnectAck, ErrorCode> {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(RoomMessage::Connect {
                user_id,
                role,
                display_name,
                avatar_seed,
                outbound,
                reply,
            })
            .await
            .is_err()
        {
            return Err(ErrorCode::InternalError);
        }
        rx.await.unwrap_or(Err(ErrorCode::InternalError))
    }

    pub async fn disconnect(&self, user_id: UserId) {
        let _ = self.sender.send(RoomMessage::Disconnect { user_id }).await;
    }

    pub async fn dispatch(&self, user_id: UserId, command: RoomCommand) -> Result<(), ErrorCode> {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(RoomMessage::Command {
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

    pub async fn shutdown(&self) {
        let _ = self.sender.send(RoomMessage::Shutdown).await;
    }
}

/// Spawn a new room actor task and return a handle to it. `host_user_id` is
/// seeded as the sole player in `RoomState::new` (spec §3).
pub fn spawn_room(
    room_code: RoomCode,
    host_user_id: UserId,
    settings: RoomSettings,
    config: Arc<Config>,
    metrics: Arc<ServerMetrics>,
    rate_limiter: Arc<SpectatorRateLimiter>,
    reconnection: Arc<ReconnectionManager>,
    scorer: Arc<dyn Scorer>,
    chat: Arc<dyn ChatManager>,
    ai: Arc<dyn AIRoomManager>,
    lobby: LobbyActorHandle,
) -> RoomActorHandle {
    let (tx, rx) = mpsc::channel(config.server.event_buffer_size.max(16));
    let handle = RoomActorHandle {
        room_code: room_code.clone(),
        chat: chat.clone(),
        sender: tx.clone(),
    };

    let mut seats = HashMap::new();
    seats.insert(
        host_user_id,
        PlayerSeat {
            user_id: host_user_id,
            display_name: String::new(),
            avatar_seed: String::new(),
            joined_at: Utc::now(),
            is_connected: false,
            disconnected_at: None,
            reconnect_deadline: None,
            is_host: true,
            turn_order: 0,
            seat_id: Uuid::new_v4(),
        },
    );

    let actor = RoomActor {
        state: RoomState::new(room_code, host_user_id, settings),
        seats,
        spectators: HashMap::new(),
        connections: HashMap::new(),
        scorer,
        chat,
        ai,
        predictions: HashMap::new(),
        rooting: HashMap::new(),
        kibitz_votes: HashMap::new(),
        queue: VecDeque::new(),
        gallery_points: HashMap::new(),
        invites: HashMap::new(),
        next_alarm: None,
        config,
        metrics,
        rate_limiter,
        reconnection,
        lobby,
        self_sender: tx,
    };

    tokio::spawn(actor.run(rx));
    handle
}

struct RoomActor {
    state: RoomState,
    seats: HashMap<UserId, PlayerSeat>,
    spectators: HashMap<UserId, SpectatorInfo>,
    connections: HashMap<UserId, Connection>,
    scorer: Arc<dyn Scorer>,
    chat: Arc<dyn ChatManager>,
    ai: Arc<dyn AIRoomManager>,
    predictions: HashMap<String, PendingPrediction>,
    rooting: HashMap<UserId, UserId>,
    kibitz_votes: HashMap<UserId, KibitzVote>,
    queue: VecDeque<UserId>,
    gallery_points: HashMap<UserId, u32>,
    invites: HashMap<String, PendingInvite>,
    next_alarm: Option<(chrono::DateTime<chrono::Utc>, AlarmData)>,
    config: Arc<Config>,
    metrics: Arc<ServerMetrics>,
    rate_limiter: Arc<SpectatorRateLimiter>,
    reconnection: Arc<ReconnectionManager>,
    lobby: LobbyActorHandle,
    self_sender: mpsc::Sender<RoomMessage>,
}

impl RoomActor {
    async fn run(mut self, mut rx: mpsc::Receiver<RoomMessage>) {
        loop {
            let wake = async {
                match self.next_alarm {
                    Some((at, _)) => {
                        let delta = (at - Utc::now()).to_std().unwrap_or(StdDuration::ZERO);
                        tokio::time::sleep(delta).await;
                    }
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(msg) => {
                        if matches!(msg, RoomMessage::Shutdown) {
                            break;
                        }
                        self.handle_message(msg).await;
                    }
                    None => break,
                },
                () = wake => {
                    self.fire_alarm().await;
                }
            }
        }
        info!(room_code = %self.state.room_code, "room actor shutting down");
    }

    #[instrument(skip(self, msg), fields(room_code = %self.state.room_code))]
    async fn handle_message(&mut self, msg: RoomMessage) {
        match msg {
            RoomMessage::Connect {
                user_id,
                role,
                display_name,
                avatar_seed,
                outbound,
                reply,
            } => {
                let result = self
                    .handle_connect(user_id, role, display_name, avatar_seed, outbound)
                    .await;
                let _ = reply.send(result);
            }
            RoomMessage::Disconnect { user_id } => {
                self.handle_disconnect(user_id).await;
            }
            RoomMessage::Command {
                user_id,
                command,
                reply,
            } => {
                let result = self.dispatch_command(user_id, command).await;
                let _ = reply.send(result);
            }
            RoomMessage::AiCommand { user_id, command } => {
                if let Err(code) = self.dispatch_command(user_id, command).await {
                    warn!(%user_id, ?code, "AI-issued command failed");
                }
            }
            RoomMessage::AiBroadcast(event) => {
                self.broadcast(event).await;
            }
            RoomMessage::Shutdown => unreachable!("handled in run()"),
        }
    }

    // -----------------------------------------------------------------
    // Connection lifecycle (spec §4.2)
    // -----------------------------------------------------------------

    async fn handle_connect(
        &mut self,
        user_id: UserId,
        role: ConnectionRole,
        display_name: String,
        avatar_seed: String,
        outbound: mpsc::Sender<Arc<RoomEvent>>,
    ) -> Result<ConnectAck, ErrorCode> {
        let reconnected = match role {
            ConnectionRole::Player => self.attach_player(user_id, &display_name, &avatar_seed)?,
            ConnectionRole::Spectator => {
                if !self.state.settings.allow_spectators {
                    return Err(ErrorCode::NotSpectator);
                }
                self.spectators.insert(
                    user_id,
                    SpectatorInfo {
                        user_id,
                        display_name: display_name.clone(),
                        connected_at: Utc::now(),
                    },
                );
                self.metrics.increment_spectators_joined();
                false
            }
        };

        self.connections.insert(
            user_id,
            Connection {
                outbound: outbound.clone(),
                role,
                display_name: display_name.clone(),
                avatar_seed: avatar_seed.clone(),
            },
        );

        let snapshot = RoomEvent::Connected {
            players: self.player_infos(),
            ai_players: self.state.ai_players.clone(),
            spectators: self.spectators.values().cloned().collect(),
            reconnected,
        };
        let _ = outbound.send(Arc::new(snapshot)).await;

        match role {
            ConnectionRole::Player if reconnected => {
                self.broadcast(RoomEvent::PlayerReconnected { user_id }).await;
            }
            ConnectionRole::Player => {
                self.broadcast(RoomEvent::PlayerJoined {
                    player: self.player_info(user_id),
                })
                .await;
            }
            ConnectionRole::Spectator => {
                self.broadcast(RoomEvent::SpectatorConnected {
                    spectators: self.spectators.values().cloned().collect(),
                })
                .await;
            }
        }

        // A reconnecting player cancels any pending seat-expiration alarm
        // for a room with no other expirations in flight; the next sweep
        // will recompute whichever deadline is now soonest.
        if reconnected {
            self.recompute_next_alarm();
            self.maybe_resume_from_pause().await;
        }

        Ok(ConnectAck {
            is_host: self.state.is_host(user_id),
            reconnected,
        })
    }

    /// Returns `Ok(true)` if this is a reconnect to an existing seat.
    fn attach_player(
        &mut self,
        user_id: UserId,
        display_name: &str,
        avatar_seed: &str,
    ) -> Result<bool, ErrorCode> {
        if let Some(seat) = self.seats.get_mut(&user_id) {
            seat.is_connected = true;
            seat.disconnected_at = None;
            seat.reconnect_deadline = None;
            seat.display_name = display_name.to_string();
            seat.avatar_seed = avatar_seed.to_string();
            return Ok(true);
        }

        if self.state.status != RoomStatus::Waiting {
            return Err(ErrorCode::GameInProgress);
        }

        let active_seats = self
            .seats
            .values()
            .filter(|s| s.is_active(Utc::now()))
            .count();
        if active_seats >= self.state.settings.max_players as usize {
            return Err(ErrorCode::RoomFull);
        }

        let turn_order = self.seats.len() as u8;
        self.seats.insert(
            user_id,
            PlayerSeat {
                user_id,
                display_name: display_name.to_string(),
                avatar_seed: avatar_seed.to_string(),
                joined_at: Utc::now(),
                is_connected: true,
                disconnected_at: None,
                reconnect_deadline: None,
                is_host: self.state.is_host(user_id),
                turn_order,
                seat_id: Uuid::new_v4(),
            },
        );
        if !self.state.player_order.contains(&user_id) {
            self.state.player_order.push(user_id);
        }
        self.metrics.increment_players_joined();
        Ok(false)
    }

    async fn handle_disconnect(&mut self, user_id: UserId) {
        self.connections.remove(&user_id);

        if self.spectators.remove(&user_id).is_some() {
            self.metrics.increment_spectators_left();
            self.broadcast(RoomEvent::SpectatorLeft { user_id }).await;
            return;
        }

        let Some(seat) = self.seats.get_mut(&user_id) else {
            return;
        };
        seat.is_connected = false;
        seat.disconnected_at = Some(Utc::now());
        let deadline = Utc::now()
            + chrono::Duration::seconds(self.config.server.reconnection_window_secs as i64);
        seat.reconnect_deadline = Some(deadline);
        self.metrics.increment_players_left();

        self.broadcast(RoomEvent::PlayerDisconnected {
            user_id,
            reconnect_deadline: deadline,
        })
        .await;

        self.recompute_next_alarm();

        let any_connected = self.seats.values().any(|s| s.is_connected);
        if !any_connected && self.state.status == RoomStatus::Playing {
            self.state.status = RoomStatus::Paused;
            self.state.paused_at = Some(Utc::now());
            self.broadcast(RoomEvent::RoomStatus {
                status: RoomStatus::Paused,
                reason: "all players disconnected".to_string(),
            })
            .await;
            self.schedule_alarm_if_sooner(
                Utc::now() + chrono::Duration::seconds(self.config.server.pause_timeout_secs as i64),
                AlarmData::PauseTimeout,
            );
        }
    }

    async fn maybe_resume_from_pause(&mut self) {
        if self.state.status == RoomStatus::Paused {
            self.state.status = RoomStatus::Playing;
            self.state.paused_at = None;
            self.broadcast(RoomEvent::RoomStatus {
                status: RoomStatus::Playing,
                reason: "player reconnected".to_string(),
            })
            .await;
        }
    }

    // -----------------------------------------------------------------
    // Command dispatch (spec §4.4-§4.9)
    // -----------------------------------------------------------------

    async fn dispatch_command(
        &mut self,
        user_id: UserId,
        command: RoomCommand,
    ) -> Result<(), ErrorCode> {
        match command {
            RoomCommand::StartGame => self.handle_start_game(user_id).await,
            RoomCommand::QuickPlayStart { ai_profiles } => {
                self.handle_quick_play_start(user_id, ai_profiles).await
            }
            RoomCommand::AddAiPlayer { profile_id } => {
                self.handle_add_ai_player(user_id, profile_id).await
            }
            RoomCommand::RemoveAiPlayer { player_id } => {
                self.handle_remove_ai_player(user_id, player_id).await
            }
            RoomCommand::DiceRoll { kept } => self.handle_dice_roll(user_id, kept).await,
            RoomCommand::DiceKeep { indices } => self.handle_dice_keep(user_id, indices).await,
            RoomCommand::CategoryScore { category } => {
                self.handle_category_score(user_id, category).await
            }
            RoomCommand::Rematch => self.handle_rematch(user_id).await,
            RoomCommand::Prediction {
                target_user_id,
                prediction_type,
                exact_score,
            } => {
                self.handle_prediction(user_id, target_user_id, prediction_type, exact_score)
                    .await
            }
            RoomCommand::CancelPrediction { prediction_id } => {
                self.predictions.remove(&prediction_id);
                self.send_to(user_id, RoomEvent::PredictionCancelled { prediction_id })
                    .await;
                Ok(())
            }
            RoomCommand::GetPredictions => {
                let predictions = self
                    .predictions
                    .keys()
                    .map(|id| serde_json::json!({ "prediction_id": id }))
                    .collect();
                self.send_to(user_id, RoomEvent::Predictions { predictions })
                    .await;
                Ok(())
            }
            RoomCommand::GetPredictionStats => {
                self.send_to(
                    user_id,
                    RoomEvent::PredictionStats {
                        stats: serde_json::json!({ "total": self.predictions.len() }),
                    },
                )
                .await;
                Ok(())
            }
            RoomCommand::RootForPlayer { target_user_id } => {
                self.handle_root_for_player(user_id, target_user_id).await
            }
            RoomCommand::ClearRooting => {
                self.rooting.remove(&user_id);
                self.send_to(user_id, RoomEvent::RootingCleared).await;
                self.broadcast_rooting_update().await;
                Ok(())
            }
            RoomCommand::GetRooting => {
                self.send_to(
                    user_id,
                    RoomEvent::RootingState {
                        rooting: serde_json::to_value(&self.rooting_counts()).unwrap_or_default(),
                    },
                )
                .await;
                Ok(())
            }
            RoomCommand::Kibitz { vote } => self.handle_kibitz(user_id, vote).await,
            RoomCommand::ClearKibitz => {
                self.kibitz_votes.remove(&user_id);
                self.send_to(user_id, RoomEvent::KibitzCleared).await;
                Ok(())
            }
            RoomCommand::GetKibitz => {
                self.send_to(
                    user_id,
                    RoomEvent::KibitzState {
                        votes: serde_json::to_value(self.kibitz_votes.len()).unwrap_or_default(),
                    },
                )
                .await;
                Ok(())
            }
            RoomCommand::SpectatorReaction { emoji, target_user_id } => {
                self.handle_spectator_reaction(user_id, emoji, target_user_id)
                    .await
            }
            RoomCommand::JoinQueue => {
                if !self.queue.contains(&user_id) {
                    self.queue.push_back(user_id);
                }
                let position = self.queue.iter().position(|&u| u == user_id).unwrap_or(0) as u32;
                self.send_to(user_id, RoomEvent::QueueJoined { position }).await;
                self.broadcast_queue_update().await;
                Ok(())
            }
            RoomCommand::LeaveQueue => {
                self.queue.retain(|&u| u != user_id);
                self.send_to(user_id, RoomEvent::QueueLeft).await;
                self.broadcast_queue_update().await;
                Ok(())
            }
            RoomCommand::GetQueue => {
                self.send_to(
                    user_id,
                    RoomEvent::QueueState {
                        entries: self.queue.iter().copied().collect(),
                    },
                )
                .await;
                Ok(())
            }
            RoomCommand::GetGalleryPoints => {
                let points = self.gallery_points.get(&user_id).copied().unwrap_or(0);
                self.send_to(
                    user_id,
                    RoomEvent::GalleryPoints {
                        spectator_id: user_id,
                        points,
                    },
                )
                .await;
                Ok(())
            }
            RoomCommand::SendInvite { target_user_id } => {
                self.handle_send_invite(user_id, target_user_id).await
            }
            RoomCommand::CancelInvite { invite_id } => {
                self.invites.remove(&invite_id);
                Ok(())
            }
            RoomCommand::JoinRequestResponse {
                request_id,
                approved,
            } => {
                self.handle_join_request_response(user_id, request_id, approved)
                    .await
            }
            RoomCommand::Ping => {
                self.send_to(user_id, RoomEvent::Pong).await;
                Ok(())
            }
        }
    }

    async fn handle_start_game(&mut self, user_id: UserId) -> Result<(), ErrorCode> {
        if !self.state.is_host(user_id) {
            return Err(ErrorCode::NotHost);
        }
        if self.state.status != RoomStatus::Waiting {
            return Err(ErrorCode::InvalidRoomState);
        }
        self.start_game_with_order(self.state.player_order.clone())
            .await;
        Ok(())
    }

    async fn handle_quick_play_start(
        &mut self,
        user_id: UserId,
        ai_profiles: Vec<String>,
    ) -> Result<(), ErrorCode> {
        if !self.state.is_host(user_id) {
            return Err(ErrorCode::NotHost);
        }
        if self.state.status != RoomStatus::Waiting {
            return Err(ErrorCode::InvalidRoomState);
        }
        for profile in ai_profiles {
            self.add_ai_player_internal(profile).await?;
        }
        // Host goes first in quick play; no shuffle (spec §4.4).
        let order = self.state.player_order.clone();
        self.state.status = RoomStatus::Playing;
        self.state.started_at = Some(Utc::now());
        let _ = self
            .scorer
            .initialize_from_room(&self.game_players(), &self.state.settings)
            .await;
        self.scorer.start_game_with_order(order.clone()).await.ok();
        self.metrics.increment_games_started();
        let current_player_id = order.first().copied().unwrap_or(user_id);
        self.broadcast(RoomEvent::QuickPlayStarted {
            players: self.player_infos(),
            current_player_id,
        })
        .await;
        self.trigger_ai_turn_if_needed().await;
        Ok(())
    }

    async fn start_game_with_order(&mut self, order: Vec<UserId>) {
        self.broadcast(RoomEvent::GameStarting).await;
        self.state.status = RoomStatus::Playing;
        self.state.started_at = Some(Utc::now());
        let _ = self
            .scorer
            .initialize_from_room(&self.game_players(), &self.state.settings)
            .await;
        let _ = self.scorer.start_game_with_order(order.clone()).await;
        self.metrics.increment_games_started();
        let state = self.scorer.get_state().await;
        self.broadcast(RoomEvent::GameStarted {
            player_order: order,
            current_player_id: state.current_player_id().unwrap_or(self.state.host_user_id),
            turn_number: state.turn_number,
            round_number: state.round_number,
        })
        .await;
        self.trigger_ai_turn_if_needed().await;
    }

    async fn handle_add_ai_player(
        &mut self,
        user_id: UserId,
        profile_id: String,
    ) -> Result<(), ErrorCode> {
        if !self.state.is_host(user_id) {
            return Err(ErrorCode::NotHost);
        }
        if self.state.status != RoomStatus::Waiting {
            return Err(ErrorCode::InvalidRoomState);
        }
        self.add_ai_player_internal(profile_id).await
    }

    async fn add_ai_player_internal(&mut self, profile_id: String) -> Result<(), ErrorCode> {
        if self.state.player_order.len() >= self.state.settings.max_players as usize {
            return Err(ErrorCode::RoomFull);
        }
        let info = self
            .ai
            .add_ai_player(format!("AI-{profile_id}"))
            .await
            .map_err(|_| ErrorCode::InternalError)?;
        let ai_user_id = Uuid::parse_str(&info.id).map_err(|_| ErrorCode::InternalError)?;
        self.state.ai_players.push(info.clone());
        self.state.player_order.push(ai_user_id);
        self.metrics.increment_ai_players_added();
        self.broadcast(RoomEvent::AiPlayerJoined { ai_player: info }).await;
        Ok(())
    }

    async fn handle_remove_ai_player(
        &mut self,
        user_id: UserId,
        player_id: String,
    ) -> Result<(), ErrorCode> {
        if !self.state.is_host(user_id) {
            return Err(ErrorCode::NotHost);
        }
        self.state.ai_players.retain(|p| p.id != player_id);
        if let Ok(ai_user_id) = Uuid::parse_str(&player_id) {
            self.state.player_order.retain(|&u| u != ai_user_id);
        }
        self.broadcast(RoomEvent::AiPlayerRemoved { player_id }).await;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Turn state machine (spec §4.5)
    // -----------------------------------------------------------------

    async fn handle_dice_roll(&mut self, user_id: UserId, kept: Option<u8>) -> Result<(), ErrorCode> {
        let state = self.scorer.get_state().await;
        crate::protocol::game_state::validate_dice_roll(&state, user_id)
            .map_err(|e| e.error_code())?;
        let kept_mask = kept.unwrap_or_else(|| {
            state
                .players
                .get(&user_id)
                .map(|p| p.kept_dice)
                .unwrap_or(0)
        });
        let outcome = self
            .scorer
            .roll_dice(user_id, kept_mask)
            .await
            .map_err(|_| ErrorCode::InternalError)?;
        self.metrics.increment_dice_rolls();
        self.broadcast(RoomEvent::DiceRolled {
            player_id: user_id,
            dice: outcome.dice,
            roll_number: outcome.roll_number,
            rolls_remaining: outcome.rolls_remaining,
        })
        .await;
        Ok(())
    }

    async fn handle_dice_keep(&mut self, user_id: UserId, indices: Vec<u8>) -> Result<(), ErrorCode> {
        let state = self.scorer.get_state().await;
        crate::protocol::game_state::validate_dice_keep(&state, user_id, &indices)
            .map_err(|e| e.error_code())?;
        let mask = self
            .scorer
            .keep_dice(user_id, &indices)
            .await
            .map_err(|_| ErrorCode::InternalError)?;
        self.broadcast(RoomEvent::DiceKept {
            player_id: user_id,
            kept_mask: mask,
        })
        .await;
        Ok(())
    }

    async fn handle_category_score(
        &mut self,
        user_id: UserId,
        category: Category,
    ) -> Result<(), ErrorCode> {
        let state = self.scorer.get_state().await;
        crate::protocol::game_state::validate_category_score(&state, user_id, category)
            .map_err(|e| e.error_code())?;
        let outcome = self
            .scorer
            .score_category(user_id, category)
            .await
            .map_err(|_| ErrorCode::InternalError)?;
        self.metrics.increment_category_scores();
        self.metrics.increment_turns_played();
        self.broadcast(RoomEvent::CategoryScored {
            player_id: user_id,
            category,
            score: outcome.score,
            total_score: outcome.total_score,
            is_dicee_bonus: outcome.is_dicee_bonus,
        })
        .await;

        if outcome.game_completed {
            self.state.status = RoomStatus::Completed;
            self.metrics.increment_games_completed();
            self.broadcast(RoomEvent::GameOver {
                rankings: outcome.rankings.unwrap_or_default(),
            })
            .await;
        } else if let Some(next_player_id) = outcome.next_player_id {
            self.broadcast(RoomEvent::TurnChanged {
                current_player_id: next_player_id,
                turn_number: outcome.next_turn_number.unwrap_or(0),
                round_number: outcome.next_round_number.unwrap_or(0),
            })
            .await;
            self.trigger_ai_turn_if_needed().await;
        }
        Ok(())
    }

    async fn handle_rematch(&mut self, user_id: UserId) -> Result<(), ErrorCode> {
        let state = self.scorer.get_state().await;
        crate::protocol::game_state::validate_rematch(&state).map_err(|e| e.error_code())?;
        let _ = user_id;
        self.scorer
            .reset_for_rematch()
            .await
            .map_err(|_| ErrorCode::InternalError)?;
        self.state.reset_for_rematch();
        self.metrics.increment_rematches_started();
        self.broadcast(RoomEvent::RematchStarted).await;
        Ok(())
    }

    // -----------------------------------------------------------------
    // AI runner (spec §4.7)
    // -----------------------------------------------------------------

    async fn trigger_ai_turn_if_needed(&mut self) {
        let state = self.scorer.get_state().await;
        let Some(current) = state.current_player_id() else {
            return;
        };
        if !self.ai.is_ai_player(current) {
            return;
        }

        tokio::time::sleep(StdDuration::from_millis(50)).await;

        let state_for_closure = state.clone();
        let get_state: GetStateFn = Arc::new(move || state_for_closure.clone());

        let exec_sender = self.self_sender.clone();
        let execute_command: ExecuteCommandFn = Arc::new(move |command| {
            exec_sender
                .try_send(RoomMessage::AiCommand {
                    user_id: current,
                    command,
                })
                .map_err(|err| anyhow::anyhow!("failed to queue AI command: {err}"))
        });

        let broadcast_sender = self.self_sender.clone();
        let broadcast: BroadcastFn = Arc::new(move |event| {
            let _ = broadcast_sender.try_send(RoomMessage::AiBroadcast(event));
        });

        let ai = self.ai.clone();
        if let Err(err) = ai
            .execute_ai_turn(current, get_state, execute_command, broadcast)
            .await
        {
            warn!(%current, %err, "AI turn execution failed");
            self.metrics.increment_ai_turn_timeouts();
        } else {
            self.metrics.increment_ai_moves_made();
        }
    }

    // -----------------------------------------------------------------
    // Spectator coordination (spec §4.8)
    // -----------------------------------------------------------------

    async fn handle_prediction(
        &mut self,
        user_id: UserId,
        target_user_id: UserId,
        prediction_type: crate::protocol::commands::PredictionType,
        _exact_score: Option<u8>,
    ) -> Result<(), ErrorCode> {
        let state = self.scorer.get_state().await;
        self.rate_limiter
            .check_prediction(&self.state.room_code, state.turn_number as u32, user_id)
            .await
            .map_err(|_| ErrorCode::PredictionLimit)?;
        let prediction_id = Uuid::new_v4().to_string();
        self.predictions.insert(
            prediction_id.clone(),
            PendingPrediction {
                target_user_id,
                prediction_type,
            },
        );
        self.metrics.increment_predictions_made();
        self.send_to(user_id, RoomEvent::PredictionConfirmed { prediction_id })
            .await;
        self.broadcast(RoomEvent::PredictionMade {
            spectator_id: user_id,
            prediction_type,
            count: self.predictions.len() as u8,
        })
        .await;
        Ok(())
    }

    async fn handle_root_for_player(
        &mut self,
        user_id: UserId,
        target_user_id: UserId,
    ) -> Result<(), ErrorCode> {
        self.rate_limiter
            .check_rooting_change(&self.state.room_code, user_id)
            .await
            .map_err(|_| ErrorCode::RootingLimit)?;
        self.rooting.insert(user_id, target_user_id);
        self.metrics.increment_rooting_changes();
        self.send_to(user_id, RoomEvent::RootingConfirmed { target_user_id })
            .await;
        self.broadcast_rooting_update().await;
        Ok(())
    }

    async fn broadcast_rooting_update(&mut self) {
        let counts = self.rooting_counts();
        self.broadcast(RoomEvent::RootingUpdate {
            counts,
            preview: Vec::new(),
        })
        .await;
    }

    fn rooting_counts(&self) -> Vec<(UserId, u32)> {
        let mut counts: HashMap<UserId, u32> = HashMap::new();
        for &target in self.rooting.values() {
            *counts.entry(target).or_insert(0) += 1;
        }
        counts.into_iter().collect()
    }

    async fn handle_kibitz(&mut self, user_id: UserId, vote: KibitzVote) -> Result<(), ErrorCode> {
        self.kibitz_votes.insert(user_id, vote);
        self.metrics.increment_kibitz_votes();
        self.send_to(user_id, RoomEvent::KibitzConfirmed).await;
        let options = self.tally_kibitz();
        self.broadcast(RoomEvent::KibitzUpdate { options }).await;
        Ok(())
    }

    fn tally_kibitz(&self) -> Vec<crate::protocol::events::KibitzOption> {
        let total = self.kibitz_votes.len().max(1) as f32;
        let mut tally: HashMap<String, u32> = HashMap::new();
        for vote in self.kibitz_votes.values() {
            let key = match vote {
                KibitzVote::Category { category } => format!("{category:?}"),
                KibitzVote::Keep { mask } => format!("keep-{mask}"),
                KibitzVote::Action { action } => format!("{action:?}"),
            };
            *tally.entry(key).or_insert(0) += 1;
        }
        tally
            .into_iter()
            .map(|(option_id, vote_count)| crate::protocol::events::KibitzOption {
                option_id,
                vote_count,
                percentage: (vote_count as f32 / total) * 100.0,
            })
            .collect()
    }

    async fn handle_spectator_reaction(
        &mut self,
        user_id: UserId,
        emoji: String,
        target_user_id: Option<UserId>,
    ) -> Result<(), ErrorCode> {
        self.rate_limiter
            .check_reaction(user_id)
            .await
            .map_err(|_| ErrorCode::RateLimited)?;
        self.metrics.increment_spectator_reactions();
        self.send_to(
            user_id,
            RoomEvent::ReactionSent {
                emoji: emoji.clone(),
            },
        )
        .await;
        self.broadcast(RoomEvent::SpectatorReaction {
            spectator_id: user_id,
            emoji,
            target_user_id,
            play_sound: true,
        })
        .await;
        Ok(())
    }

    async fn broadcast_queue_update(&mut self) {
        let entries: Vec<UserId> = self.queue.iter().copied().collect();
        self.broadcast(RoomEvent::QueueUpdate { entries }).await;
    }

    // -----------------------------------------------------------------
    // Invites and join requests (spec §4.9)
    // -----------------------------------------------------------------

    async fn handle_send_invite(
        &mut self,
        user_id: UserId,
        target_user_id: UserId,
    ) -> Result<(), ErrorCode> {
        if !self.state.is_host(user_id) {
            return Err(ErrorCode::NotHost);
        }
        let invite_id = Uuid::new_v4().to_string();
        let expires_at =
            Utc::now() + chrono::Duration::seconds(self.config.server.invite_ttl_secs as i64);
        self.invites.insert(
            invite_id.clone(),
            PendingInvite {
                target_user_id,
                expires_at,
            },
        );
        self.metrics.increment_invites_sent();
        self.lobby
            .notify_invite(invite_id.clone(), self.state.room_code.clone(), user_id, target_user_id)
            .await;
        self.send_to(
            user_id,
            RoomEvent::InviteSent {
                invite_id,
                target_user_id,
            },
        )
        .await;
        Ok(())
    }

    /// Called when the Lobby actor forwards a join request from someone
    /// outside the room (spec §4.9). Not a `RoomCommand` — join requests
    /// originate in the Lobby, not from a connection already in this room.
    pub fn pending_join_request_event(
        request_id: String,
        requester_id: UserId,
        display_name: String,
    ) -> RoomEvent {
        RoomEvent::JoinRequestReceived {
            request_id,
            requester_id,
            display_name,
        }
    }

    async fn handle_join_request_response(
        &mut self,
        user_id: UserId,
        request_id: String,
        approved: bool,
    ) -> Result<(), ErrorCode> {
        if !self.state.is_host(user_id) {
            return Err(ErrorCode::NotHost);
        }
        self.metrics.increment_join_requests_received();
        if approved {
            self.metrics.increment_join_requests_approved();
        }
        self.lobby
            .notify_join_decision(request_id, self.state.room_code.clone(), approved)
            .await;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Alarms (spec §4.6)
    // -----------------------------------------------------------------

    fn schedule_alarm_if_sooner(&mut self, at: chrono::DateTime<chrono::Utc>, data: AlarmData) {
        let should_replace = match &self.next_alarm {
            Some((existing_at, _)) => at < *existing_at,
            None => true,
        };
        if should_replace {
            self.next_alarm = Some((at, data));
            self.metrics.increment_alarms_scheduled();
        }
    }

    /// Recompute the single next-alarm slot from the earliest seat deadline
    /// or invite/join-request expiration. Only persisted state is trusted
    /// after a wake (spec §9 Design Notes).
    fn recompute_next_alarm(&mut self) {
        let mut earliest: Option<(chrono::DateTime<chrono::Utc>, AlarmData)> = None;
        for seat in self.seats.values() {
            if let Some(deadline) = seat.reconnect_deadline {
                if earliest.as_ref().map(|(at, _)| deadline < *at).unwrap_or(true) {
                    earliest = Some((deadline, AlarmData::SeatExpiration));
                }
            }
        }
        for invite in self.invites.values() {
            if earliest
                .as_ref()
                .map(|(at, _)| invite.expires_at < *at)
                .unwrap_or(true)
            {
                earliest = Some((
                    invite.expires_at,
                    AlarmData::JoinRequestExpiration {
                        request_id: String::new(),
                    },
                ));
            }
        }
        self.next_alarm = earliest;
    }

    async fn fire_alarm(&mut self) {
        let Some((_, data)) = self.next_alarm.take() else {
            return;
        };
        self.metrics.increment_alarms_fired();
        match data {
            AlarmData::TurnTimeout { user_id } => {
                self.force_skip_turn(user_id, "turn timeout").await;
            }
            AlarmData::AfkCheck { user_id } => {
                self.broadcast(RoomEvent::PlayerAfk { user_id }).await;
            }
            AlarmData::RoomCleanup { warm_seat } => {
                if warm_seat {
                    self.complete_warm_seat_transition().await;
                } else {
                    self.state.status = RoomStatus::Abandoned;
                }
            }
            AlarmData::SeatExpiration => {
                let now = Utc::now();
                let expired: Vec<UserId> = self
                    .seats
                    .values()
                    .filter(|s| s.is_expired(now))
                    .map(|s| s.user_id)
                    .collect();
                for user_id in expired {
                    self.seats.remove(&user_id);
                    self.state.player_order.retain(|&u| u != user_id);
                    self.broadcast(RoomEvent::PlayerSeatExpired { user_id })
                        .await;
                }
                self.recompute_next_alarm();
            }
            AlarmData::JoinRequestExpiration { request_id } => {
                if !request_id.is_empty() {
                    self.broadcast(RoomEvent::JoinRequestExpired { request_id })
                        .await;
                }
                let now = Utc::now();
                self.invites.retain(|_, invite| invite.expires_at > now);
                self.recompute_next_alarm();
            }
            AlarmData::AiTurnTimeout { user_id, retry_count } => {
                if retry_count >= self.config.server.ai_turn_max_retries {
                    self.force_skip_turn(user_id, "AI turn exhausted retries").await;
                } else {
                    self.trigger_ai_turn_if_needed().await;
                }
            }
            AlarmData::PauseTimeout => {
                if self.state.status == RoomStatus::Paused {
                    self.state.status = RoomStatus::Abandoned;
                    self.broadcast(RoomEvent::RoomStatus {
                        status: RoomStatus::Abandoned,
                        reason: "pause timeout elapsed".to_string(),
                    })
                    .await;
                }
            }
        }
    }

    async fn force_skip_turn(&mut self, user_id: UserId, reason: &str) {
        if let Ok(outcome) = self.scorer.skip_turn(user_id, reason).await {
            self.broadcast(RoomEvent::TurnSkipped {
                user_id,
                reason: reason.to_string(),
            })
            .await;
            if outcome.game_completed {
                self.state.status = RoomStatus::Completed;
                self.broadcast(RoomEvent::GameOver {
                    rankings: outcome.rankings.unwrap_or_default(),
                })
                .await;
            } else if let Some(next_player_id) = outcome.next_player_id {
                self.broadcast(RoomEvent::TurnChanged {
                    current_player_id: next_player_id,
                    turn_number: 0,
                    round_number: 0,
                })
                .await;
                self.trigger_ai_turn_if_needed().await;
            }
        }
    }

    async fn complete_warm_seat_transition(&mut self) {
        if let Some(user_id) = self.queue.pop_front() {
            self.metrics.increment_warm_seat_promotions();
            self.broadcast(RoomEvent::WarmSeatComplete { user_id }).await;
        }
    }

    // -----------------------------------------------------------------
    // Broadcast helpers
    // -----------------------------------------------------------------

    fn player_info(&self, user_id: UserId) -> PlayerInfo {
        let seat = self.seats.get(&user_id);
        PlayerInfo {
            user_id,
            display_name: seat.map(|s| s.display_name.clone()).unwrap_or_default(),
            avatar_seed: seat.map(|s| s.avatar_seed.clone()).unwrap_or_default(),
            is_host: self.state.is_host(user_id),
            is_connected: seat.map(|s| s.is_connected).unwrap_or(false),
            turn_order: seat.map(|s| s.turn_order).unwrap_or(0),
            is_ai: self.ai.is_ai_player(user_id),
        }
    }

    fn player_infos(&self) -> Vec<PlayerInfo> {
        self.state
            .player_order
            .iter()
            .map(|&user_id| self.player_info(user_id))
            .collect()
    }

    /// Build the per-player scoring state handed to `Scorer::initialize_from_room`
    /// right before a game starts, so the scorer's player map matches the seats
    /// and AI players actually present in the room rather than whatever it was
    /// constructed with.
    fn game_players(&self) -> Vec<crate::protocol::game_state::PlayerGameState> {
        self.state
            .player_order
            .iter()
            .map(|&user_id| {
                let is_ai = self.ai.is_ai_player(user_id);
                let display_name = self
                    .seats
                    .get(&user_id)
                    .map(|s| s.display_name.clone())
                    .unwrap_or_else(|| {
                        self.state
                            .ai_players
                            .iter()
                            .find(|ai| ai.id == user_id.to_string())
                            .map(|ai| ai.display_name.clone())
                            .unwrap_or_default()
                    });
                crate::protocol::game_state::PlayerGameState::new(user_id, display_name, is_ai)
            })
            .collect()
    }

    async fn send_to(&mut self, user_id: UserId, event: RoomEvent) {
        let event = Arc::new(event);
        if let Some(conn) = self.connections.get(&user_id) {
            if conn.outbound.send(event.clone()).await.is_err() {
                self.metrics.increment_websocket_messages_dropped();
            }
        }
        self.reconnection.buffer_event(&self.state.room_code, (*event).clone()).await;
    }

    async fn broadcast(&mut self, event: RoomEvent) {
        let event = Arc::new(event);
        let mut dropped = Vec::new();
        for (&user_id, conn) in &self.connections {
            if conn.outbound.send(event.clone()).await.is_err() {
                dropped.push(user_id);
            }
        }
        for user_id in dropped {
            self.connections.remove(&user_id);
            self.metrics.increment_websocket_messages_dropped();
        }
        self.reconnection.buffer_event(&self.state.room_code, (*event).clone()).await;
    }
}
