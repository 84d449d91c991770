//! Per-socket reader/writer tasks (spec §4.2 "Message handling" and "Close
//! handling"). Mirrors the teacher's `connection.rs::handle_socket`: split
//! the socket, spawn a writer task draining an outbound channel, run the
//! reader loop with `tokio::select!` so the writer side and an external
//! fan-out (here: chat) can both feed the same socket.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::collaborators::ChatManager;
use crate::protocol::commands::LobbyCommand;
use crate::protocol::events::LobbyEvent;
use crate::protocol::{ConnectionRole, ErrorCode, RoomCode, RoomCommand, RoomEvent};
use crate::room_actor::RoomActorHandle;
use crate::server::AppState;

const CLOSE_UNSUPPORTED_DATA: u16 = 1003;
const CLOSE_INTERNAL_ERROR: u16 = 1011;
const CLOSE_ROOM_FULL: u16 = 4003;
const CLOSE_ROOM_NOT_FOUND: u16 = 4004;

fn close_frame(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason),
    }))
}

fn connect_error_close(code: ErrorCode) -> Message {
    match code {
        ErrorCode::RoomFull => close_frame(CLOSE_ROOM_FULL, "room full"),
        ErrorCode::RoomNotFound => close_frame(CLOSE_ROOM_NOT_FOUND, "room not found"),
        _ => close_frame(CLOSE_INTERNAL_ERROR, "could not join room"),
    }
}

/// Chat-routed envelope kinds (spec §6: "Chat types route through an
/// external `ChatManager` with a fixed contract"). Everything else is
/// deserialized straight into `RoomCommand`.
const CHAT_MESSAGE: &str = "CHAT_MESSAGE";
const QUICK_CHAT: &str = "QUICK_CHAT";
const CHAT_REACTION: &str = "CHAT_REACTION";
const TYPING_START: &str = "TYPING_START";
const TYPING_STOP: &str = "TYPING_STOP";
const SHOUT: &str = "SHOUT";

fn chat_message_envelope(message: &crate::collaborators::ChatMessage) -> Value {
    json!({
        "type": CHAT_MESSAGE,
        "payload": {
            "id": message.id,
            "userId": message.user_id,
            "displayName": message.display_name,
            "body": message.body,
            "createdAt": message.created_at_epoch_ms,
        }
    })
}

/// Classify a failed `RoomCommand`/`LobbyCommand` deserialization as either
/// an unrecognized type (`UNKNOWN_COMMAND`) or a malformed payload for a
/// type we do recognize (`INVALID_MESSAGE`), per spec §4.2's distinction
/// between the two.
fn classify_parse_error(err: &serde_json::Error) -> ErrorCode {
    if err.to_string().contains("unknown variant") {
        ErrorCode::UnknownCommand
    } else {
        ErrorCode::InvalidMessage
    }
}

fn room_event_envelope(event: &RoomEvent) -> Value {
    let value = serde_json::to_value(event).unwrap_or(Value::Null);
    json!({
        "type": value.get("type").cloned().unwrap_or(Value::Null),
        "payload": value.get("payload").cloned().unwrap_or(Value::Null),
        "timestamp": chrono::Utc::now().timestamp_millis(),
    })
}

fn lobby_event_envelope(event: &LobbyEvent) -> Value {
    let value = serde_json::to_value(event).unwrap_or(Value::Null);
    json!({
        "type": value.get("type").cloned().unwrap_or(Value::Null),
        "payload": value.get("payload").cloned().unwrap_or(Value::Null),
        "timestamp": chrono::Utc::now().timestamp_millis(),
    })
}

pub async fn handle_room_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    room_code: RoomCode,
    user_id: Uuid,
    role: ConnectionRole,
    display_name: String,
    avatar_seed: String,
) {
    let room = match role {
        ConnectionRole::Spectator => match state.get_room(&room_code) {
            Some(handle) => handle,
            None => {
                let (mut sink, _) = socket.split();
                let _ = sink
                    .send(close_frame(CLOSE_ROOM_NOT_FOUND, "room not found"))
                    .await;
                return;
            }
        },
        ConnectionRole::Player => state.get_or_create_room(&room_code, user_id),
    };

    let (outbound_tx, mut outbound_rx) =
        mpsc::channel::<Arc<RoomEvent>>(state.config.server.event_buffer_size.max(16));

    let chat_display_name = display_name.clone();
    let ack = match room
        .connect(user_id, role, display_name, avatar_seed, outbound_tx.clone())
        .await
    {
        Ok(ack) => ack,
        Err(code) => {
            state.metrics.increment_room_join_failures();
            let (mut sink, _) = socket.split();
            let _ = sink.send(connect_error_close(code)).await;
            return;
        }
    };
    state.metrics.increment_connections();
    info!(
        %room_code, %user_id, is_host = ack.is_host, reconnected = ack.reconnected,
        "room socket connected"
    );

    let mut chat_rx = state.subscribe_chat(&room_code);
    let (mut sink, mut stream) = socket.split();
    let (close_tx, mut close_rx) = mpsc::channel::<Message>(1);

    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                close = close_rx.recv() => {
                    if let Some(frame) = close {
                        let _ = sink.send(frame).await;
                    }
                    break;
                }
                event = outbound_rx.recv() => {
                    match event {
                        Some(event) => {
                            let text = room_event_envelope(&event).to_string();
                            if sink.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                chat = async {
                    match chat_rx.as_mut() {
                        Some(rx) => rx.recv().await.ok(),
                        None => std::future::pending().await,
                    }
                } => {
                    if let Some(frame) = chat {
                        if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    });

    let chat = room.chat.clone();
    while let Some(frame) = stream.next().await {
        let Ok(message) = frame else { break };
        match message {
            Message::Text(text) => {
                handle_room_text(
                    &state,
                    &room_code,
                    &room,
                    &chat,
                    &outbound_tx,
                    user_id,
                    &chat_display_name,
                    &text,
                )
                .await;
            }
            Message::Binary(_) => {
                let _ = close_tx
                    .send(close_frame(CLOSE_UNSUPPORTED_DATA, "binary not supported"))
                    .await;
                break;
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    room.disconnect(user_id).await;
    state.metrics.decrement_active_connections();
    writer.abort();
}

#[allow(clippy::too_many_arguments)]
async fn handle_room_text(
    state: &Arc<AppState>,
    room_code: &RoomCode,
    room: &RoomActorHandle,
    chat: &Arc<dyn ChatManager>,
    outbound: &mpsc::Sender<Arc<RoomEvent>>,
    user_id: Uuid,
    display_name: &str,
    text: &str,
) {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        send_private_error(outbound, ErrorCode::InvalidMessage).await;
        return;
    };

    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        send_private_error(outbound, ErrorCode::InvalidMessage).await;
        return;
    };
    let payload = value.get("payload").cloned().unwrap_or(Value::Null);

    match kind {
        CHAT_MESSAGE => {
            let body = payload.get("body").and_then(Value::as_str).unwrap_or_default();
            if let Ok(message) = chat.handle_text_message(user_id, display_name, body).await {
                state.publish_chat(room_code, chat_message_envelope(&message));
            }
        }
        QUICK_CHAT => {
            let phrase_id = payload.get("phraseId").and_then(Value::as_str).unwrap_or_default();
            if let Ok(message) = chat.handle_quick_chat(user_id, phrase_id).await {
                state.publish_chat(room_code, chat_message_envelope(&message));
            }
        }
        CHAT_REACTION => {
            let emoji = payload.get("emoji").and_then(Value::as_str).unwrap_or_default();
            if let Ok(message) = chat.handle_reaction(user_id, emoji).await {
                state.publish_chat(room_code, chat_message_envelope(&message));
            }
        }
        SHOUT => {
            let body = payload.get("body").and_then(Value::as_str).unwrap_or_default();
            if let Ok(message) = chat.handle_shout(user_id, body).await {
                state.publish_chat(room_code, chat_message_envelope(&message));
            }
        }
        TYPING_START => {
            let _ = chat.handle_typing_start(user_id).await;
            state.publish_chat(
                room_code,
                json!({"type": TYPING_START, "payload": {"userId": user_id}}),
            );
        }
        TYPING_STOP => {
            let _ = chat.handle_typing_stop(user_id).await;
            state.publish_chat(
                room_code,
                json!({"type": TYPING_STOP, "payload": {"userId": user_id}}),
            );
        }
        _ => match serde_json::from_value::<RoomCommand>(json!({"type": kind, "payload": payload})) {
            Ok(command) => {
                if let Err(code) = room.dispatch(user_id, command).await {
                    send_private_error(outbound, code).await;
                }
            }
            Err(err) => {
                send_private_error(outbound, classify_parse_error(&err)).await;
            }
        },
    }
}

async fn send_private_error(outbound: &mpsc::Sender<Arc<RoomEvent>>, code: ErrorCode) {
    let event = RoomEvent::Error {
        code,
        message: code.description().to_string(),
    };
    let _ = outbound.send(Arc::new(event)).await;
}

pub async fn handle_lobby_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    user_id: Uuid,
    _display_name: String,
    _avatar_seed: String,
) {
    let (outbound_tx, mut outbound_rx) =
        mpsc::channel::<Arc<LobbyEvent>>(state.config.server.event_buffer_size.max(16));
    state.lobby.join(user_id, outbound_tx).await;
    state.metrics.increment_connections();

    let (mut sink, mut stream) = socket.split();
    let (close_tx, mut close_rx) = mpsc::channel::<Message>(1);

    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                close = close_rx.recv() => {
                    if let Some(frame) = close {
                        let _ = sink.send(frame).await;
                    }
                    break;
                }
                event = outbound_rx.recv() => {
                    match event {
                        Some(event) => {
                            let text = lobby_event_envelope(&event).to_string();
                            if sink.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let Ok(message) = frame else { break };
        match message {
            Message::Text(text) => {
                handle_lobby_text(&state, user_id, &text).await;
            }
            Message::Binary(_) => {
                let _ = close_tx
                    .send(close_frame(CLOSE_UNSUPPORTED_DATA, "binary not supported"))
                    .await;
                break;
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    state.lobby.leave(user_id).await;
    state.metrics.decrement_active_connections();
    writer.abort();
}

async fn handle_lobby_text(state: &Arc<AppState>, user_id: Uuid, text: &str) {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        warn!(%user_id, "invalid lobby message");
        return;
    };
    let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
    let payload = value.get("payload").cloned().unwrap_or(Value::Null);

    match serde_json::from_value::<LobbyCommand>(json!({"type": kind, "payload": payload})) {
        Ok(command) => {
            let _ = state.lobby.dispatch(user_id, command).await;
        }
        Err(err) => {
            warn!(%user_id, code = ?classify_parse_error(&err), "lobby command rejected");
        }
    }
}
