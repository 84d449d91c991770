//! Integration tests driving `RoomActorHandle` the way the websocket layer
//! does: connect, dispatch commands, read events off the outbound channel.

use std::sync::Arc;

use dicee_server::collaborators::{
    AIRoomManager, ChatManager, InMemoryChatManager, Scorer, SimpleAIRoomManager, StandardScorer,
};
use dicee_server::config::Config;
use dicee_server::lobby_actor::spawn_lobby;
use dicee_server::metrics::ServerMetrics;
use dicee_server::protocol::commands::RoomCommand;
use dicee_server::protocol::{
    Category, ConnectionRole, ErrorCode, GameState, RoomCode, RoomEvent, RoomSettings,
};
use dicee_server::rate_limit::SpectatorRateLimiter;
use dicee_server::reconnection::ReconnectionManager;
use dicee_server::room_actor::{spawn_room, RoomActorHandle};
use tokio::sync::mpsc;
use uuid::Uuid;

fn test_config() -> Arc<Config> {
    Arc::new(Config::default())
}

async fn spawn_test_room(host_user_id: Uuid, settings: RoomSettings) -> RoomActorHandle {
    let config = test_config();
    let metrics = Arc::new(ServerMetrics::new());
    let rate_limiter = Arc::new(SpectatorRateLimiter::with_metrics(
        config.rate_limit.clone(),
        metrics.clone(),
    ));
    let reconnection = Arc::new(ReconnectionManager::new(
        config.server.reconnection_window_secs,
        config.server.event_buffer_size,
        metrics.clone(),
    ));
    let scorer: Arc<dyn Scorer> =
        Arc::new(StandardScorer::new(GameState::new(Vec::new(), Default::default())));
    let chat: Arc<dyn ChatManager> = Arc::new(InMemoryChatManager::new());
    let ai: Arc<dyn AIRoomManager> = Arc::new(SimpleAIRoomManager::new());
    let lobby = spawn_lobby(
        config.server.event_buffer_size,
        metrics.clone(),
        rate_limiter.clone(),
        config.server.join_request_ttl_secs,
    );

    spawn_room(
        RoomCode::normalize("ABCDEF"),
        host_user_id,
        settings,
        config,
        metrics,
        rate_limiter,
        reconnection,
        scorer,
        chat,
        ai,
        lobby,
    )
}

async fn connect(
    room: &RoomActorHandle,
    user_id: Uuid,
    role: ConnectionRole,
) -> (mpsc::Receiver<Arc<RoomEvent>>, Result<dicee_server::room_actor::ConnectAck, ErrorCode>) {
    let (tx, rx) = mpsc::channel(32);
    let ack = room
        .connect(user_id, role, "Player".to_string(), "seed".to_string(), tx)
        .await;
    (rx, ack)
}

#[tokio::test]
async fn host_connects_and_becomes_host() {
    let host = Uuid::new_v4();
    let room = spawn_test_room(host, RoomSettings::default()).await;

    let (mut rx, ack) = connect(&room, host, ConnectionRole::Player).await;
    let ack = ack.expect("host connect should succeed");
    assert!(ack.is_host);
    assert!(!ack.reconnected);

    match rx.recv().await.expect("expected a Connected event").as_ref() {
        RoomEvent::Connected { reconnected, .. } => assert!(!reconnected),
        other => panic!("expected Connected, got {other:?}"),
    }

    room.shutdown().await;
}

#[tokio::test]
async fn solo_quick_play_rolls_dice_for_the_host() {
    let host = Uuid::new_v4();
    let room = spawn_test_room(host, RoomSettings::default()).await;
    let (mut rx, ack) = connect(&room, host, ConnectionRole::Player).await;
    ack.expect("host connect should succeed");
    let _ = rx.recv().await; // Connected

    room.dispatch(
        host,
        RoomCommand::QuickPlayStart {
            ai_profiles: Vec::new(),
        },
    )
    .await
    .expect("quick play start should be accepted for the host");

    let mut saw_started = false;
    while let Some(event) = rx.recv().await {
        if let RoomEvent::QuickPlayStarted { current_player_id, .. } = &*event {
            assert_eq!(*current_player_id, host);
            saw_started = true;
            break;
        }
    }
    assert!(saw_started, "expected QuickPlayStarted broadcast");

    room.dispatch(host, RoomCommand::DiceRoll { kept: vec![] })
        .await
        .expect("first roll should be accepted");

    let mut saw_roll = false;
    while let Some(event) = rx.recv().await {
        if let RoomEvent::DiceRolled { player_id, roll_number, .. } = &*event {
            assert_eq!(*player_id, host);
            assert_eq!(*roll_number, 1);
            saw_roll = true;
            break;
        }
    }
    assert!(saw_roll, "expected DiceRolled broadcast");

    room.shutdown().await;
}

#[tokio::test]
async fn non_host_start_game_is_rejected() {
    let host = Uuid::new_v4();
    let other = Uuid::new_v4();
    let room = spawn_test_room(host, RoomSettings::default()).await;

    let (_rx, ack) = connect(&room, host, ConnectionRole::Player).await;
    ack.expect("host connect should succeed");

    let err = room
        .dispatch(other, RoomCommand::StartGame)
        .await
        .expect_err("a user who never connected cannot start the game");
    assert_eq!(err, ErrorCode::NotHost);

    room.shutdown().await;
}

#[tokio::test]
async fn scoring_an_unknown_category_is_rejected_cleanly() {
    let host = Uuid::new_v4();
    let room = spawn_test_room(host, RoomSettings::default()).await;
    let (mut rx, ack) = connect(&room, host, ConnectionRole::Player).await;
    ack.expect("host connect should succeed");
    let _ = rx.recv().await; // Connected

    room.dispatch(host, RoomCommand::StartGame)
        .await
        .expect("host can start a solo game");

    // Scoring before a roll has happened is invalid turn state, not a panic.
    let result = room
        .dispatch(host, RoomCommand::CategoryScore { category: Category::Ones })
        .await;
    assert!(result.is_err(), "scoring without an active roll must be rejected");

    room.shutdown().await;
}

#[tokio::test]
async fn spectator_is_rejected_when_the_room_disallows_spectators() {
    let host = Uuid::new_v4();
    let settings = RoomSettings {
        max_players: 1,
        allow_spectators: false,
        ..RoomSettings::default()
    };
    let room = spawn_test_room(host, settings).await;
    let (_rx, ack) = connect(&room, host, ConnectionRole::Player).await;
    ack.expect("host connect should succeed");

    let spectator = Uuid::new_v4();
    let (_srx, spectator_ack) = connect(&room, spectator, ConnectionRole::Spectator).await;
    assert_eq!(spectator_ack.unwrap_err(), ErrorCode::NotSpectator);

    room.shutdown().await;
}
