//! Exercises the seat disconnect/reconnect/expire lifecycle end-to-end
//! against real alarm timing, using a short `reconnection_window_secs` so
//! the tests stay fast (spec §8 "Seat-expiry purity").

use std::sync::Arc;
use std::time::Duration;

use dicee_server::collaborators::{
    AIRoomManager, ChatManager, InMemoryChatManager, Scorer, SimpleAIRoomManager, StandardScorer,
};
use dicee_server::config::Config;
use dicee_server::lobby_actor::spawn_lobby;
use dicee_server::metrics::ServerMetrics;
use dicee_server::protocol::{ConnectionRole, GameState, RoomCode, RoomEvent, RoomSettings};
use dicee_server::rate_limit::SpectatorRateLimiter;
use dicee_server::reconnection::ReconnectionManager;
use dicee_server::room_actor::{spawn_room, RoomActorHandle};
use tokio::sync::mpsc;
use uuid::Uuid;

async fn spawn_short_window_room(host_user_id: Uuid) -> RoomActorHandle {
    let mut config = Config::default();
    config.server.reconnection_window_secs = 1;
    let config = Arc::new(config);
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
        RoomSettings::default(),
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

#[tokio::test]
async fn reconnecting_within_the_window_restores_the_seat() {
    let host = Uuid::new_v4();
    let room = spawn_short_window_room(host).await;

    let (tx, mut rx) = mpsc::channel(32);
    room.connect(host, ConnectionRole::Player, "H".to_string(), "s".to_string(), tx)
        .await
        .expect("host connect should succeed");
    let _ = rx.recv().await; // Connected

    room.disconnect(host).await;

    let (tx2, mut rx2) = mpsc::channel(32);
    let ack = room
        .connect(host, ConnectionRole::Player, "H".to_string(), "s".to_string(), tx2)
        .await
        .expect("reconnect within the window should succeed");
    assert!(ack.reconnected);

    match rx2.recv().await.expect("expected Connected").as_ref() {
        RoomEvent::Connected { reconnected, .. } => assert!(reconnected),
        other => panic!("expected Connected, got {other:?}"),
    }
    let _ = rx;

    room.shutdown().await;
}

#[tokio::test]
async fn seat_expires_after_the_reconnection_window_elapses() {
    let host = Uuid::new_v4();
    let second = Uuid::new_v4();
    let room = spawn_short_window_room(host).await;

    let (tx, mut rx) = mpsc::channel(32);
    room.connect(host, ConnectionRole::Player, "H".to_string(), "s".to_string(), tx)
        .await
        .expect("host connect should succeed");
    let _ = rx.recv().await; // Connected

    let (tx2, mut rx2) = mpsc::channel(32);
    room.connect(second, ConnectionRole::Player, "P2".to_string(), "s".to_string(), tx2)
        .await
        .expect("second player connect should succeed");
    let _ = rx.recv().await; // PlayerJoined observed by host
    let _ = rx2.recv().await; // Connected observed by second player

    room.disconnect(second).await;
    let _ = rx.recv().await; // PlayerDisconnected

    let mut expired = false;
    for _ in 0..30 {
        tokio::time::sleep(Duration::from_millis(200)).await;
        if let Ok(event) = rx.try_recv() {
            if matches!(&*event, RoomEvent::PlayerSeatExpired { user_id } if *user_id == second) {
                expired = true;
                break;
            }
        }
    }
    assert!(expired, "expected a PlayerSeatExpired broadcast once the window elapsed");

    // The seat is gone; reconnecting now is treated as a fresh join, not a
    // resumed seat.
    let (tx3, _rx3) = mpsc::channel(32);
    let ack = room
        .connect(second, ConnectionRole::Player, "P2".to_string(), "s".to_string(), tx3)
        .await
        .expect("rejoining after expiry should succeed as a new seat");
    assert!(!ack.reconnected);

    room.shutdown().await;
}
