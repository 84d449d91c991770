//! Integration tests for the singleton Lobby actor: presence and lobby
//! chat, driven through `LobbyActorHandle` the same way the websocket layer
//! does.

use std::sync::Arc;

use dicee_server::lobby_actor::spawn_lobby;
use dicee_server::metrics::ServerMetrics;
use dicee_server::protocol::commands::LobbyCommand;
use dicee_server::protocol::LobbyEvent;
use dicee_server::rate_limit::SpectatorRateLimiter;
use tokio::sync::mpsc;
use uuid::Uuid;

fn test_rate_limiter() -> Arc<SpectatorRateLimiter> {
    let metrics = Arc::new(ServerMetrics::new());
    Arc::new(SpectatorRateLimiter::with_metrics(
        Default::default(),
        metrics,
    ))
}

#[tokio::test]
async fn joining_sends_presence_init_then_broadcasts_presence_join() {
    let metrics = Arc::new(ServerMetrics::new());
    let lobby = spawn_lobby(32, metrics, test_rate_limiter(), 300);

    let first = Uuid::new_v4();
    let (tx1, mut rx1) = mpsc::channel(16);
    lobby.join(first, tx1).await;

    match rx1.recv().await.expect("expected PresenceInit").as_ref() {
        LobbyEvent::PresenceInit { online_users } => assert_eq!(online_users, &vec![first]),
        other => panic!("expected PresenceInit, got {other:?}"),
    }

    let second = Uuid::new_v4();
    let (tx2, mut rx2) = mpsc::channel(16);
    lobby.join(second, tx2).await;
    let _ = rx2.recv().await; // PresenceInit for the second user

    match rx1.recv().await.expect("first user should see the second join").as_ref() {
        LobbyEvent::PresenceJoin { user_id } => assert_eq!(*user_id, second),
        other => panic!("expected PresenceJoin, got {other:?}"),
    }
}

#[tokio::test]
async fn leaving_broadcasts_presence_leave_to_remaining_users() {
    let metrics = Arc::new(ServerMetrics::new());
    let lobby = spawn_lobby(32, metrics, test_rate_limiter(), 300);

    let first = Uuid::new_v4();
    let (tx1, mut rx1) = mpsc::channel(16);
    lobby.join(first, tx1).await;
    let _ = rx1.recv().await; // PresenceInit

    let second = Uuid::new_v4();
    let (tx2, mut rx2) = mpsc::channel(16);
    lobby.join(second, tx2).await;
    let _ = rx2.recv().await; // PresenceInit
    let _ = rx1.recv().await; // PresenceJoin for second

    lobby.leave(second).await;
    match rx1.recv().await.expect("expected PresenceLeave").as_ref() {
        LobbyEvent::PresenceLeave { user_id } => assert_eq!(*user_id, second),
        other => panic!("expected PresenceLeave, got {other:?}"),
    }
}

#[tokio::test]
async fn lobby_chat_is_broadcast_to_every_connected_user() {
    let metrics = Arc::new(ServerMetrics::new());
    let lobby = spawn_lobby(32, metrics, test_rate_limiter(), 300);

    let sender = Uuid::new_v4();
    let (tx1, mut rx1) = mpsc::channel(16);
    lobby.join(sender, tx1).await;
    let _ = rx1.recv().await; // PresenceInit

    let listener = Uuid::new_v4();
    let (tx2, mut rx2) = mpsc::channel(16);
    lobby.join(listener, tx2).await;
    let _ = rx2.recv().await; // PresenceInit
    let _ = rx1.recv().await; // PresenceJoin for listener

    lobby
        .dispatch(
            sender,
            LobbyCommand::LobbyChat {
                text: "hi all".to_string(),
            },
        )
        .await
        .expect("chat dispatch should succeed");

    match rx2.recv().await.expect("listener should receive the chat message").as_ref() {
        LobbyEvent::LobbyChatMessage { user_id, text } => {
            assert_eq!(*user_id, sender);
            assert_eq!(text, "hi all");
        }
        other => panic!("expected LobbyChatMessage, got {other:?}"),
    }
}
