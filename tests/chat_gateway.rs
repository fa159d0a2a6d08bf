mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FlakyRemote, START};
use onrail::cache::keys::{message_path, room_relevance_path};
use onrail::cache::{ChatCacheOperations, MemoryRemoteCache, RemoteCache};
use onrail::chat::{ChatLimits, MessageCallback, MessageGateway, SendError, message_key};
use onrail::clock::ManualClock;
use onrail::models::{ChatRoom, Message, NewMessage};
use tokio::sync::mpsc;

const WEEK_MILLIS: i64 = 7 * 24 * 60 * 60 * 1000;

fn gateway_with(remote: Arc<dyn RemoteCache>, clock: Arc<ManualClock>) -> MessageGateway {
    MessageGateway::new(remote, clock, ChatLimits::default())
}

fn setup() -> (Arc<ManualClock>, Arc<MemoryRemoteCache>, MessageGateway) {
    let clock = Arc::new(ManualClock::new(START));
    let remote = Arc::new(MemoryRemoteCache::new(clock.clone()));
    let gateway = gateway_with(remote.clone(), clock.clone());
    (clock, remote, gateway)
}

fn collector() -> (MessageCallback, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: MessageCallback = Arc::new(move |message| {
        let _ = tx.send(message);
    });
    (callback, rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Message>) -> Message {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("message in time")
        .expect("channel open")
}

async fn seed_message(chats: &ChatCacheOperations, clock: &ManualClock, room: &ChatRoom, at: i64) -> String {
    clock.set(at);
    let key = message_key(at);
    let message = NewMessage::text("seed", format!("at {}", at)).into_message(at);
    chats.put_message(room, &key, &message).await.unwrap();
    key
}

#[tokio::test]
async fn second_send_within_cooldown_is_rejected() {
    let (clock, remote, gateway) = setup();
    let room = ChatRoom::train("2613");

    assert!(gateway.send(&room, NewMessage::text("u1", "first")).await);
    clock.advance(Duration::from_secs(4));
    assert!(!gateway.send(&room, NewMessage::text("u1", "second")).await);

    let stored = remote.get("chats/train/2613").await.unwrap().unwrap();
    assert_eq!(stored.as_object().unwrap().len(), 1);

    clock.advance(Duration::from_secs(1));
    assert!(gateway.send(&room, NewMessage::text("u1", "third")).await);
}

#[tokio::test]
async fn cooldown_error_reports_retry_after() {
    let (clock, _remote, gateway) = setup();
    let room = ChatRoom::train("2613");

    gateway.try_send(&room, NewMessage::text("u1", "hi")).await.unwrap();
    clock.advance(Duration::from_millis(1_500));

    match gateway.try_send(&room, NewMessage::text("u1", "again")).await {
        Err(SendError::CoolingDown { retry_after_ms }) => assert_eq!(retry_after_ms, 3_500),
        other => panic!("expected cooldown, got {:?}", other),
    }
}

#[tokio::test]
async fn overlong_content_is_rejected_and_still_consumes_cooldown() {
    let (clock, remote, gateway) = setup();
    let room = ChatRoom::territory("Budapest");

    let result = gateway.try_send(&room, NewMessage::text("u1", "x".repeat(501))).await;
    assert!(matches!(
        result,
        Err(SendError::ContentTooLong { len: 501, limit: 500 })
    ));
    assert_eq!(remote.get("chats").await.unwrap(), None);

    let result = gateway.try_send(&room, NewMessage::text("u1", "short")).await;
    assert!(matches!(result, Err(SendError::CoolingDown { .. })));

    clock.advance(Duration::from_secs(5));
    let message = gateway
        .try_send(&room, NewMessage::text("u1", "é".repeat(500)))
        .await
        .unwrap();
    assert_eq!(message.content_len(), 500);
}

#[tokio::test]
async fn invalid_room_does_not_consume_cooldown() {
    let (_clock, _remote, gateway) = setup();

    let result = gateway.try_send(&ChatRoom::train("a/b"), NewMessage::text("u1", "hi")).await;
    assert!(matches!(result, Err(SendError::InvalidRoom(_))));

    assert!(gateway.send(&ChatRoom::train("2613"), NewMessage::text("u1", "hi")).await);
}

#[tokio::test]
async fn stored_message_uses_server_timestamp_and_bumps_relevance() {
    let (_clock, remote, gateway) = setup();
    let room = ChatRoom::train("2613");
    let mut new_message = NewMessage::text("u1", "hello");
    new_message.sender_name = "Anna".into();
    new_message.timestamp = Some(42);

    let message = gateway.try_send(&room, new_message).await.unwrap();
    let key = message.key.clone().unwrap();

    assert!(key.starts_with("0000000000042-"));
    assert_eq!(message.timestamp, START);
    assert_eq!(message.sender_name, "Anna");

    let stored = remote.get(&message_path(&room, &key)).await.unwrap().unwrap();
    assert_eq!(stored["timestamp"], START);
    assert_eq!(stored["content"], "hello");
    assert!(stored.get("key").is_none());
    assert_eq!(
        remote.get(&room_relevance_path(&room)).await.unwrap(),
        Some(serde_json::json!(START))
    );

    let relevances = gateway.chat_relevances().await;
    assert_eq!(relevances.train.unwrap().get("2613"), Some(&START));
    assert!(relevances.territory.is_none());
}

#[tokio::test]
async fn eviction_respects_retention_boundary() {
    let (clock, remote, gateway) = setup();
    let chats = ChatCacheOperations::new(remote.clone());
    let room = ChatRoom::train("2613");

    let expired = seed_message(&chats, &clock, &room, START - WEEK_MILLIS - 1).await;
    let kept = seed_message(&chats, &clock, &room, START - WEEK_MILLIS + 1).await;
    clock.set(START);

    let summary = gateway.evict_old_messages().await;

    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.failed, 0);
    assert!(chats.get_message(&room, &expired).await.unwrap().is_none());
    assert!(chats.get_message(&room, &kept).await.unwrap().is_some());
}

#[tokio::test]
async fn eviction_continues_past_failed_deletes() {
    let clock = Arc::new(ManualClock::new(START));
    let inner = Arc::new(MemoryRemoteCache::new(clock.clone()));
    let remote = Arc::new(FlakyRemote::new(inner));
    let gateway = gateway_with(remote.clone(), clock.clone());
    let chats = ChatCacheOperations::new(remote.clone());

    let train = ChatRoom::train("2613");
    let territory = ChatRoom::territory("Pest");
    let old = START - 2 * WEEK_MILLIS;
    let first = seed_message(&chats, &clock, &train, old).await;
    let stuck = seed_message(&chats, &clock, &train, old + 1).await;
    let other = seed_message(&chats, &clock, &territory, old + 2).await;
    let recent = seed_message(&chats, &clock, &territory, START - 1_000).await;
    remote.fail_remove_of(&stuck);
    clock.set(START);

    let summary = gateway.evict_old_messages().await;

    assert_eq!(summary.scanned, 4);
    assert_eq!(summary.removed, 2);
    assert_eq!(summary.failed, 1);
    assert!(chats.get_message(&train, &first).await.unwrap().is_none());
    assert!(chats.get_message(&train, &stuck).await.unwrap().is_some());
    assert!(chats.get_message(&territory, &other).await.unwrap().is_none());
    assert!(chats.get_message(&territory, &recent).await.unwrap().is_some());
}

#[tokio::test]
async fn eviction_with_no_messages_is_a_no_op() {
    let (_clock, _remote, gateway) = setup();
    let summary = gateway.evict_old_messages().await;
    assert_eq!(summary.scanned, 0);
    assert_eq!(summary.removed, 0);
}

#[tokio::test]
async fn listen_replays_existing_and_streams_changes() {
    let (clock, _remote, gateway) = setup();
    let room = ChatRoom::train("2613");
    gateway.send(&room, NewMessage::text("u1", "before")).await;

    let (on_added, mut added) = collector();
    let (on_removed, mut removed) = collector();
    gateway.listen(&room, on_added, on_removed).await.unwrap();
    assert_eq!(gateway.active_listeners(), 1);

    let replayed = next(&mut added).await;
    assert_eq!(replayed.content, "before");
    assert!(replayed.key.is_some());

    clock.advance(Duration::from_secs(5));
    let sent = gateway
        .try_send(&room, NewMessage::text("u2", "after"))
        .await
        .unwrap();
    let live = next(&mut added).await;
    assert_eq!(live.content, "after");
    assert_eq!(live.key, sent.key);

    let key = sent.key.unwrap();
    assert!(gateway.remove_message(&room, &key).await);
    let gone = next(&mut removed).await;
    assert_eq!(gone.key.as_deref(), Some(key.as_str()));
}

#[tokio::test]
async fn listen_ignores_other_rooms() {
    let (_clock, _remote, gateway) = setup();
    let (on_added, mut added) = collector();
    let (on_removed, _removed) = collector();
    gateway
        .listen(&ChatRoom::train("2613"), on_added, on_removed)
        .await
        .unwrap();

    gateway.send(&ChatRoom::train("999"), NewMessage::text("u1", "elsewhere")).await;

    let result = tokio::time::timeout(Duration::from_millis(200), added.recv()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn stop_listening_is_idempotent_and_silences_callbacks() {
    let (_clock, _remote, gateway) = setup();
    let room = ChatRoom::train("2613");
    let (on_added, mut added) = collector();
    let (on_removed, _removed) = collector();
    gateway.listen(&room, on_added, on_removed).await.unwrap();

    gateway.stop_listening();
    gateway.stop_listening();
    assert_eq!(gateway.active_listeners(), 0);

    gateway.send(&room, NewMessage::text("u1", "unheard")).await;

    let result = tokio::time::timeout(Duration::from_millis(200), added.recv()).await;
    assert!(!matches!(result, Ok(Some(_))));
}

#[tokio::test]
async fn dropping_a_subscription_unsubscribes() {
    let (clock, _remote, gateway) = setup();
    let room = ChatRoom::train("2613");
    let (on_added, mut added) = collector();
    let (on_removed, _removed) = collector();

    let subscription = gateway.subscribe(&room, on_added, on_removed).await.unwrap();
    gateway.send(&room, NewMessage::text("u1", "heard")).await;
    assert_eq!(next(&mut added).await.content, "heard");

    drop(subscription);
    clock.advance(Duration::from_secs(5));
    gateway.send(&room, NewMessage::text("u1", "unheard")).await;

    let result = tokio::time::timeout(Duration::from_millis(200), added.recv()).await;
    assert!(!matches!(result, Ok(Some(_))));
}

#[tokio::test]
async fn remove_message_touches_exactly_one_message() {
    let (clock, remote, gateway) = setup();
    let room = ChatRoom::train("2613");
    let neighbour = ChatRoom::train("999");

    let first = gateway.try_send(&room, NewMessage::text("u1", "one")).await.unwrap();
    clock.advance(Duration::from_secs(5));
    let second = gateway.try_send(&room, NewMessage::text("u1", "two")).await.unwrap();
    clock.advance(Duration::from_secs(5));
    gateway.try_send(&neighbour, NewMessage::text("u1", "three")).await.unwrap();

    let first_key = first.key.unwrap();
    assert!(gateway.remove_message(&room, &first_key).await);

    let room_value = remote.get("chats/train/2613").await.unwrap().unwrap();
    let keys: Vec<&String> = room_value.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec![second.key.as_ref().unwrap()]);
    assert!(remote.get("chats/train/999").await.unwrap().is_some());
}

#[tokio::test]
async fn remove_message_rejects_keys_that_are_not_a_single_segment() {
    let (_clock, remote, gateway) = setup();
    let room = ChatRoom::train("2613");
    let sent = gateway.try_send(&room, NewMessage::text("u1", "keep me")).await.unwrap();
    let key = sent.key.unwrap();

    for bad in ["/", "", "//", format!("{}/content", key).as_str(), "a.b", "k$"] {
        assert!(!gateway.remove_message(&room, bad).await, "key {:?}", bad);
    }
    assert!(!gateway.remove_message(&ChatRoom::train("a/b"), &key).await);

    let stored = remote.get(&message_path(&room, &key)).await.unwrap().unwrap();
    assert_eq!(stored["content"], "keep me");
}
