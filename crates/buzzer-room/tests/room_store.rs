//! Integration tests for the room store and its per-room actors.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use buzzer_protocol::{RoomCode, RoomSnapshot, SubscriberId};
use buzzer_room::{
    Broadcaster, Clock, CodeGenerator, Outcome, RoomError, RoomStore,
    StoreConfig,
};
use tokio::sync::Notify;

// =========================================================================
// Fakes
// =========================================================================

/// Remembers every published snapshot.
#[derive(Default)]
struct RecordingBroadcaster {
    published: Mutex<Vec<(RoomCode, RoomSnapshot)>>,
}

impl RecordingBroadcaster {
    fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    fn last(&self) -> Option<RoomSnapshot> {
        self.published.lock().unwrap().last().map(|(_, s)| s.clone())
    }

    fn codes(&self) -> Vec<RoomCode> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(c, _)| c.clone())
            .collect()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn publish(&self, code: &RoomCode, snapshot: &RoomSnapshot) {
        self.published
            .lock()
            .unwrap()
            .push((code.clone(), snapshot.clone()));
    }
}

/// Parks the publishing room actor inside `publish` for one chosen room
/// until released. Other rooms publish straight through.
#[derive(Default)]
struct GatedBroadcaster {
    gated: Mutex<Option<RoomCode>>,
    open: Mutex<bool>,
    opened: Condvar,
    entered: Notify,
}

impl GatedBroadcaster {
    fn gate(&self, code: &RoomCode) {
        *self.gated.lock().unwrap() = Some(code.clone());
    }

    fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }

    async fn wait_entered(&self) {
        tokio::time::timeout(Duration::from_secs(2), self.entered.notified())
            .await
            .expect("gated room never published");
    }
}

impl Broadcaster for GatedBroadcaster {
    fn publish(&self, code: &RoomCode, _snapshot: &RoomSnapshot) {
        if self.gated.lock().unwrap().as_ref() != Some(code) {
            return;
        }
        self.entered.notify_one();
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.opened.wait(open).unwrap();
        }
    }
}

/// A clock the test moves by hand.
#[derive(Clone, Default)]
struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    fn set(&self, millis: u64) {
        self.0.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Hands out codes from a fixed list, repeating the last one forever.
struct ScriptedCodes {
    codes: Vec<&'static str>,
    next: Mutex<usize>,
}

impl ScriptedCodes {
    fn new(codes: &[&'static str]) -> Self {
        Self {
            codes: codes.to_vec(),
            next: Mutex::new(0),
        }
    }
}

impl CodeGenerator for ScriptedCodes {
    fn generate(&self) -> RoomCode {
        let mut next = self.next.lock().unwrap();
        let idx = (*next).min(self.codes.len() - 1);
        *next += 1;
        RoomCode::parse(self.codes[idx]).unwrap()
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn sub(id: u64) -> SubscriberId {
    SubscriberId(id)
}

fn setup() -> (RoomStore, Arc<RecordingBroadcaster>, ManualClock) {
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let clock = ManualClock::default();
    let store = RoomStore::builder(Arc::clone(&broadcaster))
        .clock(clock.clone())
        .build();
    (store, broadcaster, clock)
}

async fn room_with(store: &RoomStore, players: &[&str]) -> RoomCode {
    let code = store.create_room("Quiz").await.unwrap().code;
    for name in players {
        store.join_room(&code, name).await.unwrap();
    }
    code
}

fn applied(outcome: Outcome) -> RoomSnapshot {
    outcome.into_snapshot().expect("transition should apply")
}

// =========================================================================
// create_room / snapshot
// =========================================================================

#[tokio::test]
async fn test_create_room_starts_in_lobby() {
    let (store, broadcaster, _) = setup();

    let room = store.create_room("Trivia").await.unwrap();

    assert_eq!(room.name, "Trivia");
    assert!(room.players.is_empty());
    assert!(!room.game_started);
    assert_eq!(room.game_start_time, None);
    assert_eq!(store.room_count().await, 1);
    assert_eq!(broadcaster.count(), 0, "nobody to tell about a new room");
}

#[tokio::test]
async fn test_create_room_codes_are_unique() {
    let (store, _, _) = setup();

    let mut seen = HashSet::new();
    for _ in 0..50 {
        let code = store.create_room("Room").await.unwrap().code;
        assert!(seen.insert(code), "duplicate room code");
    }
    assert_eq!(store.room_count().await, 50);
}

#[tokio::test]
async fn test_create_room_retries_on_collision() {
    let store = RoomStore::builder(buzzer_room::NullBroadcaster)
        .code_generator(ScriptedCodes::new(&["0001", "0001", "0002"]))
        .build();

    let first = store.create_room("A").await.unwrap();
    let second = store.create_room("B").await.unwrap();

    assert_eq!(first.code.as_str(), "0001");
    assert_eq!(second.code.as_str(), "0002");
    assert_eq!(
        store.room_codes().await,
        vec![first.code.clone(), second.code.clone()]
    );
}

#[tokio::test]
async fn test_create_room_code_space_exhausted() {
    let store = RoomStore::builder(buzzer_room::NullBroadcaster)
        .code_generator(ScriptedCodes::new(&["0007"]))
        .config(StoreConfig {
            max_code_attempts: 3,
            ..StoreConfig::default()
        })
        .build();

    store.create_room("A").await.unwrap();
    let result = store.create_room("B").await;

    assert!(matches!(result, Err(RoomError::CodeSpaceExhausted)));
    assert_eq!(store.room_count().await, 1);
}

#[tokio::test]
async fn test_create_room_invalid_name() {
    let store = RoomStore::new(buzzer_room::NullBroadcaster);

    for name in ["", "two words", "semi;colon"] {
        let result = store.create_room(name).await;
        assert!(
            matches!(result, Err(RoomError::InvalidName(_))),
            "{name:?} should be rejected"
        );
    }
    assert_eq!(store.room_count().await, 0);
}

#[tokio::test]
async fn test_snapshot_unknown_room_is_not_found() {
    let (store, _, _) = setup();
    let code = RoomCode::parse("9999").unwrap();

    let result = store.snapshot(&code).await;

    assert!(matches!(result, Err(RoomError::RoomNotFound(c)) if c == code));
}

// =========================================================================
// join_room
// =========================================================================

#[tokio::test]
async fn test_join_room_broadcasts_new_player() {
    let (store, broadcaster, _) = setup();
    let code = room_with(&store, &[]).await;

    let player = store.join_room(&code, "Ana").await.unwrap();

    assert_eq!(player.name, "Ana");
    assert!(player.is_waiting);
    let last = broadcaster.last().unwrap();
    assert_eq!(last.players.len(), 1);
    assert_eq!(broadcaster.codes(), vec![code]);
}

#[tokio::test]
async fn test_join_room_name_conflict_changes_nothing() {
    let (store, broadcaster, _) = setup();
    let code = room_with(&store, &["Alice"]).await;
    let before = broadcaster.count();

    let result = store.join_room(&code, "alice").await;

    assert!(matches!(result, Err(RoomError::NameConflict { .. })));
    assert_eq!(broadcaster.count(), before, "failed join must not broadcast");
    assert_eq!(store.snapshot(&code).await.unwrap().players.len(), 1);
}

#[tokio::test]
async fn test_join_room_unknown_room() {
    let (store, _, _) = setup();
    let code = RoomCode::parse("4242").unwrap();

    let result = store.join_room(&code, "Ana").await;

    assert!(matches!(result, Err(RoomError::RoomNotFound(_))));
}

#[tokio::test]
async fn test_join_room_invalid_player_name() {
    let (store, _, _) = setup();
    let code = room_with(&store, &[]).await;

    let result = store.join_room(&code, "Ana Maria").await;

    assert!(matches!(result, Err(RoomError::InvalidName(_))));
}

#[tokio::test]
async fn test_rejoin_before_start_clears_foul() {
    let (store, _, _) = setup();
    let code = room_with(&store, &["A"]).await;
    store.buzz(&code, "A").await.unwrap();

    let player = store.join_room(&code, "A").await.unwrap();

    assert!(player.is_waiting);
    assert!(!player.is_foul);
}

// =========================================================================
// attach_subscriber / detach_subscriber
// =========================================================================

#[tokio::test]
async fn test_attach_subscriber_binds_and_indexes() {
    let (store, broadcaster, _) = setup();
    let code = room_with(&store, &["A"]).await;

    let snapshot = store.attach_subscriber(&code, "A", sub(1)).await.unwrap();

    assert_eq!(snapshot.player("A").unwrap().subscriber_id, Some(sub(1)));
    assert_eq!(store.subscriber_room(sub(1)).await, Some(code));
    assert_eq!(broadcaster.last().unwrap(), snapshot);
}

#[tokio::test]
async fn test_attach_subscriber_unknown_player() {
    let (store, _, _) = setup();
    let code = room_with(&store, &["A"]).await;

    let result = store.attach_subscriber(&code, "B", sub(1)).await;

    assert!(matches!(result, Err(RoomError::PlayerNotFound { .. })));
    assert_eq!(store.subscriber_room(sub(1)).await, None);
}

#[tokio::test]
async fn test_attach_subscriber_moves_between_rooms() {
    let (store, _, _) = setup();
    let first = room_with(&store, &["A"]).await;
    let second = room_with(&store, &["A"]).await;

    store.attach_subscriber(&first, "A", sub(1)).await.unwrap();
    store.attach_subscriber(&second, "A", sub(1)).await.unwrap();

    assert_eq!(store.subscriber_room(sub(1)).await, Some(second.clone()));
    let old = store.snapshot(&first).await.unwrap();
    assert_eq!(old.player("A").unwrap().subscriber_id, None);
    let new = store.snapshot(&second).await.unwrap();
    assert_eq!(new.player("A").unwrap().subscriber_id, Some(sub(1)));
}

#[tokio::test]
async fn test_detach_subscriber_keeps_player() {
    let (store, broadcaster, _) = setup();
    let code = room_with(&store, &["A"]).await;
    store.attach_subscriber(&code, "A", sub(7)).await.unwrap();

    let snapshot = applied(store.detach_subscriber(sub(7)).await.unwrap());

    let player = snapshot.player("A").expect("player survives detach");
    assert_eq!(player.subscriber_id, None);
    assert_eq!(store.subscriber_room(sub(7)).await, None);
    assert_eq!(broadcaster.last().unwrap(), snapshot);
}

#[tokio::test]
async fn test_detach_unknown_subscriber_is_ignored() {
    let (store, broadcaster, _) = setup();
    room_with(&store, &["A"]).await;
    let before = broadcaster.count();

    let outcome = store.detach_subscriber(sub(99)).await.unwrap();

    assert_eq!(outcome, Outcome::Ignored);
    assert_eq!(broadcaster.count(), before);
}

#[tokio::test]
async fn test_detached_player_can_still_buzz_and_rejoin() {
    let (store, _, _) = setup();
    let code = room_with(&store, &["A"]).await;
    store.attach_subscriber(&code, "A", sub(1)).await.unwrap();
    store.detach_subscriber(sub(1)).await.unwrap();
    store.start(&code).await.unwrap();

    let snapshot = applied(store.buzz(&code, "A").await.unwrap());
    assert_eq!(snapshot.first_buzzer.as_deref(), Some("A"));

    store.join_room(&code, "A").await.unwrap();
    let snapshot = store.attach_subscriber(&code, "A", sub(2)).await.unwrap();
    let player = snapshot.player("A").unwrap();
    assert_eq!(player.subscriber_id, Some(sub(2)));
    assert!(player.has_buzzed(), "rejoin mid-round keeps the buzz");
}

// =========================================================================
// start / reset_game / clear_results
// =========================================================================

#[tokio::test]
async fn test_start_uses_clock_and_broadcasts() {
    let (store, broadcaster, clock) = setup();
    let code = room_with(&store, &["A", "B"]).await;
    clock.set(1_000);

    let snapshot = applied(store.start(&code).await.unwrap());

    assert!(snapshot.game_started);
    assert_eq!(snapshot.game_start_time, Some(1_000));
    assert_eq!(broadcaster.last().unwrap(), snapshot);
}

#[tokio::test]
async fn test_start_twice_is_ignored_without_broadcast() {
    let (store, broadcaster, clock) = setup();
    let code = room_with(&store, &["A"]).await;
    clock.set(1_000);
    store.start(&code).await.unwrap();
    let before = broadcaster.count();

    clock.set(2_000);
    let outcome = store.start(&code).await.unwrap();

    assert_eq!(outcome, Outcome::Ignored);
    assert_eq!(broadcaster.count(), before);
    let snapshot = store.snapshot(&code).await.unwrap();
    assert_eq!(snapshot.game_start_time, Some(1_000));
}

#[tokio::test]
async fn test_reset_game_clears_fouls_and_round() {
    let (store, _, clock) = setup();
    let code = room_with(&store, &["A", "B"]).await;
    store.buzz(&code, "A").await.unwrap(); // foul
    clock.set(10);
    store.start(&code).await.unwrap();
    store.buzz(&code, "B").await.unwrap();

    let snapshot = applied(store.reset_game(&code).await.unwrap());

    assert!(!snapshot.game_started);
    assert_eq!(snapshot.first_buzzer, None);
    assert!(snapshot.buzzed_order.is_empty());
    for p in &snapshot.players {
        assert!(p.is_waiting && !p.is_foul && p.buzzed_time.is_none());
    }
}

#[tokio::test]
async fn test_operations_on_unknown_room_fail() {
    let (store, broadcaster, _) = setup();
    let code = RoomCode::parse("0000").unwrap();

    assert!(matches!(store.start(&code).await, Err(RoomError::RoomNotFound(_))));
    assert!(matches!(store.reset_game(&code).await, Err(RoomError::RoomNotFound(_))));
    assert!(matches!(store.clear_results(&code).await, Err(RoomError::RoomNotFound(_))));
    assert!(matches!(store.buzz(&code, "A").await, Err(RoomError::RoomNotFound(_))));
    assert_eq!(broadcaster.count(), 0);
}

// =========================================================================
// buzz
// =========================================================================

#[tokio::test]
async fn test_scenario_start_buzz_clear() {
    let (store, _, clock) = setup();
    let code = room_with(&store, &["A", "B"]).await;

    clock.set(100);
    let snapshot = applied(store.start(&code).await.unwrap());
    assert!(snapshot.players.iter().all(|p| p.is_waiting));

    clock.set(101);
    store.buzz(&code, "A").await.unwrap();
    clock.set(102);
    let snapshot = applied(store.buzz(&code, "B").await.unwrap());

    assert_eq!(snapshot.first_buzzer.as_deref(), Some("A"));
    let order: Vec<_> = snapshot
        .buzzed_order
        .iter()
        .map(|e| (e.player_name.as_str(), e.timestamp))
        .collect();
    assert_eq!(order, [("A", 101), ("B", 102)]);
    assert!(snapshot.players.iter().all(|p| !p.is_waiting));

    let snapshot = applied(store.clear_results(&code).await.unwrap());
    assert_eq!(snapshot.first_buzzer, None);
    assert!(snapshot.buzzed_order.is_empty());
    assert!(snapshot.players.iter().all(|p| p.is_waiting));
    assert!(snapshot.game_started, "clearing keeps the round running");
}

#[tokio::test]
async fn test_buzz_before_start_is_foul() {
    let (store, _, clock) = setup();
    let code = room_with(&store, &["A", "B"]).await;
    clock.set(55);

    let snapshot = applied(store.buzz(&code, "A").await.unwrap());

    let a = snapshot.player("A").unwrap();
    assert!(a.is_foul);
    assert!(!a.is_waiting);
    assert_eq!(a.buzzed_time, Some(55));
    assert!(snapshot.buzzed_order.is_empty());
    assert_eq!(snapshot.first_buzzer, None);
}

#[tokio::test]
async fn test_duplicate_buzz_produces_one_broadcast() {
    let (store, broadcaster, _) = setup();
    let code = room_with(&store, &["A"]).await;
    store.start(&code).await.unwrap();
    let before = broadcaster.count();

    let first = store.buzz(&code, "A").await.unwrap();
    let second = store.buzz(&code, "A").await.unwrap();

    assert!(first.is_applied());
    assert_eq!(second, Outcome::Ignored);
    assert_eq!(broadcaster.count(), before + 1);
}

#[tokio::test]
async fn test_buzz_unknown_player_is_ignored() {
    let (store, broadcaster, _) = setup();
    let code = room_with(&store, &["A"]).await;
    store.start(&code).await.unwrap();
    let before = broadcaster.count();

    let outcome = store.buzz(&code, "Ghost").await.unwrap();

    assert_eq!(outcome, Outcome::Ignored);
    assert_eq!(broadcaster.count(), before);
}

#[tokio::test]
async fn test_fouled_player_sits_out_the_round() {
    let (store, _, _) = setup();
    let code = room_with(&store, &["A", "B"]).await;
    store.buzz(&code, "A").await.unwrap();

    let snapshot = applied(store.start(&code).await.unwrap());
    let a = snapshot.player("A").unwrap();
    assert!(a.is_foul && !a.is_waiting);

    assert_eq!(store.buzz(&code, "A").await.unwrap(), Outcome::Ignored);
    let snapshot = applied(store.buzz(&code, "B").await.unwrap());
    assert_eq!(snapshot.first_buzzer.as_deref(), Some("B"));
    assert_eq!(snapshot.buzzed_order.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_buzzes_have_exactly_one_winner() {
    let (store, _, _) = setup();
    let store = Arc::new(store);
    let names: Vec<String> = (0..16).map(|i| format!("p{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let code = room_with(&store, &refs).await;
    store.start(&code).await.unwrap();

    // Every player buzzes twice, all at once.
    let mut tasks = Vec::new();
    for name in names.iter().chain(names.iter()) {
        let store = Arc::clone(&store);
        let code = code.clone();
        let name = name.clone();
        tasks.push(tokio::spawn(async move {
            store.buzz(&code, &name).await.unwrap()
        }));
    }

    let mut applied_count = 0;
    for task in tasks {
        if task.await.unwrap().is_applied() {
            applied_count += 1;
        }
    }

    let snapshot = store.snapshot(&code).await.unwrap();
    assert_eq!(applied_count, names.len(), "each player buzzes once");
    assert_eq!(snapshot.buzzed_order.len(), names.len());
    let unique: HashSet<_> =
        snapshot.buzzed_order.iter().map(|e| &e.player_name).collect();
    assert_eq!(unique.len(), names.len());
    assert_eq!(
        snapshot.first_buzzer.as_deref(),
        Some(snapshot.buzzed_order[0].player_name.as_str())
    );
    assert!(
        snapshot
            .buzzed_order
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rooms_are_independent() {
    let (store, broadcaster, _) = setup();
    let first = room_with(&store, &["A"]).await;
    let second = room_with(&store, &["A"]).await;

    store.start(&first).await.unwrap();
    store.buzz(&first, "A").await.unwrap();

    let other = store.snapshot(&second).await.unwrap();
    assert!(!other.game_started);
    assert!(other.player("A").unwrap().is_waiting);
    assert!(broadcaster.codes().iter().filter(|c| **c == second).count() == 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stuck_room_does_not_stall_other_rooms() {
    let gate = Arc::new(GatedBroadcaster::default());
    let store = Arc::new(RoomStore::builder(Arc::clone(&gate)).build());
    let stuck = store.create_room("Stuck").await.unwrap().code;
    let free = room_with(&store, &["Bob"]).await;

    gate.gate(&stuck);
    let blocked_join = tokio::spawn({
        let store = Arc::clone(&store);
        let stuck = stuck.clone();
        async move { store.join_room(&stuck, "Ana").await }
    });
    gate.wait_entered().await;

    let free_ops = tokio::time::timeout(Duration::from_secs(2), async {
        store.start(&free).await.unwrap();
        store.buzz(&free, "Bob").await.unwrap();
        store.snapshot(&free).await.unwrap()
    })
    .await;
    let other_create =
        tokio::time::timeout(Duration::from_secs(2), store.create_room("New"))
            .await;

    gate.release();
    let joined = blocked_join.await.unwrap();

    let room = free_ops.expect("free room waited on the stuck one");
    assert_eq!(room.first_buzzer.as_deref(), Some("Bob"));
    assert!(other_create.expect("create waited on the stuck room").is_ok());
    assert_eq!(joined.unwrap().name, "Ana");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_command_queue_is_unavailable() {
    let gate = Arc::new(GatedBroadcaster::default());
    let store = Arc::new(
        RoomStore::builder(Arc::clone(&gate))
            .config(StoreConfig {
                command_channel_size: 1,
                ..StoreConfig::default()
            })
            .build(),
    );
    let code = store.create_room("Busy").await.unwrap().code;

    gate.gate(&code);
    let blocked_join = tokio::spawn({
        let store = Arc::clone(&store);
        let code = code.clone();
        async move { store.join_room(&code, "Ana").await }
    });
    gate.wait_entered().await;

    // Takes the only free slot, then gives up waiting for the reply.
    let queued =
        tokio::time::timeout(Duration::from_millis(50), store.snapshot(&code))
            .await;
    let refused = store.start(&code).await;

    gate.release();
    blocked_join.await.unwrap().unwrap();

    assert!(queued.is_err(), "queued command cannot finish while stuck");
    assert!(matches!(refused, Err(RoomError::Unavailable(c)) if c == code));
    // The abandoned snapshot may still hold the slot for a moment.
    let mut after = store.start(&code).await;
    for _ in 0..50 {
        if after.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        after = store.start(&code).await;
    }
    assert!(after.unwrap().is_applied(), "room recovers once drained");
}

// =========================================================================
// shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_stops_every_room() {
    let (store, _, _) = setup();
    let code = room_with(&store, &["A"]).await;
    store.attach_subscriber(&code, "A", sub(1)).await.unwrap();

    store.shutdown().await;

    assert_eq!(store.room_count().await, 0);
    assert_eq!(store.subscriber_room(sub(1)).await, None);
    assert!(matches!(
        store.snapshot(&code).await,
        Err(RoomError::RoomNotFound(_))
    ));
}
