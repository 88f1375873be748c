//! End-to-end dispatcher tests: raw broker payload in, client frames out.
//!
//! Uses the in-memory store, room, and key-value implementations so the
//! whole fan-out path runs without Postgres or Redis.

use std::sync::Arc;

use chrono::TimeZone;
use serde_json::Value;
use tokio::sync::mpsc;

use gateway_api::db::kv::MemoryStore;
use gateway_api::db::store::MemoryChatStore;
use gateway_api::gateway::consumer::Dispatcher;
use gateway_api::gateway::idempotency::IdempotencyGuard;
use gateway_api::gateway::registry::{ConnId, ConnectionIndex};
use gateway_api::gateway::rooms::MemoryRooms;
use gateway_api::gateway::sink::ConnectionSink;
use gateway_api::models::friend_apply::FriendApply;
use gateway_api::models::group::Group;
use gateway_api::models::talk_record::TalkRecord;
use gateway_api::models::user::User;

struct Harness {
    store: Arc<MemoryChatStore>,
    rooms: Arc<MemoryRooms>,
    index: Arc<ConnectionIndex>,
    sink: Arc<ConnectionSink>,
    dispatcher: Dispatcher,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryChatStore::new());
    let rooms = Arc::new(MemoryRooms::new());
    let index = Arc::new(ConnectionIndex::new());
    let sink = Arc::new(ConnectionSink::new());
    let dispatcher = Dispatcher::new(
        IdempotencyGuard::new(Arc::new(MemoryStore::new()), "run_test".to_string()),
        store.clone(),
        rooms.clone(),
        index.clone(),
        sink.clone(),
    );
    Harness {
        store,
        rooms,
        index,
        sink,
        dispatcher,
    }
}

impl Harness {
    /// Simulate the transport accepting a connection for a user.
    fn connect(&self, user_id: i64) -> (ConnId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn_id = self.sink.register(tx);
        self.index.bind(user_id, conn_id);
        (conn_id, rx)
    }

    async fn consume(&self, raw: &str) {
        self.dispatcher.consume(raw).await;
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(serde_json::from_str(&frame).unwrap());
    }
    frames
}

fn direct_record(id: i64, sender: i64, receiver: i64) -> TalkRecord {
    TalkRecord {
        id,
        talk_type: 1,
        msg_type: 1,
        user_id: sender,
        receiver_id: receiver,
        content: "hello".to_string(),
        is_revoke: 0,
        created_at: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}

fn group_record(id: i64, sender: i64, room: i64) -> TalkRecord {
    TalkRecord {
        talk_type: 2,
        receiver_id: room,
        ..direct_record(id, sender, 0)
    }
}

fn user(id: i64, nickname: &str) -> User {
    User {
        id,
        nickname: nickname.to_string(),
        avatar: String::new(),
        motto: String::new(),
    }
}

// ---------------------------------------------------------------------------
// Direct talk
// ---------------------------------------------------------------------------

#[tokio::test]
async fn direct_talk_pushes_to_all_local_targets_of_both_peers() {
    let h = harness();
    h.store.add_record(direct_record(99, 10, 20));
    h.store.add_user(user(10, "alice"));

    let (_, mut sender_rx) = h.connect(10);
    let (_, mut receiver_rx_a) = h.connect(20); // multi-device
    let (_, mut receiver_rx_b) = h.connect(20);
    let (_, mut bystander_rx) = h.connect(30);

    h.consume(
        r#"{"event":"talk","uuid":"u1","data":{"talk_type":1,"sender_id":10,"receiver_id":20,"record_id":99}}"#,
    )
    .await;

    let sender_frames = drain(&mut sender_rx);
    let a_frames = drain(&mut receiver_rx_a);
    let b_frames = drain(&mut receiver_rx_b);

    assert_eq!(sender_frames.len(), 1);
    assert_eq!(a_frames.len(), 1);
    assert_eq!(b_frames.len(), 1);
    // Identical enriched body at every target.
    assert_eq!(sender_frames[0], a_frames[0]);
    assert_eq!(a_frames[0], b_frames[0]);

    assert_eq!(a_frames[0][0], "talk");
    assert_eq!(a_frames[0][1]["id"], 99);
    assert_eq!(a_frames[0][1]["nickname"], "alice");
    assert_eq!(a_frames[0][1]["content"], "hello");

    assert!(drain(&mut bystander_rx).is_empty());
}

#[tokio::test]
async fn duplicate_uuid_produces_no_second_push() {
    let h = harness();
    h.store.add_record(direct_record(99, 10, 20));
    h.store.add_user(user(10, "alice"));

    let (_, mut rx) = h.connect(20);

    let payload = r#"{"event":"talk","uuid":"u1","data":{"talk_type":1,"sender_id":10,"receiver_id":20,"record_id":99}}"#;
    h.consume(payload).await;
    h.consume(payload).await;

    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn same_event_with_fresh_uuid_is_processed_again() {
    let h = harness();
    h.store.add_record(direct_record(99, 10, 20));
    h.store.add_user(user(10, "alice"));

    let (_, mut rx) = h.connect(20);

    h.consume(
        r#"{"event":"talk","uuid":"u1","data":{"talk_type":1,"sender_id":10,"receiver_id":20,"record_id":99}}"#,
    )
    .await;
    h.consume(
        r#"{"event":"talk","uuid":"u2","data":{"talk_type":1,"sender_id":10,"receiver_id":20,"record_id":99}}"#,
    )
    .await;

    assert_eq!(drain(&mut rx).len(), 2);
}

#[tokio::test]
async fn missing_record_suppresses_delivery() {
    let h = harness();
    let (_, mut rx) = h.connect(20);

    h.consume(
        r#"{"event":"talk","uuid":"u1","data":{"talk_type":1,"sender_id":10,"receiver_id":20,"record_id":404}}"#,
    )
    .await;

    assert!(drain(&mut rx).is_empty());
}

// ---------------------------------------------------------------------------
// Group talk
// ---------------------------------------------------------------------------

#[tokio::test]
async fn group_talk_pushes_to_local_targets_of_membership_snapshot() {
    let h = harness();
    h.store.add_record(group_record(50, 10, 300));
    h.store.add_user(user(10, "alice"));
    h.store.add_group(Group {
        id: 300,
        group_name: "rustaceans".to_string(),
        avatar: String::new(),
    });
    h.rooms.join(300, 10);
    h.rooms.join(300, 20);

    let (_, mut member_a) = h.connect(10);
    let (_, mut member_b) = h.connect(20);
    let (_, mut non_member) = h.connect(30);

    h.consume(
        r#"{"event":"talk","uuid":"g1","data":{"talk_type":2,"sender_id":10,"receiver_id":300,"record_id":50}}"#,
    )
    .await;

    let a_frames = drain(&mut member_a);
    assert_eq!(a_frames.len(), 1);
    assert_eq!(a_frames[0][1]["group_name"], "rustaceans");
    assert_eq!(drain(&mut member_b).len(), 1);
    assert!(drain(&mut non_member).is_empty());
}

#[tokio::test]
async fn empty_room_means_zero_pushes_not_error() {
    let h = harness();
    h.store.add_record(group_record(50, 10, 300));
    let (_, mut rx) = h.connect(10);

    // Room 300 has no members registered on the cluster yet.
    h.consume(
        r#"{"event":"talk","uuid":"g1","data":{"talk_type":2,"sender_id":10,"receiver_id":300,"record_id":50}}"#,
    )
    .await;

    assert!(drain(&mut rx).is_empty());
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn presence_event_reaches_only_locally_connected_friends() {
    let h = harness();
    h.store.set_friends(10, vec![20, 30]);

    let (_, mut friend_rx) = h.connect(20);
    let (_, mut stranger_rx) = h.connect(40);
    // Friend 30 has no local connection.

    h.consume(r#"{"event":"online_status","uuid":"p1","data":{"user_id":10,"status":1}}"#)
        .await;

    let frames = drain(&mut friend_rx);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0][0], "online_status");
    assert_eq!(frames[0][1], serde_json::json!({ "user_id": 10, "status": 1 }));
    assert!(drain(&mut stranger_rx).is_empty());
}

// ---------------------------------------------------------------------------
// Keyboard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn keyboard_event_passes_through_to_addressed_peer_only() {
    let h = harness();
    let (_, mut receiver_rx) = h.connect(20);
    let (_, mut sender_rx) = h.connect(10);

    h.consume(r#"{"event":"keyboard","uuid":"k1","data":{"sender_id":10,"receiver_id":20}}"#)
        .await;

    let frames = drain(&mut receiver_rx);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0][0], "keyboard");
    assert_eq!(frames[0][1]["sender_id"], 10);
    // The typist does not get an echo.
    assert!(drain(&mut sender_rx).is_empty());
}

// ---------------------------------------------------------------------------
// Revoke
// ---------------------------------------------------------------------------

#[tokio::test]
async fn revoke_routes_from_the_stored_record() {
    let h = harness();
    h.store.add_record(direct_record(99, 10, 20));

    let (_, mut sender_rx) = h.connect(10);
    let (_, mut receiver_rx) = h.connect(20);

    h.consume(r#"{"event":"revoke_talk","uuid":"r1","data":{"record_id":99}}"#)
        .await;

    for rx in [&mut sender_rx, &mut receiver_rx] {
        let frames = drain(rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][0], "revoke_talk");
        assert_eq!(
            frames[0][1],
            serde_json::json!({
                "talk_type": 1,
                "sender_id": 10,
                "receiver_id": 20,
                "record_id": 99,
            })
        );
    }
}

#[tokio::test]
async fn revoke_of_group_message_reaches_room_members() {
    let h = harness();
    h.store.add_record(group_record(50, 10, 300));
    h.rooms.join(300, 20);

    let (_, mut member_rx) = h.connect(20);

    h.consume(r#"{"event":"revoke_talk","uuid":"r2","data":{"record_id":50}}"#)
        .await;

    assert_eq!(drain(&mut member_rx).len(), 1);
}

#[tokio::test]
async fn revoke_of_deleted_record_is_suppressed() {
    let h = harness();
    let (_, mut rx) = h.connect(20);

    h.consume(r#"{"event":"revoke_talk","uuid":"r3","data":{"record_id":404}}"#)
        .await;

    assert!(drain(&mut rx).is_empty());
}

// ---------------------------------------------------------------------------
// Friend apply
// ---------------------------------------------------------------------------

#[tokio::test]
async fn friend_apply_notifies_the_responder() {
    let h = harness();
    h.store.add_apply(FriendApply {
        id: 7,
        user_id: 10,
        friend_id: 20,
        status: 0,
        remark: "add me".to_string(),
    });
    h.store.add_user(user(10, "alice"));

    let (_, mut responder_rx) = h.connect(20);
    let (_, mut requester_rx) = h.connect(10);

    h.consume(r#"{"event":"friend_apply","uuid":"f1","data":{"apply_id":7,"type":1}}"#)
        .await;

    let frames = drain(&mut responder_rx);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0][0], "friend_apply");
    assert_eq!(frames[0][1]["friend"]["nickname"], "alice");
    assert!(drain(&mut requester_rx).is_empty());
}

// ---------------------------------------------------------------------------
// Forward compatibility & disconnect races
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_event_kind_is_dropped_without_pushes() {
    let h = harness();
    let (_, mut rx) = h.connect(20);

    h.consume(r#"{"event":"vote_stream","uuid":"x1","data":{"receiver_id":20}}"#)
        .await;

    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn vanished_target_is_skipped_without_aborting_others() {
    let h = harness();
    h.store.add_record(direct_record(99, 10, 20));
    h.store.add_user(user(10, "alice"));

    let (gone, _dropped_rx) = h.connect(20);
    let (_, mut live_rx) = h.connect(20);

    // The first device disconnects after resolution would have seen it.
    h.sink.deregister(gone);

    h.consume(
        r#"{"event":"talk","uuid":"u1","data":{"talk_type":1,"sender_id":10,"receiver_id":20,"record_id":99}}"#,
    )
    .await;

    assert_eq!(drain(&mut live_rx).len(), 1);
}
