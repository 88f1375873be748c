//! Broadcast event kinds, wire envelope, and notification bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Talk / message type constants
// ---------------------------------------------------------------------------

/// Direct chat between two users.
pub const TALK_TYPE_PRIVATE: i32 = 1;
/// Group-room chat.
pub const TALK_TYPE_GROUP: i32 = 2;

pub const MSG_TYPE_TEXT: i32 = 1;
pub const MSG_TYPE_FILE: i32 = 2;
pub const MSG_TYPE_FORWARD: i32 = 3;
pub const MSG_TYPE_CODE: i32 = 4;
pub const MSG_TYPE_VOTE: i32 = 5;
pub const MSG_TYPE_INVITE: i32 = 6;

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// The closed set of broadcast event kinds this node understands.
///
/// Kinds are matched exhaustively in the dispatcher; a wire name outside
/// this set is dropped for forward compatibility with newer producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// New chat message (direct or group).
    Talk,
    /// Typing indicator, forwarded to the addressed peer.
    Keyboard,
    /// Presence change, fanned out to the user's friends.
    OnlineStatus,
    /// Message revoke, same recipients as the original message.
    RevokeTalk,
    /// Friend request created or answered.
    FriendApply,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Talk => "talk",
            EventKind::Keyboard => "keyboard",
            EventKind::OnlineStatus => "online_status",
            EventKind::RevokeTalk => "revoke_talk",
            EventKind::FriendApply => "friend_apply",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "talk" => Some(EventKind::Talk),
            "keyboard" => Some(EventKind::Keyboard),
            "online_status" => Some(EventKind::OnlineStatus),
            "revoke_talk" => Some(EventKind::RevokeTalk),
            "friend_apply" => Some(EventKind::FriendApply),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Broker envelope
// ---------------------------------------------------------------------------

/// The broadcast message as published to and consumed from the broker.
///
/// `uuid` is the event's identity for idempotent processing. `data` is a
/// minimal kind-specific descriptor carrying ids, not full bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    pub uuid: String,
    pub data: Value,
}

impl Envelope {
    pub fn new(kind: EventKind, uuid: String, data: Value) -> Self {
        Self {
            event: kind.as_str().to_string(),
            uuid,
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Kind-specific descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TalkDescriptor {
    pub talk_type: i32,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub record_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct KeyboardDescriptor {
    pub sender_id: i64,
    pub receiver_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OnlineStatusDescriptor {
    pub user_id: i64,
    pub status: i32,
}

#[derive(Debug, Deserialize)]
pub struct RevokeDescriptor {
    pub record_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct FriendApplyDescriptor {
    pub apply_id: i64,
    /// 1 = request created (notify the responder), 2 = request answered
    /// (notify the original requester).
    #[serde(rename = "type")]
    pub apply_type: i32,
}

// ---------------------------------------------------------------------------
// Notification bodies
// ---------------------------------------------------------------------------

/// The fully hydrated talk notification. Every key is always present;
/// fields that don't apply to the current message kind hold empty
/// defaults so clients parse one fixed shape.
#[derive(Debug, Clone, Serialize)]
pub struct TalkNotify {
    pub id: i64,
    pub talk_type: i32,
    pub msg_type: i32,
    pub user_id: i64,
    pub receiver_id: i64,
    pub nickname: String,
    pub avatar: String,
    pub group_name: String,
    pub group_avatar: String,
    pub file: Value,
    pub code_block: Value,
    pub forward: Value,
    pub invite: Value,
    pub content: String,
    pub created_at: String,
    pub is_revoke: i32,
}

impl Default for TalkNotify {
    fn default() -> Self {
        Self {
            id: 0,
            talk_type: TALK_TYPE_PRIVATE,
            msg_type: MSG_TYPE_TEXT,
            user_id: 0,
            receiver_id: 0,
            nickname: String::new(),
            avatar: String::new(),
            group_name: String::new(),
            group_avatar: String::new(),
            file: empty_object(),
            code_block: empty_object(),
            forward: empty_object(),
            invite: empty_object(),
            content: String::new(),
            created_at: String::new(),
            is_revoke: 0,
        }
    }
}

/// `{}` — the empty default for kind-specific sub-objects.
pub fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Serialize the client push frame: a two-element JSON array of event
/// kind and notification body.
pub fn push_frame<T: Serialize>(kind: EventKind, body: &T) -> String {
    serde_json::json!([kind.as_str(), body]).to_string()
}
