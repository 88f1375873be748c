use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::db::schema::talk_records;

/// A persisted chat message row, fetched at delivery time so the pushed
/// body reflects the current state (content edits, revoke flag).
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = talk_records)]
pub struct TalkRecord {
    pub id: i64,
    pub talk_type: i32,
    pub msg_type: i32,
    pub user_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub is_revoke: i32,
    pub created_at: DateTime<Utc>,
}
