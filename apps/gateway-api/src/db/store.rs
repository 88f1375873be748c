//! Read API over the authoritative chat store.
//!
//! The gateway never writes domain data; it hydrates notification bodies
//! at delivery time from whatever the store currently holds. Backed by
//! Postgres in production and an in-memory map in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use parking_lot::Mutex;

use crate::db::pool::DbPool;
use crate::db::schema::{
    groups, talk_records, talk_records_code, talk_records_file, talk_records_forward,
    talk_records_invite, users, users_friends, users_friends_apply,
};
use crate::error::ApiError;
use crate::models::friend_apply::FriendApply;
use crate::models::group::Group;
use crate::models::talk_record::TalkRecord;
use crate::models::talk_record_code::TalkRecordCode;
use crate::models::talk_record_file::TalkRecordFile;
use crate::models::talk_record_forward::TalkRecordForward;
use crate::models::talk_record_invite::TalkRecordInvite;
use crate::models::user::User;

/// Fetch-by-id reads the fan-out layer needs. Every method returns
/// `Ok(None)` for a missing row — a record deleted between publish and
/// consume is an expected race, not an error.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn talk_record(&self, record_id: i64) -> Result<Option<TalkRecord>, ApiError>;
    async fn file_detail(&self, record_id: i64) -> Result<Option<TalkRecordFile>, ApiError>;
    async fn code_detail(&self, record_id: i64) -> Result<Option<TalkRecordCode>, ApiError>;
    async fn forward_detail(&self, record_id: i64) -> Result<Option<TalkRecordForward>, ApiError>;
    async fn invite_detail(&self, record_id: i64) -> Result<Option<TalkRecordInvite>, ApiError>;
    async fn user_display(&self, user_id: i64) -> Result<Option<User>, ApiError>;
    async fn users_display(&self, user_ids: &[i64]) -> Result<Vec<User>, ApiError>;
    async fn group_display(&self, group_id: i64) -> Result<Option<Group>, ApiError>;
    async fn friend_apply(&self, apply_id: i64) -> Result<Option<FriendApply>, ApiError>;
    /// Identifiers of the user's confirmed friends (presence fan-out).
    async fn friend_ids(&self, user_id: i64) -> Result<Vec<i64>, ApiError>;
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

pub struct DieselStore {
    db: DbPool,
}

impl DieselStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChatStore for DieselStore {
    async fn talk_record(&self, record_id: i64) -> Result<Option<TalkRecord>, ApiError> {
        let mut conn = self.db.get().await?;
        let record = talk_records::table
            .find(record_id)
            .select(TalkRecord::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record)
    }

    async fn file_detail(&self, record_id: i64) -> Result<Option<TalkRecordFile>, ApiError> {
        let mut conn = self.db.get().await?;
        let row = talk_records_file::table
            .filter(talk_records_file::record_id.eq(record_id))
            .select(TalkRecordFile::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row)
    }

    async fn code_detail(&self, record_id: i64) -> Result<Option<TalkRecordCode>, ApiError> {
        let mut conn = self.db.get().await?;
        let row = talk_records_code::table
            .filter(talk_records_code::record_id.eq(record_id))
            .select(TalkRecordCode::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row)
    }

    async fn forward_detail(&self, record_id: i64) -> Result<Option<TalkRecordForward>, ApiError> {
        let mut conn = self.db.get().await?;
        let row = talk_records_forward::table
            .filter(talk_records_forward::record_id.eq(record_id))
            .select(TalkRecordForward::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row)
    }

    async fn invite_detail(&self, record_id: i64) -> Result<Option<TalkRecordInvite>, ApiError> {
        let mut conn = self.db.get().await?;
        let row = talk_records_invite::table
            .filter(talk_records_invite::record_id.eq(record_id))
            .select(TalkRecordInvite::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row)
    }

    async fn user_display(&self, user_id: i64) -> Result<Option<User>, ApiError> {
        let mut conn = self.db.get().await?;
        let row = users::table
            .find(user_id)
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row)
    }

    async fn users_display(&self, user_ids: &[i64]) -> Result<Vec<User>, ApiError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.db.get().await?;
        let rows = users::table
            .filter(users::id.eq_any(user_ids))
            .select(User::as_select())
            .load(&mut conn)
            .await?;
        Ok(rows)
    }

    async fn group_display(&self, group_id: i64) -> Result<Option<Group>, ApiError> {
        let mut conn = self.db.get().await?;
        let row = groups::table
            .find(group_id)
            .select(Group::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row)
    }

    async fn friend_apply(&self, apply_id: i64) -> Result<Option<FriendApply>, ApiError> {
        let mut conn = self.db.get().await?;
        let row = users_friends_apply::table
            .find(apply_id)
            .select(FriendApply::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row)
    }

    async fn friend_ids(&self, user_id: i64) -> Result<Vec<i64>, ApiError> {
        let mut conn = self.db.get().await?;

        // Friendship rows are stored once; check both directions.
        let mut ids: Vec<i64> = users_friends::table
            .filter(users_friends::user_id.eq(user_id))
            .filter(users_friends::status.eq(1))
            .select(users_friends::friend_id)
            .load(&mut conn)
            .await?;

        let reverse: Vec<i64> = users_friends::table
            .filter(users_friends::friend_id.eq(user_id))
            .filter(users_friends::status.eq(1))
            .select(users_friends::user_id)
            .load(&mut conn)
            .await?;

        ids.extend(reverse);
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation (for tests)
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryChatInner {
    records: HashMap<i64, TalkRecord>,
    files: HashMap<i64, TalkRecordFile>,
    codes: HashMap<i64, TalkRecordCode>,
    forwards: HashMap<i64, TalkRecordForward>,
    invites: HashMap<i64, TalkRecordInvite>,
    users: HashMap<i64, User>,
    groups: HashMap<i64, Group>,
    applies: HashMap<i64, FriendApply>,
    friends: HashMap<i64, Vec<i64>>,
}

/// Map-backed store with insert helpers for seeding test fixtures.
#[derive(Default)]
pub struct MemoryChatStore {
    inner: Mutex<MemoryChatInner>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_record(&self, record: TalkRecord) {
        self.inner.lock().records.insert(record.id, record);
    }

    pub fn remove_record(&self, record_id: i64) {
        self.inner.lock().records.remove(&record_id);
    }

    pub fn add_file(&self, file: TalkRecordFile) {
        self.inner.lock().files.insert(file.record_id, file);
    }

    pub fn add_code(&self, code: TalkRecordCode) {
        self.inner.lock().codes.insert(code.record_id, code);
    }

    pub fn add_forward(&self, forward: TalkRecordForward) {
        self.inner.lock().forwards.insert(forward.record_id, forward);
    }

    pub fn add_invite(&self, invite: TalkRecordInvite) {
        self.inner.lock().invites.insert(invite.record_id, invite);
    }

    pub fn add_user(&self, user: User) {
        self.inner.lock().users.insert(user.id, user);
    }

    pub fn add_group(&self, group: Group) {
        self.inner.lock().groups.insert(group.id, group);
    }

    pub fn add_apply(&self, apply: FriendApply) {
        self.inner.lock().applies.insert(apply.id, apply);
    }

    pub fn set_friends(&self, user_id: i64, friends: Vec<i64>) {
        self.inner.lock().friends.insert(user_id, friends);
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn talk_record(&self, record_id: i64) -> Result<Option<TalkRecord>, ApiError> {
        Ok(self.inner.lock().records.get(&record_id).cloned())
    }

    async fn file_detail(&self, record_id: i64) -> Result<Option<TalkRecordFile>, ApiError> {
        Ok(self.inner.lock().files.get(&record_id).cloned())
    }

    async fn code_detail(&self, record_id: i64) -> Result<Option<TalkRecordCode>, ApiError> {
        Ok(self.inner.lock().codes.get(&record_id).cloned())
    }

    async fn forward_detail(&self, record_id: i64) -> Result<Option<TalkRecordForward>, ApiError> {
        Ok(self.inner.lock().forwards.get(&record_id).cloned())
    }

    async fn invite_detail(&self, record_id: i64) -> Result<Option<TalkRecordInvite>, ApiError> {
        Ok(self.inner.lock().invites.get(&record_id).cloned())
    }

    async fn user_display(&self, user_id: i64) -> Result<Option<User>, ApiError> {
        Ok(self.inner.lock().users.get(&user_id).cloned())
    }

    async fn users_display(&self, user_ids: &[i64]) -> Result<Vec<User>, ApiError> {
        let inner = self.inner.lock();
        Ok(user_ids
            .iter()
            .filter_map(|id| inner.users.get(id).cloned())
            .collect())
    }

    async fn group_display(&self, group_id: i64) -> Result<Option<Group>, ApiError> {
        Ok(self.inner.lock().groups.get(&group_id).cloned())
    }

    async fn friend_apply(&self, apply_id: i64) -> Result<Option<FriendApply>, ApiError> {
        Ok(self.inner.lock().applies.get(&apply_id).cloned())
    }

    async fn friend_ids(&self, user_id: i64) -> Result<Vec<i64>, ApiError> {
        Ok(self
            .inner
            .lock()
            .friends
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}
