//! Cluster-wide room membership, read-only from this subsystem.
//!
//! Membership is maintained by the domain layer on join/leave; the gateway
//! only resolves a snapshot when fanning out a group event. The view is
//! eventually consistent — a few milliseconds of staleness is acceptable.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::ApiError;

/// Redis key for a room's member set.
fn room_key(room_id: i64) -> String {
    format!("gw:room:{}", room_id)
}

#[async_trait]
pub trait RoomRegistry: Send + Sync {
    /// Current member user-ids of a room. An unknown room yields an empty
    /// set ("no recipients"), never an error.
    async fn room_members(&self, room_id: i64) -> Result<HashSet<i64>, ApiError>;
}

// ---------------------------------------------------------------------------
// Redis implementation
// ---------------------------------------------------------------------------

/// Shared membership view backed by a Redis set per room.
pub struct RedisRooms {
    conn: redis::aio::ConnectionManager,
}

impl RedisRooms {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RoomRegistry for RedisRooms {
    async fn room_members(&self, room_id: i64) -> Result<HashSet<i64>, ApiError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(room_key(room_id)).await?;
        // Ids are stored as strings; skip anything unparsable rather than
        // failing the whole fan-out.
        Ok(members.iter().filter_map(|m| m.parse().ok()).collect())
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation (for tests)
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRooms {
    rooms: DashMap<i64, HashSet<i64>>,
}

impl MemoryRooms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, room_id: i64, user_id: i64) {
        self.rooms.entry(room_id).or_default().insert(user_id);
    }

    pub fn leave(&self, room_id: i64, user_id: i64) {
        if let Some(mut members) = self.rooms.get_mut(&room_id) {
            members.remove(&user_id);
        }
    }
}

#[async_trait]
impl RoomRegistry for MemoryRooms {
    async fn room_members(&self, room_id: i64) -> Result<HashSet<i64>, ApiError> {
        Ok(self
            .rooms
            .get(&room_id)
            .map(|members| members.clone())
            .unwrap_or_default())
    }
}
