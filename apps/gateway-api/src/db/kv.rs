use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::ApiError;

/// Abstraction over the shared key-value store used for idempotency
/// leases and connection tickets.
///
/// Backed by Redis in production and an in-memory map in tests. The store
/// is shared across all gateway nodes, which is what makes `set_nx_ex` a
/// valid distributed set-if-absent primitive.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), ApiError>;
    /// Set-if-absent with expiry. Returns `true` when the key was set,
    /// `false` when it already existed (and its TTL is left untouched).
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, ApiError>;
    async fn get(&self, key: &str) -> Result<Option<String>, ApiError>;
    async fn del(&self, key: &str) -> Result<(), ApiError>;
}

// ---------------------------------------------------------------------------
// Redis implementation
// ---------------------------------------------------------------------------

/// Redis-backed store using a multiplexed connection manager.
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), ApiError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, ApiError> {
        // SET key value NX EX ttl → "OK" when set, nil when already present.
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let val: Option<String> = conn.get(key).await?;
        Ok(val)
    }

    async fn del(&self, key: &str) -> Result<(), ApiError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation (for tests)
// ---------------------------------------------------------------------------

pub struct MemoryStore {
    data: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }

    fn expired(entry: &(String, Option<Instant>)) -> bool {
        matches!(entry.1, Some(deadline) if Instant::now() >= deadline)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), ApiError> {
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), Some(deadline)));
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, ApiError> {
        let mut data = self.data.lock().unwrap();
        if let Some(entry) = data.get(key) {
            if !Self::expired(entry) {
                return Ok(false);
            }
        }
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        data.insert(key.to_string(), (value.to_string(), Some(deadline)));
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let data = self.data.lock().unwrap();
        Ok(data
            .get(key)
            .filter(|entry| !Self::expired(entry))
            .map(|(v, _)| v.clone()))
    }

    async fn del(&self, key: &str) -> Result<(), ApiError> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }
}
