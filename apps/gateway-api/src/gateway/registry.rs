//! Per-node index of which users own which local connections.
//!
//! Mutated only by the transport layer on connect/disconnect; the fan-out
//! dispatcher reads it to resolve local delivery targets. An absent user
//! means "not connected on this node" — they may well be connected on a
//! sibling node, which receives the same broadcast and checks its own index.

use std::collections::HashSet;

use dashmap::DashMap;

/// Opaque identifier of one local WebSocket connection.
pub type ConnId = u64;

/// Concurrent user → connection-set index.
///
/// Uses `DashMap` for shard-level concurrency so dispatcher reads never
/// contend with the whole table during connect/disconnect churn.
pub struct ConnectionIndex {
    inner: DashMap<i64, HashSet<ConnId>>,
}

impl ConnectionIndex {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Record a newly accepted connection for a user.
    pub fn bind(&self, user_id: i64, conn_id: ConnId) {
        self.inner.entry(user_id).or_default().insert(conn_id);
    }

    /// Remove a closed connection. Drops the user's entry when it was the
    /// last one, so `local_targets` stays allocation-free for idle users.
    pub fn unbind(&self, user_id: i64, conn_id: ConnId) {
        if let Some(mut entry) = self.inner.get_mut(&user_id) {
            entry.remove(&conn_id);
            let empty = entry.is_empty();
            drop(entry);
            if empty {
                self.inner.remove_if(&user_id, |_, set| set.is_empty());
            }
        }
    }

    /// All connections this node holds for the user. Empty when the user
    /// has none here.
    pub fn local_targets(&self, user_id: i64) -> Vec<ConnId> {
        self.inner
            .get(&user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether the user still holds at least one connection on this node.
    pub fn is_online_here(&self, user_id: i64) -> bool {
        self.inner
            .get(&user_id)
            .map(|set| !set.is_empty())
            .unwrap_or(false)
    }
}

impl Default for ConnectionIndex {
    fn default() -> Self {
        Self::new()
    }
}
