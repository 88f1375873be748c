//! Short-lived lease that suppresses duplicate event processing.
//!
//! Every node receives every broadcast, and the broker may redeliver. The
//! lease key pairs the node's run id with the event uuid, so each node
//! processes an event at most once per TTL window while sibling nodes
//! (owning different sockets) still process their own copy.

use std::sync::Arc;

use crate::db::kv::KeyValueStore;
use crate::error::ApiError;

/// How long a processed event's uuid stays fenced. Never released early:
/// expiry also covers a node crashing mid-handler, after which a broker
/// redelivery is allowed to reprocess.
pub const LEASE_TTL_SECS: u64 = 60;

pub struct IdempotencyGuard {
    kv: Arc<dyn KeyValueStore>,
    run_id: String,
}

impl IdempotencyGuard {
    pub fn new(kv: Arc<dyn KeyValueStore>, run_id: String) -> Self {
        Self { kv, run_id }
    }

    /// Try to claim the event for this node run. `false` means another
    /// delivery of the same uuid already claimed it within the TTL.
    pub async fn acquire(&self, uuid: &str) -> Result<bool, ApiError> {
        let key = format!("gw:lease:{}:{}", self.run_id, uuid);
        self.kv.set_nx_ex(&key, "1", LEASE_TTL_SECS).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::kv::MemoryStore;

    #[tokio::test]
    async fn second_acquire_is_rejected() {
        let guard = IdempotencyGuard::new(Arc::new(MemoryStore::new()), "run_a".to_string());
        assert!(guard.acquire("u1").await.unwrap());
        assert!(!guard.acquire("u1").await.unwrap());
        assert!(guard.acquire("u2").await.unwrap());
    }

    #[tokio::test]
    async fn leases_are_scoped_per_run() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let a = IdempotencyGuard::new(kv.clone(), "run_a".to_string());
        let b = IdempotencyGuard::new(kv, "run_b".to_string());

        // Two node runs share the store but fence independently.
        assert!(a.acquire("u1").await.unwrap());
        assert!(b.acquire("u1").await.unwrap());
    }
}
