//! Local connection table and push primitive.
//!
//! One entry per live WebSocket, owned exclusively by this node. A push is
//! a non-blocking handoff to the connection's writer task; there is no
//! buffering or retry beyond the per-connection channel.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::registry::ConnId;

/// Result of a single push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    /// The target vanished between recipient resolution and push. Expected
    /// during disconnect races; simply a no-op.
    Skipped,
}

pub struct ConnectionSink {
    conns: DashMap<ConnId, mpsc::UnboundedSender<String>>,
    next_id: AtomicU64,
}

impl ConnectionSink {
    pub fn new() -> Self {
        Self {
            conns: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new connection's outbound channel; returns its id.
    pub fn register(&self, tx: mpsc::UnboundedSender<String>) -> ConnId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.conns.insert(id, tx);
        id
    }

    /// Drop a closed connection from the table.
    pub fn deregister(&self, conn_id: ConnId) {
        self.conns.remove(&conn_id);
    }

    pub fn exists(&self, conn_id: ConnId) -> bool {
        self.conns.contains_key(&conn_id)
    }

    /// Push one frame to one target, best-effort.
    pub fn push(&self, conn_id: ConnId, frame: &str) -> PushOutcome {
        match self.conns.get(&conn_id) {
            Some(tx) if tx.send(frame.to_string()).is_ok() => PushOutcome::Delivered,
            // A send error means the writer task is gone; the deregister
            // will catch up shortly.
            _ => PushOutcome::Skipped,
        }
    }

    /// Push one frame to many targets. A skipped target never aborts the
    /// rest. Returns the number delivered.
    pub fn push_all<I>(&self, targets: I, frame: &str) -> usize
    where
        I: IntoIterator<Item = ConnId>,
    {
        targets
            .into_iter()
            .filter(|&t| self.push(t, frame) == PushOutcome::Delivered)
            .count()
    }
}

impl Default for ConnectionSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_reaches_live_connection() {
        let sink = ConnectionSink::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = sink.register(tx);

        assert_eq!(sink.push(id, "hello"), PushOutcome::Delivered);
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn push_to_missing_target_is_skipped() {
        let sink = ConnectionSink::new();
        assert_eq!(sink.push(42, "hello"), PushOutcome::Skipped);
    }

    #[tokio::test]
    async fn deregistered_target_is_skipped() {
        let sink = ConnectionSink::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = sink.register(tx);
        sink.deregister(id);

        assert!(!sink.exists(id));
        assert_eq!(sink.push(id, "hello"), PushOutcome::Skipped);
    }

    #[tokio::test]
    async fn push_all_skips_dead_targets_without_aborting() {
        let sink = ConnectionSink::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let a = sink.register(tx1);
        let b = sink.register(tx2);

        let delivered = sink.push_all([a, 999, b], "frame");
        assert_eq!(delivered, 2);
        assert_eq!(rx1.recv().await.unwrap(), "frame");
        assert_eq!(rx2.recv().await.unwrap(), "frame");
    }
}
