//! The fan-out dispatcher: one consumed broadcast event in, zero or more
//! local pushes out.
//!
//! Every gateway node consumes the full broadcast stream and resolves only
//! the connections it owns. Processing is read-only with respect to domain
//! data and every event is acknowledged exactly once per node: duplicates
//! are fenced by the idempotency lease, handler failures are logged and
//! the event dropped — a missed live notification is recovered by the
//! client's next sync against the authoritative store, so a broker-level
//! retry would add no value.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;

use crate::db::store::ChatStore;
use crate::error::ApiError;

use super::enrich::{enrich_friend_apply, enrich_talk};
use super::events::{
    push_frame, Envelope, EventKind, FriendApplyDescriptor, KeyboardDescriptor,
    OnlineStatusDescriptor, RevokeDescriptor, TalkDescriptor, TALK_TYPE_GROUP, TALK_TYPE_PRIVATE,
};
use super::idempotency::IdempotencyGuard;
use super::registry::{ConnId, ConnectionIndex};
use super::rooms::RoomRegistry;
use super::sink::ConnectionSink;

pub struct Dispatcher {
    guard: IdempotencyGuard,
    store: Arc<dyn ChatStore>,
    rooms: Arc<dyn RoomRegistry>,
    index: Arc<ConnectionIndex>,
    sink: Arc<ConnectionSink>,
}

impl Dispatcher {
    pub fn new(
        guard: IdempotencyGuard,
        store: Arc<dyn ChatStore>,
        rooms: Arc<dyn RoomRegistry>,
        index: Arc<ConnectionIndex>,
        sink: Arc<ConnectionSink>,
    ) -> Self {
        Self {
            guard,
            store,
            rooms,
            index,
            sink,
        }
    }

    /// Consume one raw broker payload. Always completes: malformed
    /// envelopes, unknown kinds, duplicates, and handler failures are all
    /// logged and dropped rather than propagated.
    pub async fn consume(&self, raw: &str) {
        let envelope: Envelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::debug!(?err, "dropping malformed broadcast payload");
                return;
            }
        };

        // Unknown kinds come from newer producers; older nodes ignore them.
        let kind = match EventKind::parse(&envelope.event) {
            Some(kind) => kind,
            None => {
                tracing::debug!(event = %envelope.event, "dropping unknown event kind");
                return;
            }
        };

        match self.guard.acquire(&envelope.uuid).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::trace!(uuid = %envelope.uuid, "duplicate event suppressed");
                return;
            }
            Err(err) => {
                tracing::warn!(?err, uuid = %envelope.uuid, "lease check failed, dropping event");
                return;
            }
        }

        let result = match kind {
            EventKind::Talk => self.on_talk(&envelope).await,
            EventKind::Keyboard => self.on_keyboard(&envelope).await,
            EventKind::OnlineStatus => self.on_online_status(&envelope).await,
            EventKind::RevokeTalk => self.on_revoke_talk(&envelope).await,
            EventKind::FriendApply => self.on_friend_apply(&envelope).await,
        };

        if let Err(err) = result {
            tracing::warn!(?err, event = %envelope.event, uuid = %envelope.uuid, "event handling failed");
        }
    }

    /// Local targets for a conversation: both peers for a direct chat, the
    /// current membership snapshot for a group. Set semantics dedup
    /// multi-device connections.
    async fn resolve_talk_targets(
        &self,
        talk_type: i32,
        sender_id: i64,
        receiver_id: i64,
    ) -> Result<HashSet<ConnId>, ApiError> {
        let mut targets = HashSet::new();
        if talk_type == TALK_TYPE_PRIVATE {
            targets.extend(self.index.local_targets(sender_id));
            targets.extend(self.index.local_targets(receiver_id));
        } else if talk_type == TALK_TYPE_GROUP {
            for member in self.rooms.room_members(receiver_id).await? {
                targets.extend(self.index.local_targets(member));
            }
        }
        Ok(targets)
    }

    async fn on_talk(&self, envelope: &Envelope) -> Result<(), ApiError> {
        let d: TalkDescriptor = parse_descriptor(envelope)?;

        let targets = self
            .resolve_talk_targets(d.talk_type, d.sender_id, d.receiver_id)
            .await?;
        if targets.is_empty() {
            return Ok(());
        }

        let notify = match enrich_talk(
            self.store.as_ref(),
            d.talk_type,
            d.receiver_id,
            d.record_id,
        )
        .await?
        {
            Some(notify) => notify,
            // Record deleted between publish and consume.
            None => return Ok(()),
        };

        let frame = push_frame(EventKind::Talk, &notify);
        let delivered = self.sink.push_all(targets, &frame);
        tracing::debug!(record_id = d.record_id, delivered, "talk fan-out");
        Ok(())
    }

    async fn on_keyboard(&self, envelope: &Envelope) -> Result<(), ApiError> {
        let d: KeyboardDescriptor = parse_descriptor(envelope)?;

        // Passthrough: typing indicators carry no persisted state to fetch.
        let frame = push_frame(EventKind::Keyboard, &envelope.data);
        self.sink
            .push_all(self.index.local_targets(d.receiver_id), &frame);
        Ok(())
    }

    async fn on_online_status(&self, envelope: &Envelope) -> Result<(), ApiError> {
        let d: OnlineStatusDescriptor = parse_descriptor(envelope)?;

        let mut targets: HashSet<ConnId> = HashSet::new();
        for friend_id in self.store.friend_ids(d.user_id).await? {
            targets.extend(self.index.local_targets(friend_id));
        }
        if targets.is_empty() {
            return Ok(());
        }

        let frame = push_frame(
            EventKind::OnlineStatus,
            &json!({ "user_id": d.user_id, "status": d.status }),
        );
        self.sink.push_all(targets, &frame);
        Ok(())
    }

    async fn on_revoke_talk(&self, envelope: &Envelope) -> Result<(), ApiError> {
        let d: RevokeDescriptor = parse_descriptor(envelope)?;

        // The event only carries the record id; routing comes from the row.
        let record = match self.store.talk_record(d.record_id).await? {
            Some(record) => record,
            None => return Ok(()),
        };

        let targets = self
            .resolve_talk_targets(record.talk_type, record.user_id, record.receiver_id)
            .await?;
        if targets.is_empty() {
            return Ok(());
        }

        let frame = push_frame(
            EventKind::RevokeTalk,
            &json!({
                "talk_type": record.talk_type,
                "sender_id": record.user_id,
                "receiver_id": record.receiver_id,
                "record_id": record.id,
            }),
        );
        self.sink.push_all(targets, &frame);
        Ok(())
    }

    async fn on_friend_apply(&self, envelope: &Envelope) -> Result<(), ApiError> {
        let d: FriendApplyDescriptor = parse_descriptor(envelope)?;

        let (recipient, body) =
            match enrich_friend_apply(self.store.as_ref(), d.apply_id, d.apply_type).await? {
                Some(result) => result,
                None => return Ok(()),
            };

        let frame = push_frame(EventKind::FriendApply, &body);
        self.sink
            .push_all(self.index.local_targets(recipient), &frame);
        Ok(())
    }
}

fn parse_descriptor<T: serde::de::DeserializeOwned>(envelope: &Envelope) -> Result<T, ApiError> {
    serde_json::from_value(envelope.data.clone())
        .map_err(|err| ApiError::bad_request(format!("malformed {} descriptor: {err}", envelope.event)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::kv::MemoryStore;
    use crate::db::store::MemoryChatStore;
    use crate::gateway::rooms::MemoryRooms;

    fn dispatcher() -> Dispatcher {
        let kv = Arc::new(MemoryStore::new());
        Dispatcher::new(
            IdempotencyGuard::new(kv, "run_test".to_string()),
            Arc::new(MemoryChatStore::new()),
            Arc::new(MemoryRooms::new()),
            Arc::new(ConnectionIndex::new()),
            Arc::new(ConnectionSink::new()),
        )
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped() {
        dispatcher().consume("not json at all").await;
    }

    #[tokio::test]
    async fn unknown_kind_is_dropped() {
        dispatcher()
            .consume(r#"{"event":"vote_stream","uuid":"u1","data":{}}"#)
            .await;
    }

    #[tokio::test]
    async fn malformed_descriptor_is_dropped() {
        // Valid envelope, garbage data: handled (logged), never panics.
        dispatcher()
            .consume(r#"{"event":"talk","uuid":"u1","data":{"talk_type":"nope"}}"#)
            .await;
    }
}
