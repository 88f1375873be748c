//! Broadcast broker wiring over Redis pub/sub.
//!
//! Every node subscribes to one shared channel from its own connection, so
//! each process gets a full private copy of every broadcast and the
//! subscription disappears with the connection — no queue lifecycle to
//! manage across restarts. Publishing and consuming are decoupled: a
//! publish never learns about (or waits on) any consumer.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;

use crate::error::ApiError;

use super::consumer::Dispatcher;
use super::events::Envelope;

/// The single fan-out channel shared by all gateway nodes.
pub const BROADCAST_CHANNEL: &str = "gw:broadcast";

/// Delay before re-establishing a dropped subscription.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Publish one broadcast event. Called by the in-process event origins
/// (presence transitions, keyboard passthrough) after the relevant fact
/// is already durable.
pub async fn publish(
    conn: &mut redis::aio::ConnectionManager,
    envelope: &Envelope,
) -> Result<(), ApiError> {
    use redis::AsyncCommands;
    let payload =
        serde_json::to_string(envelope).map_err(|_| ApiError::internal("serialization"))?;
    conn.publish::<_, _, ()>(BROADCAST_CHANNEL, payload).await?;
    Ok(())
}

/// Consumer loop for this node. Runs on its own task so a slow store
/// fetch never blocks the connection-accept path; events are handed to
/// the dispatcher one at a time to keep the lease-then-handle sequence
/// race-free within the node.
pub async fn run_consumer(client: redis::Client, dispatcher: Arc<Dispatcher>) {
    loop {
        match subscribe_and_consume(&client, &dispatcher).await {
            Ok(()) => tracing::warn!("broadcast subscription closed, resubscribing"),
            Err(err) => tracing::warn!(?err, "broadcast subscription failed, resubscribing"),
        }
        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
    }
}

async fn subscribe_and_consume(
    client: &redis::Client,
    dispatcher: &Dispatcher,
) -> Result<(), ApiError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(BROADCAST_CHANNEL).await?;
    tracing::info!(channel = BROADCAST_CHANNEL, "broadcast subscription established");

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!(?err, "skipping non-text broadcast payload");
                continue;
            }
        };
        dispatcher.consume(&payload).await;
    }
    Ok(())
}
