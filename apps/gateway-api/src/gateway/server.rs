//! WebSocket upgrade handler and per-connection event loop.
//!
//! The transport layer is the only writer of the connection index and the
//! sink table; the fan-out dispatcher only ever reads them. Clients attach
//! with a single-use connection ticket minted by the auth layer.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::db::kv::KeyValueStore;
use crate::error::ApiError;
use crate::AppState;

use super::broker;
use super::events::{Envelope, EventKind, KeyboardDescriptor};

/// Redis key under which the auth layer stores a ticket's user id.
fn ticket_key(token: &str) -> String {
    format!("gw:ticket:{}", token)
}

#[derive(Debug, Deserialize)]
struct ConnectQuery {
    token: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/wss/default.io", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = consume_ticket(state.kv.as_ref(), &query.token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired connection ticket"))?;

    Ok(ws.on_upgrade(move |socket| handle_connection(socket, state, user_id)))
}

/// Look up and burn a single-use connection ticket, returning the user it
/// was minted for.
async fn consume_ticket(
    kv: &dyn KeyValueStore,
    token: &str,
) -> Result<Option<i64>, ApiError> {
    let key = ticket_key(token);
    let val = kv.get(&key).await?;
    if val.is_some() {
        // Delete immediately — single use.
        kv.del(&key).await.ok();
    }
    Ok(val.and_then(|v| v.parse().ok()))
}

async fn handle_connection(socket: WebSocket, state: AppState, user_id: i64) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (tx, mut outbound) = mpsc::unbounded_channel();
    let conn_id = state.sink.register(tx);
    state.index.bind(user_id, conn_id);

    tracing::info!(user_id, conn_id, "gateway connection established");

    // First connection on this node: let the cluster know the user is
    // online. Sibling nodes fan this out to locally connected friends.
    if state.index.local_targets(user_id).len() == 1 {
        publish_online_status(&state, user_id, 1).await;
    }

    loop {
        tokio::select! {
            // Fan-out push destined for this connection.
            frame = outbound.recv() => {
                match frame {
                    Some(frame) => {
                        if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            // Inbound client frame.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(&state, user_id, &text).await;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(?err, user_id, conn_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }
        }
    }

    state.sink.deregister(conn_id);
    state.index.unbind(user_id, conn_id);

    if !state.index.is_online_here(user_id) {
        publish_online_status(&state, user_id, 0).await;
    }

    tracing::info!(user_id, conn_id, "gateway connection closed");
}

/// Client frames use the same `[event, data]` array shape as pushes. The
/// only one a client may originate here is the typing indicator, which is
/// republished to the cluster for the addressed peer's node to deliver.
async fn handle_client_frame(state: &AppState, user_id: i64, text: &str) {
    let frame: Value = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(_) => return,
    };

    let (Some(event), Some(data)) = (frame.get(0).and_then(Value::as_str), frame.get(1)) else {
        return;
    };

    if EventKind::parse(event) != Some(EventKind::Keyboard) {
        tracing::debug!(event, user_id, "ignoring unsupported client frame");
        return;
    }

    let descriptor: KeyboardDescriptor = match serde_json::from_value(data.clone()) {
        Ok(d) => d,
        Err(_) => return,
    };
    // The sender must be the authenticated user.
    if descriptor.sender_id != user_id {
        tracing::debug!(user_id, claimed = descriptor.sender_id, "spoofed keyboard frame dropped");
        return;
    }

    let envelope = Envelope::new(
        EventKind::Keyboard,
        parlor_common::id::prefixed_ulid(parlor_common::id::prefix::EVENT),
        data.clone(),
    );
    let mut publisher = state.publisher.clone();
    if let Err(err) = broker::publish(&mut publisher, &envelope).await {
        tracing::warn!(?err, user_id, "failed to publish keyboard event");
    }
}

async fn publish_online_status(state: &AppState, user_id: i64, status: i32) {
    let envelope = Envelope::new(
        EventKind::OnlineStatus,
        parlor_common::id::prefixed_ulid(parlor_common::id::prefix::EVENT),
        serde_json::json!({ "user_id": user_id, "status": status }),
    );
    let mut publisher = state.publisher.clone();
    if let Err(err) = broker::publish(&mut publisher, &envelope).await {
        tracing::warn!(?err, user_id, status, "failed to publish online status");
    }
}
