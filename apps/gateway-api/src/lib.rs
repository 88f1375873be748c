pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;

use std::sync::Arc;

use config::Config;
use db::kv::KeyValueStore;
use gateway::registry::ConnectionIndex;
use gateway::sink::ConnectionSink;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub kv: Arc<dyn KeyValueStore>,
    pub index: Arc<ConnectionIndex>,
    pub sink: Arc<ConnectionSink>,
    /// Multiplexed Redis connection used to publish broadcast events.
    pub publisher: redis::aio::ConnectionManager,
    pub config: Arc<Config>,
}
