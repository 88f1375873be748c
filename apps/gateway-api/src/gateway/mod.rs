pub mod broker;
pub mod consumer;
pub mod enrich;
pub mod events;
pub mod idempotency;
pub mod registry;
pub mod rooms;
pub mod server;
pub mod sink;
