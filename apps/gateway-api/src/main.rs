use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateway_api::config::Config;
use gateway_api::db::kv::{KeyValueStore, RedisStore};
use gateway_api::db::store::{ChatStore, DieselStore};
use gateway_api::gateway::broker;
use gateway_api::gateway::consumer::Dispatcher;
use gateway_api::gateway::idempotency::IdempotencyGuard;
use gateway_api::gateway::registry::ConnectionIndex;
use gateway_api::gateway::rooms::{RedisRooms, RoomRegistry};
use gateway_api::gateway::sink::ConnectionSink;
use gateway_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing — env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    // Each process run gets a fresh id; it scopes the idempotency leases
    // so sibling nodes process their own copy of every broadcast.
    let run_id = parlor_common::id::prefixed_ulid(parlor_common::id::prefix::RUN);

    // Connect to PostgreSQL (read-only authoritative store).
    let db = gateway_api::db::pool::connect(&config.database_url).await;
    let store: Arc<dyn ChatStore> = Arc::new(DieselStore::new(db));

    // Connect to Redis: broadcast channel, leases, rooms, tickets.
    let redis_client = redis::Client::open(config.redis_url.as_str()).expect("invalid REDIS_URL");
    let redis_conn = redis::aio::ConnectionManager::new(redis_client.clone())
        .await
        .expect("failed to connect to redis");

    let kv: Arc<dyn KeyValueStore> = Arc::new(RedisStore::new(redis_conn.clone()));
    let rooms: Arc<dyn RoomRegistry> = Arc::new(RedisRooms::new(redis_conn.clone()));
    let index = Arc::new(ConnectionIndex::new());
    let sink = Arc::new(ConnectionSink::new());

    tracing::info!(%run_id, "gateway-api configured");

    // The consumer runs on its own task so broadcast handling never blocks
    // the accept path.
    let dispatcher = Dispatcher::new(
        IdempotencyGuard::new(kv.clone(), run_id.clone()),
        store,
        rooms,
        index.clone(),
        sink.clone(),
    );
    tokio::spawn(broker::run_consumer(redis_client, Arc::new(dispatcher)));

    let state = AppState {
        kv,
        index,
        sink,
        publisher: redis_conn,
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(gateway_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "gateway-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
