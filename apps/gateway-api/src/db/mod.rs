pub mod kv;
pub mod pool;
pub mod schema;
pub mod store;
