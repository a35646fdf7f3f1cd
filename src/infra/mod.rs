//! Infrastructure adapters for shared key-value stores.

pub mod store;

pub use store::InMemoryStore;
#[cfg(feature = "redis")]
pub use store::RedisStore;
