//! Fast store implementations - Redis and in-memory fallback.

mod memory;

pub use memory::InMemoryFastStore;

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::{RedisConfig, RedisFastStore};
