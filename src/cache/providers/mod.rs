//! Cache provider implementations

mod memory;
mod noop;
mod redis;

pub use memory::MemoryCacheService;
pub use noop::NoOpCacheService;
pub use redis::RedisCacheService;
