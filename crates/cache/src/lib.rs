//! Fast, expiring job storage and the pending queue.
//!
//! [`FastStore`] is the raw key/value, set and list seam, implemented over
//! Redis ([`RedisFastStore`]) and in process ([`MemoryFastStore`]).
//! [`JobCache`] layers the job key layout, expiry horizons and the FIFO
//! pending list on top of it.

pub mod job_cache;
pub mod keys;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use job_cache::JobCache;
pub use keys::{CacheKeys, CacheTtl};
pub use memory::MemoryFastStore;
pub use redis_store::RedisFastStore;
pub use store::{CacheError, FastStore};
