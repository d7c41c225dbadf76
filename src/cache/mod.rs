//! In-process record cache.
//!
//! A single [`ExpiringCache`] is created at startup and shared by every
//! request handler. It is the only mutable state in the service.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! ttl_seconds = 21600
//! max_entries = 50
//! ```

mod config;
mod keys;
mod lock;
mod store;

pub use config::CacheConfig;
pub use keys::CacheKey;
pub use store::{
    ExpiringCache, METRIC_CACHE_EVICT_TOTAL, METRIC_CACHE_EXPIRED_TOTAL, METRIC_CACHE_HIT_TOTAL,
    METRIC_CACHE_MISS_TOTAL,
};
