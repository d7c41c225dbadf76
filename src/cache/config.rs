//! Cache configuration.
//!
//! Built from the `[cache]` section of the resolved settings.

use std::{num::NonZeroUsize, time::Duration};

const DEFAULT_TTL_SECONDS: u64 = 21_600;
const DEFAULT_MAX_ENTRIES: usize = 50;

/// Process-wide expiry and capacity for the record cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lifetime of every entry, measured from insertion.
    pub ttl: Duration,
    /// Maximum number of stored entries.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            ttl: settings.ttl,
            max_entries: settings.max_entries,
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }
}
