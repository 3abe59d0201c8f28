//! Cache configuration.
//!
//! Built from the `[cache]` section of `quotecache.toml` (see
//! [`crate::config::CacheSettings`]) or assembled directly in tests.

use std::num::NonZeroUsize;
use std::time::Duration;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_DAY: u64 = 24 * 60 * SECS_PER_MINUTE;

// Default values for cache configuration
const DEFAULT_TTL_DAYS: u64 = 7;
const DEFAULT_REFRESH_INTERVAL_MINUTES: u64 = 30;
const DEFAULT_REFRESH_CONCURRENCY: usize = 4;

/// Runtime configuration for [`super::QuoteCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every lookup goes straight to the fetcher.
    pub enabled: bool,
    /// Maximum idle time (since the last client read) before a symbol is evicted.
    pub ttl: Duration,
    /// Period of the background refresh loop.
    pub refresh_interval: Duration,
    /// Maximum number of upstream fetches in flight during one refresh pass.
    pub refresh_concurrency: NonZeroUsize,
    /// How long a failed first fetch is replayed to callers before retrying.
    /// Zero retries on the very next request.
    pub failure_backoff: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(DEFAULT_TTL_DAYS * SECS_PER_DAY),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_MINUTES * SECS_PER_MINUTE),
            refresh_concurrency: NonZeroUsize::new(DEFAULT_REFRESH_CONCURRENCY)
                .unwrap_or(NonZeroUsize::MIN),
            failure_backoff: Duration::ZERO,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl: Duration::from_secs(u64::from(settings.ttl_days.get()) * SECS_PER_DAY),
            refresh_interval: Duration::from_secs(
                u64::from(settings.refresh_interval_minutes.get()) * SECS_PER_MINUTE,
            ),
            refresh_concurrency: settings.refresh_concurrency,
            failure_backoff: settings.failure_backoff,
        }
    }
}

impl CacheConfig {
    /// A configuration that bypasses the cache entirely.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set the refresh fan-out, clamping zero to one.
    pub fn with_refresh_concurrency(mut self, concurrency: usize) -> Self {
        self.refresh_concurrency = NonZeroUsize::new(concurrency).unwrap_or(NonZeroUsize::MIN);
        self
    }

    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }

    /// TTL expressed in whole days, as reported by the stats endpoint.
    pub fn ttl_days(&self) -> u64 {
        self.ttl.as_secs() / SECS_PER_DAY
    }

    /// Refresh period expressed in whole minutes, as reported by the stats endpoint.
    pub fn refresh_interval_minutes(&self) -> u64 {
        self.refresh_interval.as_secs() / SECS_PER_MINUTE
    }
}
