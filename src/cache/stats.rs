//! Process-lifetime cache counters.
//!
//! Counters live inside the cache state mutex, so a [`CacheStats`] snapshot is
//! consistent at a point in time. Each increment is mirrored to the `metrics`
//! facade for external scraping.

use metrics::counter;
use serde::Serialize;

use crate::domain::Symbol;

pub(crate) const METRIC_CACHE_REQUEST_TOTAL: &str = "quotecache_cache_request_total";
pub(crate) const METRIC_CACHE_HIT_TOTAL: &str = "quotecache_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS_TOTAL: &str = "quotecache_cache_miss_total";
pub(crate) const METRIC_CACHE_EVICT_TOTAL: &str = "quotecache_cache_evict_total";
pub(crate) const METRIC_CACHE_REFRESH_TOTAL: &str = "quotecache_cache_refresh_total";
pub(crate) const METRIC_CACHE_REFRESH_ERROR_TOTAL: &str = "quotecache_cache_refresh_error_total";

#[derive(Debug, Default, Clone)]
pub(crate) struct StatsCollector {
    total_requests: u64,
    hits: u64,
    misses: u64,
    refreshes: u64,
    refresh_errors: u64,
    evictions: u64,
}

impl StatsCollector {
    pub(crate) fn record_hit(&mut self) {
        self.record_request();
        self.hits += 1;
        counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
    }

    pub(crate) fn record_miss(&mut self) {
        self.record_request();
        self.misses += 1;
        counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
    }

    pub(crate) fn record_refresh(&mut self) {
        self.refreshes += 1;
        counter!(METRIC_CACHE_REFRESH_TOTAL).increment(1);
    }

    pub(crate) fn record_refresh_error(&mut self) {
        self.refresh_errors += 1;
        counter!(METRIC_CACHE_REFRESH_ERROR_TOTAL).increment(1);
    }

    pub(crate) fn record_eviction(&mut self) {
        self.evictions += 1;
        counter!(METRIC_CACHE_EVICT_TOTAL).increment(1);
    }

    fn record_request(&mut self) {
        self.total_requests += 1;
        counter!(METRIC_CACHE_REQUEST_TOTAL).increment(1);
    }

    pub(crate) fn snapshot(&self, context: StatsContext) -> CacheStats {
        CacheStats {
            enabled: context.enabled,
            cached_symbols: context.symbols.len(),
            total_requests: self.total_requests,
            cache_hits: self.hits,
            cache_misses: self.misses,
            hit_rate_percent: hit_rate_percent(self.hits, self.total_requests),
            total_refreshes: self.refreshes,
            refresh_errors: self.refresh_errors,
            evictions: self.evictions,
            ttl_days: context.ttl_days,
            refresh_interval_minutes: context.refresh_interval_minutes,
            symbols: context.symbols,
        }
    }
}

/// Configuration and store facts folded into a stats snapshot.
pub(crate) struct StatsContext {
    pub enabled: bool,
    pub ttl_days: u64,
    pub refresh_interval_minutes: u64,
    pub symbols: Vec<Symbol>,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub cached_symbols: usize,
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_rate_percent: f64,
    pub total_refreshes: u64,
    pub refresh_errors: u64,
    pub evictions: u64,
    pub ttl_days: u64,
    pub refresh_interval_minutes: u64,
    pub symbols: Vec<Symbol>,
}

/// `hits / total * 100` rounded to two decimals; zero when nothing was requested.
fn hit_rate_percent(hits: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = hits as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}
