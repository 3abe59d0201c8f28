//! The quote cache handle shared by request handlers and the refresh loop.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use futures::FutureExt;
use futures::future::join_all;
use metrics::histogram;
use tracing::{debug, info, instrument, warn};

use crate::domain::{Quote, Symbol};

use super::clock::{Clock, SystemClock};
use super::config::CacheConfig;
use super::entry::SymbolInfo;
use super::error::CacheError;
use super::fetch::{FetchError, QuoteFetcher};
use super::inflight::{InFlight, SharedFetch};
use super::lock::mutex_lock;
use super::refresh::{self, RefreshReport};
use super::stats::{CacheStats, StatsCollector, StatsContext};
use super::store::EntryStore;

const SOURCE: &str = "cache::service";
pub(crate) const METRIC_UPSTREAM_FETCH_MS: &str = "quotecache_upstream_fetch_ms";

/// Everything the cache mutates, behind one mutex.
#[derive(Default)]
pub(crate) struct CacheState {
    pub(crate) store: EntryStore,
    pub(crate) inflight: InFlight,
    pub(crate) stats: StatsCollector,
}

pub(crate) struct Inner {
    pub(crate) config: CacheConfig,
    pub(crate) fetcher: Arc<dyn QuoteFetcher>,
    pub(crate) clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
}

impl Inner {
    pub(crate) fn lock(&self, op: &'static str) -> MutexGuard<'_, CacheState> {
        mutex_lock(&self.state, SOURCE, op)
    }

    /// Apply the outcome of a lookup-triggered fetch and release its marker.
    fn settle(&self, symbol: &Symbol, fetch_id: u64, outcome: &Result<Quote, FetchError>) {
        let now = self.clock.now();
        let mut guard = self.lock("fetch.settle");
        let state = &mut *guard;

        match outcome {
            Ok(quote) => {
                state.store.put(symbol.clone(), quote.clone(), now);
                debug!(symbol = %symbol, price = quote.price, "Cached fresh quote");
            }
            Err(error) => {
                let recorded = state.store.record_error(symbol, error.clone(), now);
                if !recorded && !self.config.failure_backoff.is_zero() {
                    state.store.insert_failed(symbol.clone(), error.clone(), now);
                }
                warn!(symbol = %symbol, error = %error, "Upstream fetch failed");
            }
        }

        state.inflight.complete(symbol, fetch_id);
    }
}

/// Releases the in-flight marker even if the fetch task panics or is aborted.
struct InFlightRelease {
    inner: Arc<Inner>,
    symbol: Symbol,
    fetch_id: u64,
}

impl Drop for InFlightRelease {
    fn drop(&mut self) {
        self.inner
            .lock("fetch.release")
            .inflight
            .complete(&self.symbol, self.fetch_id);
    }
}

async fn run_fetch(inner: Arc<Inner>, symbol: Symbol, fetch_id: u64) -> Result<Quote, FetchError> {
    let _release = InFlightRelease {
        inner: Arc::clone(&inner),
        symbol: symbol.clone(),
        fetch_id,
    };

    let started = Instant::now();
    let outcome = inner.fetcher.fetch(&symbol).await;
    histogram!(METRIC_UPSTREAM_FETCH_MS, "path" => "lookup")
        .record(started.elapsed().as_secs_f64() * 1000.0);

    inner.settle(&symbol, fetch_id, &outcome);
    outcome
}

enum Lookup {
    Hit(Quote),
    Backoff(FetchError),
    Pending(SharedFetch),
}

/// In-memory, self-refreshing quote cache.
///
/// Cloning is cheap; all clones share the same store. Lookups are served from
/// memory when a quote is present; misses for the same symbol are coalesced
/// into one upstream fetch.
#[derive(Clone)]
pub struct QuoteCache {
    inner: Arc<Inner>,
}

impl QuoteCache {
    pub fn new<F>(config: CacheConfig, fetcher: F) -> Self
    where
        F: QuoteFetcher + 'static,
    {
        Self::with_clock(config, fetcher, SystemClock)
    }

    pub fn with_clock<F, C>(config: CacheConfig, fetcher: F, clock: C) -> Self
    where
        F: QuoteFetcher + 'static,
        C: Clock + 'static,
    {
        info!(
            enabled = config.enabled,
            ttl_days = config.ttl_days(),
            refresh_interval_minutes = config.refresh_interval_minutes(),
            refresh_concurrency = config.refresh_concurrency.get(),
            failure_backoff_secs = config.failure_backoff.as_secs(),
            "Quote cache initialized"
        );

        Self {
            inner: Arc::new(Inner {
                config,
                fetcher: Arc::new(fetcher),
                clock: Arc::new(clock),
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Return the quote for `symbol`, fetching it upstream on a miss.
    ///
    /// Concurrent misses for one symbol share a single upstream call and all
    /// receive the same outcome.
    pub async fn resolve(&self, symbol: &Symbol) -> Result<Quote, CacheError> {
        if !self.inner.config.enabled {
            return self.inner.fetcher.fetch(symbol).await.map_err(CacheError::from);
        }

        match self.lookup(symbol) {
            Lookup::Hit(quote) => Ok(quote),
            Lookup::Backoff(error) => Err(error.into()),
            Lookup::Pending(outcome) => outcome.await.map_err(CacheError::from),
        }
    }

    /// Resolve every distinct symbol concurrently; each outcome is independent.
    pub async fn resolve_many<I>(&self, symbols: I) -> BTreeMap<Symbol, Result<Quote, CacheError>>
    where
        I: IntoIterator<Item = Symbol>,
    {
        let unique: BTreeSet<Symbol> = symbols.into_iter().collect();
        let lookups = unique.into_iter().map(|symbol| async move {
            let outcome = self.resolve(&symbol).await;
            (symbol, outcome)
        });
        join_all(lookups).await.into_iter().collect()
    }

    fn lookup(&self, symbol: &Symbol) -> Lookup {
        let now = self.inner.clock.now();
        let mut guard = self.inner.lock("resolve");
        let state = &mut *guard;

        if let Some(quote) = state.store.get(symbol).and_then(|entry| entry.quote.clone()) {
            state.store.touch(symbol, now);
            state.stats.record_hit();
            debug!(symbol = %symbol, "Cache HIT");
            return Lookup::Hit(quote);
        }

        state.stats.record_miss();
        state.store.touch(symbol, now);

        let backoff = self.inner.config.failure_backoff;
        if let Some(error) = state
            .store
            .get(symbol)
            .and_then(|entry| entry.backoff_error(now, backoff))
        {
            debug!(symbol = %symbol, error = %error, "Cache MISS inside failure backoff");
            return Lookup::Backoff(error);
        }

        if let Some(outcome) = state.inflight.join(symbol) {
            debug!(symbol = %symbol, "Cache MISS joined in-flight fetch");
            return Lookup::Pending(outcome);
        }

        debug!(symbol = %symbol, "Cache MISS");
        Lookup::Pending(self.start_fetch(state, symbol))
    }

    fn start_fetch(&self, state: &mut CacheState, symbol: &Symbol) -> SharedFetch {
        let fetch_id = state.inflight.next_id();
        let task = tokio::spawn(run_fetch(Arc::clone(&self.inner), symbol.clone(), fetch_id));
        let outcome = task
            .map(|joined| {
                joined.unwrap_or_else(|err| Err(FetchError::aborted(err.to_string())))
            })
            .boxed()
            .shared();
        state.inflight.register(symbol.clone(), fetch_id, outcome.clone());
        outcome
    }

    /// Point-in-time statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.inner.lock("stats");
        let config = &self.inner.config;
        state.stats.snapshot(StatsContext {
            enabled: config.enabled,
            ttl_days: config.ttl_days(),
            refresh_interval_minutes: config.refresh_interval_minutes(),
            symbols: state.store.live_symbols(),
        })
    }

    /// Details for one cached symbol, or [`CacheError::NotCached`].
    pub fn symbol_info(&self, symbol: &Symbol) -> Result<SymbolInfo, CacheError> {
        self.inner
            .lock("symbol_info")
            .store
            .get(symbol)
            .map(SymbolInfo::from)
            .ok_or_else(|| CacheError::not_cached(symbol.clone()))
    }

    /// Run one refresh pass now, out of band with the scheduler.
    #[instrument(skip(self))]
    pub async fn refresh_now(&self) -> RefreshReport {
        refresh::run_pass(&self.inner).await
    }

    /// Remove one symbol. Returns false if it was not cached.
    pub fn evict(&self, symbol: &Symbol) -> bool {
        let removed = self.inner.lock("evict").store.remove(symbol).is_some();
        if removed {
            info!(symbol = %symbol, "Removed symbol from cache");
        }
        removed
    }

    /// Remove every symbol, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let count = self.inner.lock("clear").store.clear();
        info!(count, "Cache cleared");
        count
    }

    /// Number of entries currently stored, including ones without a quote.
    pub fn len(&self) -> usize {
        self.inner.lock("len").store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of lookup-triggered fetches currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.lock("in_flight").inflight.len()
    }
}
