//! Background refresh of cached quotes.
//!
//! Each pass:
//! 1. Snapshots the cached symbols
//! 2. Evicts entries idle for longer than the TTL
//! 3. Re-fetches the rest outside the lock, with bounded concurrency
//! 4. Applies each result under the lock, one symbol at a time
//!
//! A failed refresh leaves the previous quote in place; failure alone never
//! evicts an entry.

use std::time::{Duration, Instant};

use futures::{StreamExt, stream};
use metrics::histogram;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::Symbol;

use super::service::{Inner, METRIC_UPSTREAM_FETCH_MS, QuoteCache};

const METRIC_REFRESH_PASS_MS: &str = "quotecache_refresh_pass_ms";

/// A symbol whose refresh failed during a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshFailure {
    pub symbol: Symbol,
    pub error: String,
}

/// Outcome of one refresh pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefreshReport {
    /// Symbols present in the snapshot taken at the start of the pass.
    pub checked: usize,
    pub refreshed: usize,
    pub evicted: usize,
    pub failed: usize,
    /// Symbols left alone because a lookup was already fetching them, or
    /// dropped because they were removed while their refresh was running.
    pub skipped: usize,
    pub evicted_symbols: Vec<Symbol>,
    pub failures: Vec<RefreshFailure>,
    pub duration_ms: u64,
}

pub(crate) async fn run_pass(inner: &Inner) -> RefreshReport {
    let mut report = RefreshReport::default();
    if !inner.config.enabled {
        return report;
    }

    let started = Instant::now();
    let now = inner.clock.now();
    let symbols = inner.lock("refresh.snapshot").store.snapshot_keys();
    report.checked = symbols.len();

    let mut to_refresh = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let mut guard = inner.lock("refresh.expire");
        let state = &mut *guard;
        let idle = match state.store.get(&symbol) {
            Some(entry) => entry.is_idle(now, inner.config.ttl),
            None => continue,
        };
        if idle {
            state.store.remove(&symbol);
            state.stats.record_eviction();
            info!(symbol = %symbol, "Removing expired symbol from cache");
            report.evicted_symbols.push(symbol);
        } else if state.inflight.contains(&symbol) {
            debug!(symbol = %symbol, "Lookup fetch already running; skipping refresh");
            report.skipped += 1;
        } else {
            to_refresh.push(symbol);
        }
    }
    report.evicted = report.evicted_symbols.len();

    if to_refresh.is_empty() {
        debug!(evicted = report.evicted, "No symbols to refresh");
    } else {
        info!(
            count = to_refresh.len(),
            symbols = ?to_refresh,
            "Refreshing cached symbols"
        );
    }

    let fetcher = &inner.fetcher;
    let mut outcomes = stream::iter(to_refresh)
        .map(|symbol| async move {
            let fetch_started = Instant::now();
            let outcome = fetcher.fetch(&symbol).await;
            histogram!(METRIC_UPSTREAM_FETCH_MS, "path" => "refresh")
                .record(fetch_started.elapsed().as_secs_f64() * 1000.0);
            (symbol, outcome)
        })
        .buffer_unordered(inner.config.refresh_concurrency.get());

    while let Some((symbol, outcome)) = outcomes.next().await {
        let now = inner.clock.now();
        let mut guard = inner.lock("refresh.apply");
        let state = &mut *guard;

        if state.store.get(&symbol).is_none() {
            debug!(symbol = %symbol, "Symbol removed during refresh; dropping result");
            report.skipped += 1;
            continue;
        }

        match outcome {
            Ok(quote) => {
                debug!(symbol = %symbol, price = quote.price, "Refreshed symbol");
                state.store.put(symbol, quote, now);
                state.stats.record_refresh();
                report.refreshed += 1;
            }
            Err(error) => {
                warn!(symbol = %symbol, error = %error, "Failed to refresh symbol");
                state.store.record_error(&symbol, error.clone(), now);
                state.stats.record_refresh_error();
                report.failed += 1;
                report.failures.push(RefreshFailure {
                    symbol,
                    error: error.message(),
                });
            }
        }
    }

    let elapsed = started.elapsed();
    report.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    histogram!(METRIC_REFRESH_PASS_MS).record(elapsed.as_secs_f64() * 1000.0);

    info!(
        refreshed = report.refreshed,
        failed = report.failed,
        evicted = report.evicted,
        skipped = report.skipped,
        checked = report.checked,
        duration_ms = report.duration_ms,
        "Refresh completed"
    );

    report
}

/// Periodic driver for [`QuoteCache::refresh_now`].
pub struct RefreshScheduler {
    cache: QuoteCache,
    period: Duration,
}

impl RefreshScheduler {
    pub fn new(cache: QuoteCache) -> Self {
        let period = cache.config().refresh_interval;
        Self { cache, period }
    }

    /// Start the loop on the current runtime.
    ///
    /// Returns `None` when caching is disabled; there is nothing to refresh.
    pub fn spawn(self) -> Option<RefreshHandle> {
        if !self.cache.config().enabled {
            info!("Cache disabled; refresh scheduler not started");
            return None;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        Some(RefreshHandle {
            shutdown: shutdown_tx,
            task,
        })
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await; // Skip the first immediate tick

        info!(
            period_secs = self.period.as_secs(),
            "Refresh scheduler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    tokio::select! {
                        _ = self.cache.refresh_now() => {}
                        _ = shutdown.changed() => break,
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("Refresh scheduler stopped");
    }
}

/// Handle to a running [`RefreshScheduler`].
pub struct RefreshHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Signal the loop to stop and wait for it, abandoning any pass in progress.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "Refresh scheduler task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
