mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use quotecache::cache::{
    CacheConfig, CacheError, FetchError, ManualClock, QuoteCache, RefreshScheduler,
};
use time::OffsetDateTime;

use common::{ScriptedFetcher, eventually, symbol, wait_until};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn manual_cache(
    config: CacheConfig,
    fetcher: &Arc<ScriptedFetcher>,
) -> (QuoteCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(OffsetDateTime::UNIX_EPOCH));
    let cache = QuoteCache::with_clock(config, Arc::clone(fetcher), Arc::clone(&clock));
    (cache, clock)
}

#[tokio::test]
async fn hit_path_never_calls_fetcher() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond("AAPL", 195.5);
    let cache = QuoteCache::new(CacheConfig::default(), Arc::clone(&fetcher));

    let first = cache.resolve(&symbol("AAPL")).await.expect("first lookup");
    let second = cache.resolve(&symbol("aapl")).await.expect("second lookup");

    assert_eq!(first, second);
    assert_eq!(fetcher.calls("AAPL"), 1);

    let stats = cache.stats();
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.hit_rate_percent, 50.0);
    assert_eq!(stats.cached_symbols, 1);
    assert_eq!(stats.symbols, vec![symbol("AAPL")]);
}

#[tokio::test]
async fn concurrent_misses_share_one_fetch() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond("MSFT", 410.25);
    let gate = fetcher.hold();
    let cache = QuoteCache::new(CacheConfig::default(), Arc::clone(&fetcher));
    let msft = symbol("MSFT");

    let lookups = join_all((0..10).map(|_| cache.resolve(&msft)));
    let release = async {
        wait_until(|| fetcher.calls("MSFT") == 1).await;
        assert_eq!(cache.in_flight(), 1);
        gate.add_permits(1);
    };
    let (outcomes, ()) = tokio::join!(lookups, release);

    assert_eq!(fetcher.calls("MSFT"), 1);
    for outcome in outcomes {
        assert_eq!(outcome.expect("shared outcome").price, 410.25);
    }
    assert_eq!(cache.in_flight(), 0);

    let stats = cache.stats();
    assert_eq!(stats.cache_misses, 10);
    assert_eq!(stats.cache_hits, 0);
}

#[tokio::test]
async fn concurrent_misses_share_one_failure() {
    let fetcher = ScriptedFetcher::new();
    fetcher.fail("ZZZZ", FetchError::RateLimited);
    let gate = fetcher.hold();
    let cache = QuoteCache::new(CacheConfig::default(), Arc::clone(&fetcher));
    let zzzz = symbol("ZZZZ");

    let lookups = join_all((0..4).map(|_| cache.resolve(&zzzz)));
    let release = async {
        wait_until(|| fetcher.calls("ZZZZ") == 1).await;
        gate.add_permits(1);
    };
    let (outcomes, ()) = tokio::join!(lookups, release);

    for outcome in outcomes {
        assert_eq!(outcome, Err(CacheError::Fetch(FetchError::RateLimited)));
    }
    assert_eq!(fetcher.calls("ZZZZ"), 1);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn failed_first_fetch_is_not_cached_and_retries() {
    let fetcher = ScriptedFetcher::new();
    let cache = QuoteCache::new(CacheConfig::default(), Arc::clone(&fetcher));
    let zzzz = symbol("ZZZZ");

    let err = cache.resolve(&zzzz).await.expect_err("unknown symbol");
    assert_eq!(err, CacheError::Fetch(FetchError::not_found(zzzz.clone())));
    assert!(cache.is_empty());
    assert_eq!(
        cache.symbol_info(&zzzz),
        Err(CacheError::not_cached(zzzz.clone()))
    );

    fetcher.respond("ZZZZ", 1.0);
    let quote = cache.resolve(&zzzz).await.expect("retry succeeds");
    assert_eq!(quote.price, 1.0);
    assert_eq!(fetcher.calls("ZZZZ"), 2);
    assert_eq!(cache.stats().cache_misses, 2);
}

#[tokio::test]
async fn failure_backoff_replays_error_until_window_passes() {
    let fetcher = ScriptedFetcher::new();
    fetcher.fail("TSLA", FetchError::upstream("connection reset"));
    let config = CacheConfig::default().with_failure_backoff(Duration::from_secs(60));
    let (cache, clock) = manual_cache(config, &fetcher);
    let tsla = symbol("TSLA");

    assert!(cache.resolve(&tsla).await.is_err());
    clock.advance(Duration::from_secs(30));
    let replayed = cache.resolve(&tsla).await.expect_err("inside backoff");
    assert_eq!(
        replayed,
        CacheError::Fetch(FetchError::upstream("connection reset"))
    );
    assert_eq!(fetcher.calls("TSLA"), 1);

    let info = cache.symbol_info(&tsla).expect("failed entry is kept");
    assert!(info.cached);
    assert!(info.price.is_none());
    assert!(info.last_error.is_some());

    fetcher.respond("TSLA", 250.0);
    clock.advance(Duration::from_secs(31));
    let quote = cache.resolve(&tsla).await.expect("retry after window");
    assert_eq!(quote.price, 250.0);
    assert_eq!(fetcher.calls("TSLA"), 2);

    let stats = cache.stats();
    assert_eq!(stats.cache_misses, 3);
    assert_eq!(stats.cache_hits, 0);
}

#[tokio::test]
async fn refresh_failure_keeps_serving_stale_quote() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond("AAPL", 100.0);
    let cache = QuoteCache::new(CacheConfig::default(), Arc::clone(&fetcher));
    let aapl = symbol("AAPL");
    cache.resolve(&aapl).await.expect("initial fetch");

    fetcher.fail("AAPL", FetchError::RateLimited);
    let report = cache.refresh_now().await;
    assert_eq!(report.checked, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.refreshed, 0);
    assert_eq!(report.failures[0].symbol, aapl);

    let quote = cache.resolve(&aapl).await.expect("stale quote served");
    assert_eq!(quote.price, 100.0);
    assert_eq!(fetcher.calls("AAPL"), 2);

    let info = cache.symbol_info(&aapl).expect("still cached");
    assert_eq!(info.price, Some(100.0));
    assert!(info.last_error.is_some());

    let stats = cache.stats();
    assert_eq!(stats.refresh_errors, 1);
    assert_eq!(stats.cache_hits, 1);
}

#[tokio::test]
async fn refresh_updates_quote_and_clears_error() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond("AAPL", 100.0);
    let cache = QuoteCache::new(CacheConfig::default(), Arc::clone(&fetcher));
    let aapl = symbol("AAPL");
    cache.resolve(&aapl).await.expect("initial fetch");

    fetcher.fail("AAPL", FetchError::RateLimited);
    cache.refresh_now().await;
    fetcher.respond("AAPL", 101.5);
    let report = cache.refresh_now().await;
    assert_eq!(report.refreshed, 1);

    let info = cache.symbol_info(&aapl).expect("cached");
    assert_eq!(info.price, Some(101.5));
    assert!(info.last_error.is_none());
    assert_eq!(cache.stats().total_refreshes, 1);
}

#[tokio::test]
async fn idle_symbols_expire_and_refresh_does_not_count_as_access() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond("AAPL", 100.0);
    fetcher.respond("MSFT", 200.0);
    let config = CacheConfig::default().with_ttl(DAY);
    let (cache, clock) = manual_cache(config, &fetcher);
    let aapl = symbol("AAPL");
    let msft = symbol("MSFT");

    cache.resolve(&aapl).await.expect("aapl");
    cache.resolve(&msft).await.expect("msft");

    clock.advance(DAY / 2);
    let report = cache.refresh_now().await;
    assert_eq!(report.refreshed, 2);
    cache.resolve(&msft).await.expect("msft read keeps it alive");

    // AAPL is exactly at the TTL boundary: still kept.
    clock.advance(DAY / 2);
    let report = cache.refresh_now().await;
    assert_eq!(report.evicted, 0);

    clock.advance(Duration::from_secs(1));
    let report = cache.refresh_now().await;
    assert_eq!(report.evicted, 1);
    assert_eq!(report.evicted_symbols, vec![aapl.clone()]);
    assert_eq!(report.refreshed, 1);

    assert_eq!(
        cache.symbol_info(&aapl),
        Err(CacheError::not_cached(aapl.clone()))
    );
    let stats = cache.stats();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.symbols, vec![msft]);

    cache.resolve(&aapl).await.expect("refetched after eviction");
    assert_eq!(fetcher.calls("AAPL"), 4);
}

#[tokio::test]
async fn read_at_half_unit_then_pass_at_two_units_evicts() {
    let unit = Duration::from_secs(3600);
    let fetcher = ScriptedFetcher::new();
    fetcher.respond("AAPL", 100.0);
    let config = CacheConfig::default()
        .with_ttl(unit)
        .with_refresh_interval(unit);
    let (cache, clock) = manual_cache(config, &fetcher);
    let aapl = symbol("AAPL");

    cache.resolve(&aapl).await.expect("t=0 miss");
    clock.advance(unit / 2);
    cache.resolve(&aapl).await.expect("t=0.5 hit");
    clock.advance(unit + unit / 2);
    let report = cache.refresh_now().await;
    assert_eq!(report.evicted_symbols, vec![aapl.clone()]);

    clock.advance(unit / 10);
    cache.resolve(&aapl).await.expect("t=2.1 miss");

    let stats = cache.stats();
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 2);
    assert_eq!(fetcher.calls("AAPL"), 2);
}

#[tokio::test]
async fn refresh_does_not_resurrect_cleared_symbols() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond("AAPL", 100.0);
    let cache = QuoteCache::new(CacheConfig::default(), Arc::clone(&fetcher));
    cache.resolve(&symbol("AAPL")).await.expect("initial fetch");

    let gate = fetcher.hold();
    let refresh = cache.refresh_now();
    let interfere = async {
        wait_until(|| fetcher.calls("AAPL") == 2).await;
        assert_eq!(cache.clear(), 1);
        gate.add_permits(1);
    };
    let (report, ()) = tokio::join!(refresh, interfere);

    assert_eq!(report.skipped, 1);
    assert_eq!(report.refreshed, 0);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn refresh_skips_symbol_with_lookup_fetch_running() {
    let fetcher = ScriptedFetcher::new();
    fetcher.fail("TSLA", FetchError::upstream("connection reset"));
    let config = CacheConfig::default().with_failure_backoff(Duration::from_secs(60));
    let (cache, clock) = manual_cache(config, &fetcher);
    let tsla = symbol("TSLA");
    assert!(cache.resolve(&tsla).await.is_err());

    clock.advance(Duration::from_secs(61));
    fetcher.respond("TSLA", 250.0);
    let gate = fetcher.hold();
    let lookup = cache.resolve(&tsla);
    let refresh = async {
        wait_until(|| fetcher.calls("TSLA") == 2).await;
        let report = cache.refresh_now().await;
        assert_eq!(fetcher.calls("TSLA"), 2);
        gate.add_permits(1);
        report
    };
    let (quote, report) = tokio::join!(lookup, refresh);

    assert_eq!(quote.expect("lookup fetch succeeds").price, 250.0);
    assert_eq!(report.checked, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.refreshed, 0);
    assert_eq!(fetcher.calls("TSLA"), 2);
}

#[tokio::test]
async fn clear_and_evict_drop_entries() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond("AAPL", 100.0);
    fetcher.respond("MSFT", 200.0);
    let cache = QuoteCache::new(CacheConfig::default(), Arc::clone(&fetcher));
    let aapl = symbol("AAPL");
    let msft = symbol("MSFT");

    cache.resolve(&aapl).await.expect("aapl");
    cache.resolve(&msft).await.expect("msft");

    assert!(cache.evict(&aapl));
    assert!(!cache.evict(&aapl));
    assert_eq!(cache.clear(), 1);
    assert_eq!(
        cache.symbol_info(&msft),
        Err(CacheError::not_cached(msft.clone()))
    );

    cache.resolve(&msft).await.expect("msft again");
    assert_eq!(fetcher.calls("MSFT"), 2);
    // Explicit removal is not an idle eviction.
    assert_eq!(cache.stats().evictions, 0);
}

#[tokio::test]
async fn resolve_many_collapses_duplicates_and_isolates_failures() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond("AAPL", 100.0);
    fetcher.fail("BAD", FetchError::decode("unexpected body"));
    let cache = QuoteCache::new(CacheConfig::default(), Arc::clone(&fetcher));

    let results = cache
        .resolve_many([symbol("AAPL"), symbol("aapl"), symbol("BAD")])
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(
        results[&symbol("AAPL")].as_ref().expect("aapl ok").price,
        100.0
    );
    assert!(results[&symbol("BAD")].is_err());
    assert_eq!(fetcher.calls("AAPL"), 1);
    assert_eq!(fetcher.calls("BAD"), 1);
}

#[tokio::test]
async fn disabled_cache_passes_through() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond("AAPL", 100.0);
    let cache = QuoteCache::new(CacheConfig::disabled(), Arc::clone(&fetcher));
    let aapl = symbol("AAPL");

    cache.resolve(&aapl).await.expect("first");
    cache.resolve(&aapl).await.expect("second");

    assert_eq!(fetcher.calls("AAPL"), 2);
    assert!(cache.is_empty());
    assert_eq!(
        cache.symbol_info(&aapl),
        Err(CacheError::not_cached(aapl.clone()))
    );

    let stats = cache.stats();
    assert!(!stats.enabled);
    assert_eq!(stats.total_requests, 0);

    let report = cache.refresh_now().await;
    assert_eq!(report.checked, 0);
    assert!(RefreshScheduler::new(cache).spawn().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_misses_share_one_fetch_across_threads() {
    for _ in 0..20 {
        let fetcher = ScriptedFetcher::new();
        fetcher.respond("AAPL", 190.0);
        let gate = fetcher.hold();
        let cache = QuoteCache::new(CacheConfig::default(), Arc::clone(&fetcher));

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.resolve(&symbol("aapl")).await })
            })
            .collect();

        eventually(|| cache.stats().total_requests == 64).await;
        assert_eq!(cache.in_flight(), 1);
        assert_eq!(fetcher.calls("AAPL"), 1);
        gate.add_permits(1);

        for task in tasks {
            let quote = task.await.expect("lookup task").expect("quote");
            assert_eq!(quote.price, 190.0);
        }
        assert_eq!(fetcher.calls("AAPL"), 1);
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(cache.stats().cache_misses, 64);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_failure_leaves_no_entry_and_next_call_retries() {
    let fetcher = ScriptedFetcher::new();
    fetcher.fail("NVDA", FetchError::RateLimited);
    let gate = fetcher.hold();
    let cache = QuoteCache::new(CacheConfig::default(), Arc::clone(&fetcher));

    let tasks: Vec<_> = (0..64)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.resolve(&symbol("NVDA")).await })
        })
        .collect();

    eventually(|| cache.stats().total_requests == 64).await;
    gate.add_permits(1);

    for task in tasks {
        let err = task.await.expect("lookup task").expect_err("shared failure");
        assert_eq!(err, CacheError::Fetch(FetchError::RateLimited));
    }
    assert_eq!(fetcher.calls("NVDA"), 1);
    assert_eq!(cache.in_flight(), 0);
    assert!(cache.is_empty());

    gate.add_permits(1);
    fetcher.respond("NVDA", 120.0);
    let quote = cache.resolve(&symbol("NVDA")).await.expect("retry succeeds");
    assert_eq!(quote.price, 120.0);
    assert_eq!(fetcher.calls("NVDA"), 2);
}
