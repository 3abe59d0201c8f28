//! Quote cache
//!
//! An in-memory, lazily populated cache between request handlers and the
//! market-data provider:
//!
//! - **Entry store**: symbol → entry map, guarded by the single cache mutex
//! - **Fetch coordination**: at most one upstream fetch per symbol at a time
//! - **Refresh scheduler**: periodic re-fetch of cached symbols plus TTL eviction
//! - **Stats**: request/hit/miss counters and the derived hit rate
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `quotecache.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_days = 7
//! refresh_interval_minutes = 30
//! # ... see config.rs for all options
//! ```

mod clock;
mod config;
mod entry;
mod error;
mod fetch;
mod inflight;
mod lock;
mod refresh;
mod service;
mod stats;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use entry::{CacheEntry, EntryError, SymbolInfo};
pub use error::CacheError;
pub use fetch::{FetchError, QuoteFetcher};
pub use refresh::{RefreshFailure, RefreshHandle, RefreshReport, RefreshScheduler};
pub use service::QuoteCache;
pub use stats::CacheStats;
pub use store::EntryStore;
