use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::{Quote, Symbol};

use super::fetch::FetchError;

/// The most recent upstream failure recorded against an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryError {
    pub error: FetchError,
    pub failed_at: OffsetDateTime,
}

/// One cached symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub symbol: Symbol,
    /// Absent only for an entry that has never fetched successfully.
    pub quote: Option<Quote>,
    /// Time of the most recent successful fetch.
    pub fetched_at: Option<OffsetDateTime>,
    /// Time of the most recent client read; drives TTL eviction.
    pub last_accessed_at: OffsetDateTime,
    pub error: Option<EntryError>,
}

impl CacheEntry {
    pub(crate) fn fetched(symbol: Symbol, quote: Quote, now: OffsetDateTime) -> Self {
        Self {
            symbol,
            quote: Some(quote),
            fetched_at: Some(now),
            last_accessed_at: now,
            error: None,
        }
    }

    pub(crate) fn failed(symbol: Symbol, error: FetchError, now: OffsetDateTime) -> Self {
        Self {
            symbol,
            quote: None,
            fetched_at: None,
            last_accessed_at: now,
            error: Some(EntryError {
                error,
                failed_at: now,
            }),
        }
    }

    /// A live entry can be served without contacting the provider, even if
    /// its last background refresh failed.
    pub fn is_live(&self) -> bool {
        self.quote.is_some()
    }

    /// True once the entry has gone unread for longer than `ttl`.
    pub fn is_idle(&self, now: OffsetDateTime, ttl: Duration) -> bool {
        now - self.last_accessed_at > ttl
    }

    /// The recorded failure to replay while still inside the backoff window.
    pub fn backoff_error(&self, now: OffsetDateTime, backoff: Duration) -> Option<FetchError> {
        if self.is_live() || backoff.is_zero() {
            return None;
        }
        self.error
            .as_ref()
            .filter(|failure| now - failure.failed_at < backoff)
            .map(|failure| failure.error.clone())
    }
}

/// Administrative view of a cached symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolInfo {
    pub symbol: Symbol,
    pub cached: bool,
    pub price: Option<f64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_requested: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_refreshed: Option<OffsetDateTime>,
    pub last_error: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_error_at: Option<OffsetDateTime>,
    pub data: Option<Quote>,
}

impl From<&CacheEntry> for SymbolInfo {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            symbol: entry.symbol.clone(),
            cached: true,
            price: entry.quote.as_ref().map(|quote| quote.price),
            last_requested: Some(entry.last_accessed_at),
            last_refreshed: entry.fetched_at,
            last_error: entry.error.as_ref().map(|failure| failure.error.message()),
            last_error_at: entry.error.as_ref().map(|failure| failure.failed_at),
            data: entry.quote.clone(),
        }
    }
}
