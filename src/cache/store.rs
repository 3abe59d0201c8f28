//! Entry store: the symbol → entry map.
//!
//! The store itself is a plain data structure. It is only ever reached through
//! the single mutex owned by [`super::QuoteCache`], so callers never observe a
//! partially-written entry.

use std::collections::HashMap;

use time::OffsetDateTime;

use crate::domain::{Quote, Symbol};

use super::entry::{CacheEntry, EntryError};
use super::fetch::FetchError;

#[derive(Debug, Default)]
pub struct EntryStore {
    entries: HashMap<Symbol, CacheEntry>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only lookup; never triggers a fetch.
    pub fn get(&self, symbol: &Symbol) -> Option<&CacheEntry> {
        self.entries.get(symbol)
    }

    /// Insert or overwrite the quote for `symbol`.
    ///
    /// Sets `fetched_at = now` and clears any error. A new entry starts with
    /// `last_accessed_at = now`; an existing one keeps its access time.
    pub fn put(&mut self, symbol: Symbol, quote: Quote, now: OffsetDateTime) {
        match self.entries.get_mut(&symbol) {
            Some(entry) => {
                entry.quote = Some(quote);
                entry.fetched_at = Some(now);
                entry.error = None;
            }
            None => {
                let entry = CacheEntry::fetched(symbol.clone(), quote, now);
                self.entries.insert(symbol, entry);
            }
        }
    }

    /// Record a client read. Returns false if the symbol is not cached.
    pub fn touch(&mut self, symbol: &Symbol, now: OffsetDateTime) -> bool {
        match self.entries.get_mut(symbol) {
            Some(entry) => {
                entry.last_accessed_at = now;
                true
            }
            None => false,
        }
    }

    /// Attach a fetch failure to an existing entry, leaving its quote intact.
    /// Returns false if the symbol is not cached.
    pub fn record_error(&mut self, symbol: &Symbol, error: FetchError, now: OffsetDateTime) -> bool {
        match self.entries.get_mut(symbol) {
            Some(entry) => {
                entry.error = Some(EntryError {
                    error,
                    failed_at: now,
                });
                true
            }
            None => false,
        }
    }

    /// Insert a quote-less entry that replays `error` until the backoff lapses.
    pub fn insert_failed(&mut self, symbol: Symbol, error: FetchError, now: OffsetDateTime) {
        let entry = CacheEntry::failed(symbol.clone(), error, now);
        self.entries.insert(symbol, entry);
    }

    pub fn remove(&mut self, symbol: &Symbol) -> Option<CacheEntry> {
        self.entries.remove(symbol)
    }

    /// Drop every entry, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Currently cached symbols in sorted order.
    pub fn snapshot_keys(&self) -> Vec<Symbol> {
        let mut keys: Vec<Symbol> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Sorted symbols that currently hold a quote.
    pub fn live_symbols(&self) -> Vec<Symbol> {
        let mut keys: Vec<Symbol> = self
            .entries
            .values()
            .filter(|entry| entry.is_live())
            .map(|entry| entry.symbol.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
