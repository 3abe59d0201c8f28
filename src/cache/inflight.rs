//! In-flight upstream fetches, one per symbol.
//!
//! A miss either registers a new fetch or joins the one already running for
//! that symbol. The fetch itself runs on a spawned task, so it completes (and
//! updates the store) even if every waiting caller goes away.

use std::collections::HashMap;

use futures::future::{BoxFuture, Shared};

use crate::domain::{Quote, Symbol};

use super::fetch::FetchError;

pub(crate) type SharedFetch = Shared<BoxFuture<'static, Result<Quote, FetchError>>>;

struct PendingFetch {
    id: u64,
    outcome: SharedFetch,
}

#[derive(Default)]
pub(crate) struct InFlight {
    pending: HashMap<Symbol, PendingFetch>,
    next_id: u64,
}

impl InFlight {
    /// The outcome of the fetch currently running for `symbol`, if any.
    pub(crate) fn join(&self, symbol: &Symbol) -> Option<SharedFetch> {
        self.pending.get(symbol).map(|pending| pending.outcome.clone())
    }

    pub(crate) fn contains(&self, symbol: &Symbol) -> bool {
        self.pending.contains_key(symbol)
    }

    /// Reserve an id for a fetch about to be registered.
    pub(crate) fn next_id(&mut self) -> u64 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }

    pub(crate) fn register(&mut self, symbol: Symbol, id: u64, outcome: SharedFetch) {
        self.pending.insert(symbol, PendingFetch { id, outcome });
    }

    /// Release the marker for `symbol` if it still belongs to fetch `id`.
    pub(crate) fn complete(&mut self, symbol: &Symbol, id: u64) -> bool {
        match self.pending.get(symbol) {
            Some(pending) if pending.id == id => {
                self.pending.remove(symbol);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}
