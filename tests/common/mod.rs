#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quotecache::cache::{FetchError, QuoteFetcher};
use quotecache::domain::{Quote, Symbol};
use time::OffsetDateTime;
use tokio::sync::Semaphore;

/// Fetcher with per-symbol canned answers, call counting and an optional gate.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<HashMap<String, Result<f64, FetchError>>>,
    calls: Mutex<HashMap<String, usize>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, symbol: &str, price: f64) {
        self.responses
            .lock()
            .expect("responses lock")
            .insert(symbol.to_string(), Ok(price));
    }

    pub fn fail(&self, symbol: &str, error: FetchError) {
        self.responses
            .lock()
            .expect("responses lock")
            .insert(symbol.to_string(), Err(error));
    }

    pub fn calls(&self, symbol: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .get(symbol)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("calls lock").values().sum()
    }

    /// Make every later fetch wait for a permit on the returned semaphore.
    pub fn hold(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().expect("gate lock") = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl QuoteFetcher for ScriptedFetcher {
    async fn fetch(&self, symbol: &Symbol) -> Result<Quote, FetchError> {
        *self
            .calls
            .lock()
            .expect("calls lock")
            .entry(symbol.to_string())
            .or_default() += 1;

        let gate = self.gate.lock().expect("gate lock").clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate stays open").forget();
        }

        let response = self
            .responses
            .lock()
            .expect("responses lock")
            .get(symbol.as_str())
            .cloned();
        match response {
            Some(Ok(price)) => Ok(Quote::new(symbol.clone(), price, OffsetDateTime::UNIX_EPOCH)),
            Some(Err(error)) => Err(error),
            None => Err(FetchError::not_found(symbol.clone())),
        }
    }
}

pub fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

/// Yield until `condition` holds, giving spawned fetch tasks a chance to run.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

/// Poll `condition` on a real clock; for runtimes where other workers make the progress.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..5_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
