use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::{Quote, Symbol};

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub authentication: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// One element of a batch response: a quote or the reason it is missing.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum QuoteOutcome {
    Quote(Quote),
    Failed { symbol: String, error: String },
}

#[derive(Debug, Serialize)]
pub struct QuotesResponse {
    pub quotes: Vec<QuoteOutcome>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct NotCachedResponse {
    pub symbol: Symbol,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct EvictResponse {
    pub symbol: Symbol,
    pub evicted: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: usize,
}
