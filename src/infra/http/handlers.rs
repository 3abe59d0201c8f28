use std::collections::HashSet;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::cache::{CacheError, CacheStats, RefreshReport};
use crate::domain::{Quote, Symbol};

use super::error::ApiError;
use super::models::*;
use super::state::HttpState;

pub const MAX_BATCH_SYMBOLS: usize = 50;

#[derive(Debug, Deserialize)]
pub struct QuotesQuery {
    pub symbols: Option<String>,
}

pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
        authentication: "Required - Use X-API-Key header",
    })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: OffsetDateTime::now_utc(),
    })
}

pub async fn get_quote(
    State(state): State<HttpState>,
    Path(raw): Path<String>,
) -> Result<Json<Quote>, ApiError> {
    let symbol = parse_symbol(&raw)?;
    let quote = state.cache.resolve(&symbol).await?;
    Ok(Json(quote))
}

pub async fn get_quotes(
    State(state): State<HttpState>,
    Query(query): Query<QuotesQuery>,
) -> Result<Json<QuotesResponse>, ApiError> {
    let raw = query.symbols.unwrap_or_default();
    let requested: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();

    if requested.is_empty() {
        return Err(ApiError::bad_request(
            "No symbols provided",
            Some("Pass ?symbols=AAPL,MSFT".to_string()),
        ));
    }
    if requested.len() > MAX_BATCH_SYMBOLS {
        return Err(ApiError::bad_request(
            "Too many symbols",
            Some(format!("Maximum {MAX_BATCH_SYMBOLS} symbols allowed")),
        ));
    }

    let parsed: Vec<(&str, Result<Symbol, CacheError>)> = requested
        .iter()
        .map(|raw| (*raw, Symbol::parse(raw).map_err(CacheError::from)))
        .collect();
    let mut resolved = state
        .cache
        .resolve_many(parsed.iter().filter_map(|(_, parsed)| parsed.clone().ok()))
        .await;

    let mut seen = HashSet::new();
    let mut quotes = Vec::with_capacity(parsed.len());
    for (raw, parsed) in parsed {
        let outcome = match parsed {
            Ok(symbol) => {
                if !seen.insert(symbol.clone()) {
                    continue;
                }
                match resolved.remove(&symbol) {
                    Some(Ok(quote)) => QuoteOutcome::Quote(quote),
                    Some(Err(err)) => QuoteOutcome::Failed {
                        symbol: symbol.to_string(),
                        error: err.to_string(),
                    },
                    None => continue,
                }
            }
            Err(err) => QuoteOutcome::Failed {
                symbol: raw.to_string(),
                error: err.to_string(),
            },
        };
        quotes.push(outcome);
    }

    let count = quotes.len();
    Ok(Json(QuotesResponse { quotes, count }))
}

pub async fn cache_stats(State(state): State<HttpState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

pub async fn symbol_info(
    State(state): State<HttpState>,
    Path(raw): Path<String>,
) -> Result<Response, ApiError> {
    let symbol = parse_symbol(&raw)?;
    match state.cache.symbol_info(&symbol) {
        Ok(info) => Ok(Json(info).into_response()),
        Err(CacheError::NotCached { symbol }) => Ok((
            StatusCode::NOT_FOUND,
            Json(NotCachedResponse {
                symbol,
                cached: false,
            }),
        )
            .into_response()),
        Err(err) => Err(err.into()),
    }
}

pub async fn refresh_cache(State(state): State<HttpState>) -> Json<RefreshReport> {
    Json(state.cache.refresh_now().await)
}

pub async fn evict_symbol(
    State(state): State<HttpState>,
    Path(raw): Path<String>,
) -> Result<Json<EvictResponse>, ApiError> {
    let symbol = parse_symbol(&raw)?;
    let evicted = state.cache.evict(&symbol);
    Ok(Json(EvictResponse { symbol, evicted }))
}

pub async fn clear_cache(State(state): State<HttpState>) -> Json<ClearResponse> {
    Json(ClearResponse {
        cleared: state.cache.clear(),
    })
}

fn parse_symbol(raw: &str) -> Result<Symbol, ApiError> {
    Symbol::parse(raw).map_err(|err| CacheError::from(err).into())
}
