//! Yahoo Finance quote provider.
//!
//! Reads the public chart endpoint, which carries the current market snapshot
//! in `chart.result[0].meta` and does not require a session crumb.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::debug;
use url::Url;

use crate::cache::{FetchError, QuoteFetcher};
use crate::config::ProviderSettings;
use crate::domain::{Quote, Symbol};

use super::error::InfraError;

pub struct YahooQuoteFetcher {
    client: reqwest::Client,
    base_url: Url,
}

impl YahooQuoteFetcher {
    pub fn new(settings: &ProviderSettings) -> Result<Self, InfraError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| InfraError::provider(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
        })
    }

    fn chart_url(&self, symbol: &Symbol) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::upstream("provider base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol.as_str()]);
        url.query_pairs_mut()
            .append_pair("interval", "1d")
            .append_pair("range", "1d");
        Ok(url)
    }
}

#[async_trait]
impl QuoteFetcher for YahooQuoteFetcher {
    async fn fetch(&self, symbol: &Symbol) -> Result<Quote, FetchError> {
        let url = self.chart_url(symbol)?;
        debug!(symbol = %symbol, url = %url, "Fetching quote from provider");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| FetchError::upstream(err.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(FetchError::not_found(symbol.clone())),
            StatusCode::TOO_MANY_REQUESTS => return Err(FetchError::RateLimited),
            status if !status.is_success() => {
                return Err(FetchError::upstream(format!("provider returned HTTP {status}")));
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|err| FetchError::upstream(err.to_string()))?;
        parse_chart(symbol, &body)
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    currency: Option<String>,
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    regular_market_volume: Option<u64>,
    regular_market_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<IndicatorQuote>,
}

#[derive(Debug, Deserialize)]
struct IndicatorQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
}

/// Map a chart response body onto a [`Quote`].
pub(crate) fn parse_chart(symbol: &Symbol, body: &str) -> Result<Quote, FetchError> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).map_err(|err| FetchError::decode(err.to_string()))?;

    if let Some(error) = envelope.chart.error {
        if error.code.as_deref() == Some("Not Found") {
            return Err(FetchError::not_found(symbol.clone()));
        }
        let detail = error
            .description
            .or(error.code)
            .unwrap_or_else(|| "unknown provider error".to_string());
        return Err(FetchError::upstream(detail));
    }

    let result = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| FetchError::not_found(symbol.clone()))?;
    let meta = result.meta;

    let price = meta
        .regular_market_price
        .ok_or_else(|| FetchError::not_found(symbol.clone()))?;
    let previous_close = meta.previous_close.or(meta.chart_previous_close);
    let change = previous_close.map(|close| price - close);
    let change_percent = previous_close
        .filter(|close| *close != 0.0)
        .map(|close| (price - close) / close * 100.0);
    let open = result
        .indicators
        .and_then(|indicators| indicators.quote.into_iter().next())
        .and_then(|quote| quote.open.into_iter().flatten().next());
    let timestamp = meta
        .regular_market_time
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .unwrap_or_else(OffsetDateTime::now_utc);

    Ok(Quote {
        symbol: symbol.clone(),
        price,
        currency: meta.currency,
        change,
        change_percent,
        volume: meta.regular_market_volume,
        market_cap: None,
        previous_close,
        open,
        day_high: meta.regular_market_day_high,
        day_low: meta.regular_market_day_low,
        timestamp,
    })
}
