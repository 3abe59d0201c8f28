use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::symbol::Symbol;

/// A point-in-time market quote as produced by the data provider.
///
/// The cache stores and returns quotes without looking inside them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: f64,
    pub currency: Option<String>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub volume: Option<u64>,
    /// Not reported by the chart endpoint; `None` from the Yahoo provider.
    pub market_cap: Option<f64>,
    pub previous_close: Option<f64>,
    pub open: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Quote {
    /// A quote with only the required fields populated.
    pub fn new(symbol: Symbol, price: f64, timestamp: OffsetDateTime) -> Self {
        Self {
            symbol,
            price,
            currency: None,
            change: None,
            change_percent: None,
            volume: None,
            market_cap: None,
            previous_close: None,
            open: None,
            day_high: None,
            day_low: None,
            timestamp,
        }
    }
}
