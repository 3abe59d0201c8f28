use thiserror::Error;

use crate::domain::{Symbol, SymbolError};

use super::fetch::FetchError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("symbol `{symbol}` is not cached")]
    NotCached { symbol: Symbol },
    #[error("invalid symbol: {0}")]
    InvalidSymbol(#[from] SymbolError),
}

impl CacheError {
    pub fn not_cached(symbol: Symbol) -> Self {
        Self::NotCached { symbol }
    }
}
