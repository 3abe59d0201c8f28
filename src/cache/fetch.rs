//! The upstream seam: anything that can produce a fresh [`Quote`] for a symbol.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Quote, Symbol};

/// Failure reported by a [`QuoteFetcher`].
///
/// The cache treats every variant opaquely; the distinction only matters to
/// the HTTP layer when choosing a status code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("no quote data found for `{symbol}`")]
    NotFound { symbol: Symbol },
    #[error("upstream provider rate limited the request")]
    RateLimited,
    #[error("upstream provider failed: {message}")]
    Upstream { message: String },
    #[error("failed to decode upstream response: {message}")]
    Decode { message: String },
    #[error("upstream fetch aborted: {message}")]
    Aborted { message: String },
}

impl FetchError {
    pub fn not_found(symbol: Symbol) -> Self {
        Self::NotFound { symbol }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted {
            message: message.into(),
        }
    }

    /// Human-readable reason, as retained in an entry's error state.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Retrieves current quote data for a symbol from an external provider.
#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    async fn fetch(&self, symbol: &Symbol) -> Result<Quote, FetchError>;
}

#[async_trait]
impl<F> QuoteFetcher for Arc<F>
where
    F: QuoteFetcher + ?Sized,
{
    async fn fetch(&self, symbol: &Symbol) -> Result<Quote, FetchError> {
        (**self).fetch(symbol).await
    }
}
