use std::sync::Arc;

use subtle::{Choice, ConstantTimeEq};

use crate::cache::QuoteCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiAuthError {
    Missing,
    Invalid,
}

/// Static set of accepted `X-API-Key` values.
///
/// Every stored key is compared in constant time on each check.
#[derive(Debug, Default)]
pub struct ApiKeys {
    keys: Vec<String>,
}

impl ApiKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        keys.sort();
        keys.dedup();
        Self { keys }
    }

    pub fn authenticate(&self, presented: Option<&str>) -> Result<(), ApiAuthError> {
        let token = presented
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiAuthError::Missing)?;
        let matched = self
            .keys
            .iter()
            .fold(Choice::from(0), |found, key| {
                found | token.as_bytes().ct_eq(key.as_bytes())
            });
        if bool::from(matched) {
            Ok(())
        } else {
            Err(ApiAuthError::Invalid)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Clone)]
pub struct HttpState {
    pub cache: QuoteCache,
    pub api_keys: Arc<ApiKeys>,
}

impl HttpState {
    pub fn new(cache: QuoteCache, api_keys: ApiKeys) -> Self {
        Self {
            cache,
            api_keys: Arc::new(api_keys),
        }
    }
}
