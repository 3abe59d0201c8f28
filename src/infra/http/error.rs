use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::cache::{CacheError, FetchError};

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const INVALID_SYMBOL: &str = "invalid_symbol";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const NOT_CACHED: &str = "not_cached";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const UPSTREAM: &str = "upstream_error";
}

/// Diagnostic attached to error responses so the response logger can report it.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "API key required",
            Some("Send the key in the X-API-Key header".to_string()),
        )
    }

    pub fn forbidden() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            codes::FORBIDDEN,
            "Invalid API key",
            None,
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::InvalidSymbol(err) => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_SYMBOL,
                "Invalid symbol",
                Some(err.to_string()),
            ),
            CacheError::NotCached { symbol } => Self::new(
                StatusCode::NOT_FOUND,
                codes::NOT_CACHED,
                "Symbol is not cached",
                Some(symbol.to_string()),
            ),
            CacheError::Fetch(err) => err.into(),
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound { symbol } => Self::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "No data found for symbol",
                Some(symbol.to_string()),
            ),
            FetchError::RateLimited => Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                codes::RATE_LIMITED,
                "Quote provider rate limit reached",
                Some("Retry later".to_string()),
            ),
            other => Self::new(
                StatusCode::BAD_GATEWAY,
                codes::UPSTREAM,
                "Quote provider request failed",
                Some(other.message()),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = format!("{}: {}", self.code, self.hint.as_deref().unwrap_or(self.message));
        let rate_limited = self.status == StatusCode::TOO_MANY_REQUESTS;
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };

        let mut response = (self.status, Json(body)).into_response();
        if rate_limited {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("60"));
        }
        ErrorReport::from_message("infra::http", self.status, detail).attach(&mut response);
        response
    }
}
