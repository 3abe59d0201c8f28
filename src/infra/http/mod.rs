//! HTTP surface: quote lookups and cache administration over axum.

pub mod error;
pub mod handlers;
mod middleware;
pub mod models;
mod state;

pub use middleware::{API_KEY_HEADER, REQUEST_ID_HEADER};
pub use state::{ApiAuthError, ApiKeys, HttpState};

use axum::{
    Router,
    http::Method,
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::CorsOrigins;

/// Build the application router. `/` and `/health` are open; everything else
/// requires a valid `X-API-Key`.
pub fn build_router(state: HttpState, cors_origins: &CorsOrigins) -> Router {
    let protected = Router::new()
        .route("/quote/{symbol}", get(handlers::get_quote))
        .route("/quotes", get(handlers::get_quotes))
        .route("/cache/stats", get(handlers::cache_stats))
        .route("/cache/refresh", post(handlers::refresh_cache))
        .route(
            "/cache/symbols/{symbol}",
            get(handlers::symbol_info).delete(handlers::evict_symbol),
        )
        .route("/cache", delete(handlers::clear_cache))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::api_key_auth,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(protected)
        .with_state(state)
        .layer(cors_layer(cors_origins))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);
    match origins {
        CorsOrigins::Any => layer.allow_origin(Any),
        CorsOrigins::List(list) => layer.allow_origin(AllowOrigin::list(list.iter().cloned())),
    }
}
