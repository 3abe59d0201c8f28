use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the cache emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "quotecache_cache_request_total",
            Unit::Count,
            "Total number of client-facing quote lookups."
        );
        describe_counter!(
            "quotecache_cache_hit_total",
            Unit::Count,
            "Total number of lookups served from a cached quote."
        );
        describe_counter!(
            "quotecache_cache_miss_total",
            Unit::Count,
            "Total number of lookups that required an upstream fetch."
        );
        describe_counter!(
            "quotecache_cache_evict_total",
            Unit::Count,
            "Total number of symbols evicted after exceeding the idle TTL."
        );
        describe_counter!(
            "quotecache_cache_refresh_total",
            Unit::Count,
            "Total number of successful background refreshes."
        );
        describe_counter!(
            "quotecache_cache_refresh_error_total",
            Unit::Count,
            "Total number of failed background refreshes."
        );
        describe_histogram!(
            "quotecache_refresh_pass_ms",
            Unit::Milliseconds,
            "Refresh pass latency in milliseconds."
        );
        describe_histogram!(
            "quotecache_upstream_fetch_ms",
            Unit::Milliseconds,
            "Upstream quote fetch latency in milliseconds."
        );
    });
}
