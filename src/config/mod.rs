//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use axum::http::HeaderValue;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{CliArgs, Command, ProviderOverrides, QuoteArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "quotecache";
const ENV_PREFIX: &str = "QUOTECACHE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CORS_ORIGINS: &str = "*";
const DEFAULT_CACHE_TTL_DAYS: u64 = 7;
const DEFAULT_REFRESH_INTERVAL_MINUTES: u64 = 30;
const DEFAULT_REFRESH_CONCURRENCY: u64 = 4;
const DEFAULT_PROVIDER_BASE_URL: &str = "https://query1.finance.yahoo.com/";
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PROVIDER_USER_AGENT: &str = "Mozilla/5.0 (compatible; quotecache)";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub provider: ProviderSettings,
    pub auth: AuthSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub cors_origins: CorsOrigins,
}

/// Origins allowed to call the API from a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<HeaderValue>),
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_days: NonZeroU32,
    pub refresh_interval_minutes: NonZeroU32,
    pub refresh_concurrency: NonZeroUsize,
    /// Zero disables failure replay.
    pub failure_backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: Url,
    pub timeout: Duration,
    pub user_agent: String,
}

#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    pub api_keys: Vec<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Quote(args)) => raw.apply_provider_overrides(&args.provider),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    provider: RawProviderSettings,
    auth: RawAuthSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(origins) = overrides.server_cors_origins.as_ref() {
            self.server.cors_origins = Some(origins.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(days) = overrides.cache_ttl_days {
            self.cache.ttl_days = Some(days);
        }
        if let Some(minutes) = overrides.cache_refresh_interval_minutes {
            self.cache.refresh_interval_minutes = Some(minutes);
        }
        if let Some(count) = overrides.cache_refresh_concurrency {
            self.cache.refresh_concurrency = Some(count);
        }
        if let Some(seconds) = overrides.cache_failure_backoff_seconds {
            self.cache.failure_backoff_seconds = Some(seconds);
        }
        if let Some(keys) = overrides.api_keys.as_ref() {
            self.auth.api_keys = Some(keys.clone());
        }
        self.apply_provider_overrides(&overrides.provider);
    }

    fn apply_provider_overrides(&mut self, overrides: &ProviderOverrides) {
        if let Some(url) = overrides.base_url.as_ref() {
            self.provider.base_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.timeout_seconds {
            self.provider.timeout_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            provider,
            auth,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            provider: build_provider_settings(provider)?,
            auth: build_auth_settings(auth),
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr =
        parse_socket_addr(&host, port).map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    let cors_origins = parse_cors_origins(
        server
            .cors_origins
            .as_deref()
            .unwrap_or(DEFAULT_CORS_ORIGINS),
    )?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
        cors_origins,
    })
}

fn parse_cors_origins(raw: &str) -> Result<CorsOrigins, LoadError> {
    const KEY: &str = "server.cors_origins";

    if raw.trim() == "*" {
        return Ok(CorsOrigins::Any);
    }

    let mut origins = Vec::new();
    for origin in raw.split(',').map(str::trim).filter(|origin| !origin.is_empty()) {
        let url = Url::parse(origin)
            .map_err(|err| LoadError::invalid(KEY, format!("invalid origin `{origin}`: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(LoadError::invalid(
                KEY,
                format!("origin `{origin}` must be an http(s) scheme and host"),
            ));
        }
        let value = HeaderValue::from_str(origin.trim_end_matches('/'))
            .map_err(|err| LoadError::invalid(KEY, format!("invalid origin `{origin}`: {err}")))?;
        origins.push(value);
    }

    if origins.is_empty() {
        return Err(LoadError::invalid(
            KEY,
            "must be `*` or a comma-separated list of origins",
        ));
    }
    Ok(CorsOrigins::List(origins))
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl_days = non_zero_u32(
        cache.ttl_days.unwrap_or(DEFAULT_CACHE_TTL_DAYS),
        "cache.ttl_days",
    )?;
    let refresh_interval_minutes = non_zero_u32(
        cache
            .refresh_interval_minutes
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_MINUTES),
        "cache.refresh_interval_minutes",
    )?;

    let concurrency = cache
        .refresh_concurrency
        .unwrap_or(DEFAULT_REFRESH_CONCURRENCY);
    let refresh_concurrency = usize::try_from(concurrency)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            LoadError::invalid(
                "cache.refresh_concurrency",
                "must be greater than zero and fit in usize",
            )
        })?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        ttl_days,
        refresh_interval_minutes,
        refresh_concurrency,
        failure_backoff: Duration::from_secs(cache.failure_backoff_seconds.unwrap_or(0)),
    })
}

fn build_provider_settings(provider: RawProviderSettings) -> Result<ProviderSettings, LoadError> {
    let raw_url = provider
        .base_url
        .unwrap_or_else(|| DEFAULT_PROVIDER_BASE_URL.to_string());
    let base_url = Url::parse(raw_url.trim())
        .map_err(|err| LoadError::invalid("provider.base_url", format!("invalid URL: {err}")))?;
    if base_url.cannot_be_a_base() {
        return Err(LoadError::invalid(
            "provider.base_url",
            "URL must be able to carry a path",
        ));
    }

    let timeout_secs = provider
        .timeout_seconds
        .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "provider.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let user_agent = provider
        .user_agent
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_PROVIDER_USER_AGENT.to_string());

    Ok(ProviderSettings {
        base_url,
        timeout: Duration::from_secs(timeout_secs),
        user_agent,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> AuthSettings {
    let api_keys = auth
        .api_keys
        .as_deref()
        .map(split_api_keys)
        .unwrap_or_default();
    AuthSettings { api_keys }
}

fn split_api_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    cors_origins: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    ttl_days: Option<u64>,
    refresh_interval_minutes: Option<u64>,
    refresh_concurrency: Option<u64>,
    failure_backoff_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawProviderSettings {
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
    user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    api_keys: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
