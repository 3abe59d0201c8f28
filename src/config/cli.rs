use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the quotecache binary.
#[derive(Debug, Parser)]
#[command(name = "quotecache", version, about = "Caching stock quote service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "QUOTECACHE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service and the background refresh loop.
    Serve(Box<ServeArgs>),
    /// Fetch quotes once from the provider and print them as JSON.
    Quote(QuoteArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct QuoteArgs {
    #[command(flatten)]
    pub provider: ProviderOverrides,

    /// Symbols to look up.
    #[arg(value_name = "SYMBOL", required = true)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ProviderOverrides {
    /// Override the quote provider base URL.
    #[arg(long = "provider-base-url", value_name = "URL")]
    pub base_url: Option<String>,

    /// Override the provider request timeout.
    #[arg(long = "provider-timeout-seconds", value_name = "SECONDS")]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub provider: ProviderOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the allowed CORS origins (`*` or comma separated).
    #[arg(long = "server-cors-origins", value_name = "ORIGINS")]
    pub server_cors_origins: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Enable or disable the quote cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the idle TTL after which cached symbols are evicted.
    #[arg(long = "cache-ttl-days", value_name = "DAYS")]
    pub cache_ttl_days: Option<u64>,

    /// Override the background refresh period.
    #[arg(long = "cache-refresh-interval-minutes", value_name = "MINUTES")]
    pub cache_refresh_interval_minutes: Option<u64>,

    /// Override the number of concurrent fetches in a refresh pass.
    #[arg(long = "cache-refresh-concurrency", value_name = "COUNT")]
    pub cache_refresh_concurrency: Option<u64>,

    /// Override the window during which a failed first fetch is replayed.
    #[arg(long = "cache-failure-backoff-seconds", value_name = "SECONDS")]
    pub cache_failure_backoff_seconds: Option<u64>,

    /// Override the accepted API keys (comma separated).
    #[arg(long = "api-keys", value_name = "KEYS")]
    pub api_keys: Option<String>,
}
