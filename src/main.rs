use std::{future::IntoFuture, process};

use quotecache::{
    cache::{CacheConfig, QuoteCache, RefreshScheduler},
    config::{self, Settings},
    domain::Symbol,
    error::AppError,
    infra::{
        error::InfraError,
        http::{self, ApiKeys, HttpState, models::QuoteOutcome},
        provider::YahooQuoteFetcher,
        telemetry,
    },
};
use tokio::sync::oneshot;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Quote(args) => run_quote(settings, args).await,
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    if settings.auth.api_keys.is_empty() {
        return Err(AppError::validation(
            "auth.api_keys must list at least one key to serve HTTP",
        ));
    }

    let fetcher = YahooQuoteFetcher::new(&settings.provider)?;
    let cache = QuoteCache::new(CacheConfig::from(&settings.cache), fetcher);
    let refresh = RefreshScheduler::new(cache.clone()).spawn();

    let state = HttpState::new(cache, ApiKeys::new(settings.auth.api_keys.iter().cloned()));
    let result = serve_http(&settings, state).await;

    if let Some(handle) = refresh {
        handle.shutdown().await;
    }

    result
}

async fn serve_http(settings: &Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state, &settings.server.cors_origins);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;

    info!(addr = %settings.server.addr, "HTTP server listening");

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        })
        .into_future();

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        served = server => {
            served.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            if signalled_rx.await.is_ok() {
                tokio::time::sleep(grace).await;
            } else {
                std::future::pending::<()>().await;
            }
        } => {
            warn!(grace_secs = grace.as_secs(), "Graceful shutdown timed out; dropping connections");
        }
    }

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => {
            warn!(error = %err, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

async fn run_quote(settings: Settings, args: config::QuoteArgs) -> Result<(), AppError> {
    let fetcher = YahooQuoteFetcher::new(&settings.provider)?;
    let cache = QuoteCache::new(CacheConfig::disabled(), fetcher);

    let mut outcomes = Vec::with_capacity(args.symbols.len());
    let mut symbols = Vec::with_capacity(args.symbols.len());
    for raw in &args.symbols {
        match Symbol::parse(raw) {
            Ok(symbol) => symbols.push(symbol),
            Err(err) => outcomes.push(QuoteOutcome::Failed {
                symbol: raw.clone(),
                error: err.to_string(),
            }),
        }
    }

    for (symbol, outcome) in cache.resolve_many(symbols).await {
        outcomes.push(match outcome {
            Ok(quote) => QuoteOutcome::Quote(quote),
            Err(err) => QuoteOutcome::Failed {
                symbol: symbol.to_string(),
                error: err.to_string(),
            },
        });
    }

    let rendered = serde_json::to_string_pretty(&outcomes)
        .map_err(|err| AppError::unexpected(format!("failed to encode quotes: {err}")))?;
    println!("{rendered}");
    Ok(())
}
