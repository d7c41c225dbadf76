use std::{process, sync::Arc};

use apod_relay::{
    application::{apod::ApodService, error::AppError},
    cache::{CacheConfig, ExpiringCache},
    config::{self, FetchArgs},
    infra::{
        error::InfraError,
        http::{self, HttpState},
        nasa::NasaClient,
        telemetry,
    },
};
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

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
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
        config::Command::Fetch(args) => run_fetch(settings, args).await,
    }
}

fn build_service(settings: &config::Settings) -> Result<ApodService, AppError> {
    let cache = Arc::new(ExpiringCache::new(&CacheConfig::from(&settings.cache)));
    let client = NasaClient::new(&settings.upstream)?;

    let service = ApodService::new(Arc::new(client), cache)
        .with_recent_concurrency(settings.recent.concurrency);
    Ok(service)
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let service = build_service(&settings)?;
    let state = HttpState {
        apod: Arc::new(service),
    };
    let router = http::build_router(state, &settings.server.base_path, &settings.cors);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target: "apod_relay::serve",
        addr = %settings.server.addr,
        base_path = %settings.server.base_path,
        upstream = ?settings.upstream,
        cache_ttl_secs = settings.cache.ttl.as_secs(),
        cache_max_entries = settings.cache.max_entries,
        "Listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target: "apod_relay::serve", "Server stopped");
    Ok(())
}

async fn run_fetch(settings: config::Settings, args: FetchArgs) -> Result<(), AppError> {
    let service = build_service(&settings)?;

    let record = match args.date.as_deref() {
        Some(date) => service.by_date(Some(date)).await?,
        None => service.today().await?,
    };

    let rendered = serde_json::to_string_pretty(&record)
        .map_err(|err| AppError::unexpected(format!("failed to render record: {err}")))?;
    println!("{rendered}");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target: "apod_relay::serve", "Shutdown signal received");
}
