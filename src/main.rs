//! GitHub Activity Dashboard — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the poller, the on-disk event cache,
//! and the summary renderer behind the routes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use github_activity_dashboard::accounts::read_accounts;
use github_activity_dashboard::api::{self, AppState};
use github_activity_dashboard::clock::SystemClock;
use github_activity_dashboard::config::AppConfig;
use github_activity_dashboard::feed::GithubFeed;
use github_activity_dashboard::metrics;
use github_activity_dashboard::poll::Poller;
use github_activity_dashboard::store::FsEventStore;
use github_activity_dashboard::summary::{Registry, SummaryBuilder};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("github_activity_dashboard=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = AppConfig::load()?;

    // An unavailable cache root is the one startup-fatal condition.
    std::fs::create_dir_all(config.data_dir.join("users"))
        .with_context(|| format!("creating cache root {}", config.data_dir.display()))?;

    let tracked = read_accounts(&config.accounts_file)
        .map(|a| a.len())
        .unwrap_or(0);
    let metrics_router = metrics::install(tracked);

    let clock = Arc::new(SystemClock);
    let store = Arc::new(FsEventStore::new(&config.data_dir));
    let feed = Arc::new(GithubFeed::new(
        &config.api_base,
        Duration::from_secs(config.request_timeout_secs),
    )?);

    let state = AppState {
        store: store.clone(),
        poller: Arc::new(Poller::new(feed, store, clock.clone())),
        builder: Arc::new(SummaryBuilder::new(Registry::with_default_rules(), clock)),
        accounts_file: config.accounts_file.clone(),
    };

    let router = api::create_router(state).merge(metrics_router);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, accounts = tracked, "listening");

    axum::serve(listener, router)
        .await
        .context("server error")?;
    Ok(())
}
