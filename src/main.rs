//! Application entry point for the `grillwatch` poller.
//!
//! Startup order: `.env` and tracing, then configuration, the remote-store
//! fetcher and metric history, the poll scheduler, and finally the Axum
//! server for the presentation API. When the server exits the scheduler is
//! cancelled and its loop awaited.
//!
//! # Environment
//! - `GRILLWATCH_DB_URL` (**required**) – base URL of the remote store
//! - `GRILLWATCH_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `GRILLWATCH_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the full list of poller settings.
use std::{env, sync::Arc};

use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use grillwatch::routes::{self, AppState, LatestSnapshot};
use grillwatch::{config, DeviceSnapshotBuilder, FirebaseFetcher, FleetAggregator, PollScheduler, TimeSeriesStore};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let fetcher = FirebaseFetcher::new(&cfg.db_url, &cfg.table_path, cfg.auth_token.clone(), cfg.fetch_timeout)
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client for '{}': {}", cfg.db_url, e))?;
    tracing::info!("Polling device table at {}", fetcher.url());

    let store = TimeSeriesStore::new(cfg.history_capacity)?;
    let latest = LatestSnapshot::new();
    let aggregator = FleetAggregator::new(DeviceSnapshotBuilder::new(cfg.field_paths.clone(), cfg.thresholds));

    let sink = latest.clone();
    let scheduler = PollScheduler::builder(Arc::new(fetcher), aggregator, store.clone())
        .watch(cfg.watch_devices.clone())
        .build(move |snapshot| {
            if !sink.update(snapshot) {
                tracing::warn!("Store returned no device table; keeping previous snapshot");
            }
        });
    let poll_loop = scheduler.start(cfg.poll_interval)?;

    let app: Router = routes::router(AppState { latest, store });

    tracing::info!("Listening on {}", cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr).await?;
    let served = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;

    scheduler.cancel();
    poll_loop.await?;
    served?;

    Ok(())
}

/// Resolves on Ctrl+C. If the handler can not be installed the server
/// keeps running until killed.
async fn shutdown_signal() {
    // ---
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Unable to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

// ---

/// Install the global `tracing` subscriber. Call once, before anything logs.
///
/// Output is compact, with target, file and line. Knobs:
/// - `RUST_LOG` wins outright when set; otherwise `GRILLWATCH_LOG_LEVEL`
///   picks the level (`info` if unset or unrecognised), with `hyper` and
///   `reqwest` held at `warn`
/// - `GRILLWATCH_SPAN_EVENTS`: `full` or `enter_exit`; span CLOSE only otherwise
/// - `FORCE_COLOR`: see [`color_enabled`]
fn init_tracing() {
    // ---
    let span_events = match env::var("GRILLWATCH_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let env_filter = match env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => {
            let level = env::var("GRILLWATCH_LOG_LEVEL")
                .ok()
                .filter(|l| LOG_LEVELS.contains(&l.as_str()))
                .unwrap_or_else(|| "info".to_string());
            EnvFilter::new(format!("{level},hyper=warn,reqwest=warn"))
        }
    };

    tracing_subscriber::fmt()
        .compact()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(color_enabled())
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .init();
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// `FORCE_COLOR=1|true|yes` forces ANSI colour on, `0|false|no` forces it
/// off; anything else follows whether stdout is a terminal.
fn color_enabled() -> bool {
    // ---
    match env::var("FORCE_COLOR").as_deref() {
        Ok("1" | "true" | "yes") => true,
        Ok("0" | "false" | "no") => false,
        _ => std::io::stdout().is_terminal(),
    }
}
