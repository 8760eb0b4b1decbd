//! recs4m-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from flags and `RECS_*` environment variables.
//! 2. Initialise structured tracing (JSON or human-readable).
//! 3. Open the SQLite database and run pending migrations.
//! 4. Record `Launched` in the activity log and start the scheduler.
//! 5. Serve the management API until SIGINT/SIGTERM, then stop the scheduler.

mod config;
mod error;
mod middleware;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use recs4m_core::store::SqliteStore;
use recs4m_core::{
    ActivityLog, CaptureContext, CaptureSettings, CaptureTracker, Clock, HttpAudioSource, LogEntry, Scheduler,
    SchedulerSettings, ScriptPublisher, SystemClock,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::parse();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let level = cfg.effective_log_level();
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!("WARN: RECS_LOG='{level}' is not a valid tracing filter ({e}); falling back to 'info'");
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "recs4m-server starting");

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = Arc::new(SqliteStore::connect(&cfg.database_url).await?);
    info!(database_url = %cfg.database_url, "database ready");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(cfg.utc_offset));
    store.append_log(LogEntry::new(clock.now(), "Launched")).await?;

    // ── 4. Scheduler ───────────────────────────────────────────────────────────
    tokio::fs::create_dir_all(&cfg.capture_dir).await?;
    let capture = CaptureContext {
        source: Arc::new(HttpAudioSource::new(cfg.stream_url.clone())?),
        publisher: Arc::new(ScriptPublisher::new(cfg.upload_script.clone())),
        log: Arc::clone(&store),
        clock: Arc::clone(&clock),
        settings: CaptureSettings {
            read_timeout: cfg.read_timeout(),
            artifact_dir: cfg.capture_dir.clone(),
            ..CaptureSettings::default()
        },
    };
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&store),
        Arc::new(CaptureTracker::new()),
        capture,
        SchedulerSettings::default(),
    ));
    let scheduler_handle = scheduler.start();
    info!(
        stream_url = %cfg.stream_url,
        upload_script = %cfg.upload_script.display(),
        capture_dir = %cfg.capture_dir.display(),
        "scheduler running"
    );

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let state = Arc::new(AppState { config: Arc::new(cfg.clone()), store, clock });
    let app = routes::build(state);
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    scheduler_handle.stop().await;
    info!("recs4m-server stopped");
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
