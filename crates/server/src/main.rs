// crates/server/src/main.rs
//! Clipper server binary.
//!
//! Opens the job store, fails jobs a previous process left unfinished, then
//! serves the API until Ctrl-C. Shutdown cancels running jobs before the
//! listener drains so open status streams see their terminal event.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use clipper_core::{CleanupSweeper, Config, InMemoryStatusStore, StatusStore, YtDlpWorker};
use clipper_db::Database;
use clipper_server::{create_app, metrics::init_metrics, AppState};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Default port for the server.
const DEFAULT_PORT: u16 = 8080;

/// How long running jobs get to record their final status on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

const MEMORY_DB: &str = ":memory:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Asynchronous media clip job service.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Port to listen on (falls back to PORT, then 8080)
    #[arg(long, env = "CLIPPER_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "CLIPPER_HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    host: IpAddr,

    /// SQLite database path, or `:memory:` for a process-local store
    #[arg(long, env = "CLIPPER_DB")]
    db: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    fn port(&self) -> u16 {
        self.port
            .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
            .unwrap_or(DEFAULT_PORT)
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn,clipper_server=info,clipper_core=info,clipper_db=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn open_store(db: Option<&PathBuf>) -> Result<Arc<dyn StatusStore>> {
    if db.is_some_and(|p| p.as_os_str() == MEMORY_DB) {
        tracing::warn!("Using in-memory job store; job history is lost on exit");
        let store: Arc<dyn StatusStore> = Arc::new(InMemoryStatusStore::new());
        return Ok(store);
    }

    let database = match db {
        Some(path) => Database::new(path).await,
        None => Database::open_default().await,
    }
    .context("failed to open job database")?;

    let interrupted = database
        .fail_interrupted_jobs()
        .await
        .context("failed to reconcile unfinished jobs")?;
    if interrupted > 0 {
        tracing::warn!(count = interrupted, "Marked jobs from a previous run as failed");
    }

    let store: Arc<dyn StatusStore> = Arc::new(database);
    Ok(store)
}

/// Resolves on Ctrl-C, after cancelling `shutdown`. Never resolves if the
/// signal handler cannot be installed.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    init_metrics();

    let config = Config::from_env();
    let store = open_store(cli.db.as_ref()).await?;
    let worker = Arc::new(YtDlpWorker::new(&config.worker));

    let shutdown = CancellationToken::new();
    let state = AppState::new(store, worker, &config, shutdown.clone());

    let sweeper = CleanupSweeper::new(Arc::clone(&state.admission), &config.rate_limit)
        .spawn(shutdown.clone());

    let app = create_app(Arc::clone(&state));
    let addr = SocketAddr::new(cli.host, cli.port());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        %addr,
        max_concurrent_jobs = config.launcher.max_concurrent_jobs,
        job_deadline_secs = config.launcher.job_deadline.as_secs(),
        "Clipper listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await
    .context("server error")?;

    // Also covers the serve loop ending on its own.
    shutdown.cancel();
    state.supervisor.shutdown(SHUTDOWN_GRACE).await;
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Rate limiter cleanup task ended abnormally");
    }

    tracing::info!("Clipper stopped");
    Ok(())
}
