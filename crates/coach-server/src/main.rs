//! coach-server - Coach backend server
//!
//! REST API over the coaching session orchestrator.

use anyhow::Context;
use clap::Parser;
use coach_core::auth::ServiceToken;
use coach_core::{Database, HttpEnrichmentClient, MemoryKv, SessionOrchestrator, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod middleware;
mod routes;
mod state;

use config::{Config, LogFormat};
use state::AppState;

/// Background jobs get this long to finish after the listener closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

#[derive(Debug, Parser)]
#[command(name = "coach-server", version, about = "Coach backend server")]
struct Args {
    /// Configuration file (defaults to $COACH_HOME/config.toml)
    #[arg(long, env = "COACH_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration
    #[arg(long)]
    bind: Option<String>,
}

fn init_logging(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("coach_server=info,coach_core=info,tower_http=info"))?;

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    init_logging(config.log.format)?;
    info!("coach-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Config loaded from {:?}", config.config_path);

    // Open database
    let database_path = config.database_path();
    if let Some(parent) = database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let db = Arc::new(
        Database::open_path(&database_path)
            .with_context(|| format!("Failed to open database {}", database_path.display()))?,
    );
    info!(path = %database_path.display(), "Database ready");

    // Enrichment worker
    let client = HttpEnrichmentClient::new(&config.worker.url, config.worker.request_timeout())?;
    info!(url = %client.base_url(), "Enrichment worker configured");

    let orchestrator = Arc::new(SessionOrchestrator::new(
        db,
        Arc::new(MemoryKv::new()),
        Arc::new(client),
        Arc::new(SystemClock),
        config.coach_config(),
    ));

    // Evaluations interrupted by a previous shutdown
    match orchestrator.resume_pending_evaluations().await {
        Ok(0) => {}
        Ok(count) => info!(count, "Resumed pending evaluations"),
        Err(e) => warn!(error = %e, "Could not resume pending evaluations"),
    }

    // Service token
    let service_token = ServiceToken::load_or_generate(&config.service_token_path())?;
    info!(token_id = %service_token.token_id, "Service token loaded");

    let bind = config.server.bind.clone();
    let state = Arc::new(AppState::new(config, orchestrator.clone(), service_token));
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("Server ready at http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Waiting for background jobs...");
    if tokio::time::timeout(SHUTDOWN_GRACE, orchestrator.wait_idle())
        .await
        .is_err()
    {
        warn!(
            remaining = orchestrator.tasks().len(),
            "Background jobs still running at shutdown"
        );
    }

    info!("Shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}
