//! campus-registry service entry point
//!
//! Startup order: configuration, logging, build identification, database,
//! notifier, HTTP server. The pool is closed after graceful shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use campus_common::config::{self, Overrides, ServiceConfig};
use campus_common::db::{init_database, PoolSettings};
use campus_common::time::millis_to_duration;
use campus_registry::{build_router, notify, AppState};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for campus-registry
#[derive(Parser, Debug)]
#[command(name = "campus-registry")]
#[command(about = "Attendance and timetable service")]
#[command(version)]
struct Args {
    /// TOML configuration file (falls back to $CAMPUS_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, env = "CAMPUS_DATABASE")]
    database: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "CAMPUS_BIND_ADDR")]
    bind_addr: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "CAMPUS_PORT")]
    port: Option<u16>,

    /// Number of teaching periods per day
    #[arg(long, env = "CAMPUS_PERIODS_PER_DAY")]
    periods_per_day: Option<u32>,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "CAMPUS_REQUEST_TIMEOUT_MS")]
    request_timeout_ms: Option<u64>,

    /// Guardian alert webhook; alerts are only logged when unset
    #[arg(long, env = "CAMPUS_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, env = "CAMPUS_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            database_path: self.database.clone(),
            bind_addr: self.bind_addr.clone(),
            port: self.port,
            periods_per_day: self.periods_per_day,
            request_timeout_ms: self.request_timeout_ms,
            webhook_url: self.webhook_url.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The subscriber needs the configured level, so config is read first and
    // its outcome logged once tracing is up
    let config_path = config::resolve_config_path(args.config.as_deref());
    let file = match &config_path {
        Some(path) => config::load_toml_config(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => None,
    };
    let file_loaded = file.is_some();
    let config = ServiceConfig::resolve(&args.overrides(), file)
        .context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "campus_registry={level},tower_http={level}",
                    level = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting campus-registry v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match (&config_path, file_loaded) {
        (Some(path), true) => info!("Loaded config from {}", path.display()),
        (Some(path), false) => warn!("Config file {} not found, using defaults", path.display()),
        (None, _) => info!("No config file, using defaults"),
    }
    info!("Database path: {}", config.database_path.display());

    let pool = init_database(
        &config.database_path,
        PoolSettings {
            max_connections: config.max_connections,
            busy_timeout: millis_to_duration(config.busy_timeout_ms),
        },
    )
    .await
    .map_err(|e| {
        error!("Failed to initialize database: {}", e);
        e
    })
    .context("Failed to initialize database")?;
    info!("✓ Database ready");

    let notifier = notify::from_webhook_url(config.notifications.webhook_url.as_deref())
        .context("Failed to build notifier")?;
    info!("Guardian alerts via '{}' notifier", notifier.name());

    let state = AppState::new(pool.clone(), config.periods_per_day, notifier);
    let app = build_router(state, millis_to_duration(config.request_timeout_ms));

    let addr: SocketAddr = format!("{}:{}", config.bind_addr, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.bind_addr, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("campus-registry listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
