//! Liquidator entry point.
//!
//! Loads configuration, initialises structured logging, installs the
//! default stages and runs the sweep scheduler until Ctrl+C or SIGTERM,
//! reloading the config file whenever it changes.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

use liquidator::config::{LogFormat, LogSettings, RawConfig};
use liquidator::engine::watcher::{ConfigWatcher, DEFAULT_POLL_INTERVAL};
use liquidator::engine::Liquidator;
use liquidator::shutdown::Shutdown;

#[derive(Debug, Parser)]
#[command(name = "liquidator", version, about = "Runs liquidation sweeps against a leverage-module ledger")]
struct Args {
    /// TOML config file; watched for changes while running.
    config_file: PathBuf,

    /// Log output format, overriding `[log] format`.
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Log level, overriding `[log] level`.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let raw = RawConfig::load(&args.config_file)
        .with_context(|| format!("Failed to load {}", args.config_file.display()))?;

    let mut log = LogSettings::from_config(&raw)?;
    if let Some(level) = args.log_level {
        log.level = level;
    }
    if let Some(format) = args.log_format {
        log.format = format;
    }
    init_logging(&log)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config_file.display(),
        "Liquidator starting up"
    );

    let liq = Arc::new(Liquidator::default());
    if let Err(e) = liq.reconfigure(raw).await {
        // Not fatal: the watcher may receive a fixed file later.
        error!(error = %e, "error validating config");
    }

    let shutdown = Shutdown::new();
    tokio::spawn(trap_signals(shutdown.clone()));

    let watcher = ConfigWatcher::spawn(
        Arc::clone(&liq),
        &args.config_file,
        DEFAULT_POLL_INTERVAL,
        shutdown.signal(),
    )?;

    info!(period = ?liq.period(), "Entering sweep loop. Press Ctrl+C to stop.");
    let result = liq.start(shutdown.signal()).await;
    watcher.stop();

    if result.is_ok() {
        info!("Liquidator shut down cleanly.");
    }
    result
}

/// Trigger `shutdown` on Ctrl+C, or SIGTERM on unix.
async fn trap_signals(shutdown: Shutdown) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received.");
    shutdown.trigger();
}

/// Initialise the `tracing` subscriber.
fn init_logging(log: &LogSettings) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = tracing::Level::from_str(&log.level)
        .map_err(|_| anyhow::anyhow!("invalid log.level: {}", log.level))?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("liquidator={}", level.as_str().to_lowercase())));

    let json_logging =
        std::env::var("LIQUIDATOR_LOG_JSON").is_ok() || log.format == LogFormat::Json;

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
    Ok(())
}
