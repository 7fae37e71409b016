//! runstreak - daily running streak bot
//!
//! One-shot subcommands run a single pipeline stage and exit non-zero on
//! failure. `bot` runs the supervisor loop until Ctrl+C or SIGTERM.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use runstreak_bot::{Streak, Supervisor};
use runstreak_common::config::{resolve_config_path, LoggingConfig};
use runstreak_common::{StreakConfig, SystemClock};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for runstreak
#[derive(Parser, Debug)]
#[command(name = "runstreak")]
#[command(about = "Automate daily running streak reports")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose level... repeat up to three times
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch new activity records into the ledger
    Update,
    /// Show challenge progress
    Status,
    /// Render the video for a day
    Create {
        /// Challenge day (default: latest day covered by the ledger)
        #[arg(long)]
        day: Option<i64>,
    },
    /// Publish the video for a day
    Upload {
        /// Challenge day (default: latest day covered by the ledger)
        #[arg(long)]
        day: Option<i64>,
    },
    /// Run update, create and upload once per interval, forever
    Bot,
}

/// Initialize tracing
///
/// `RUST_LOG` wins, then `-v`, then the configured level.
fn init_tracing(verbose: u8, logging: &LoggingConfig) -> Result<()> {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level '{}'", level))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match &logging.file {
        Some(path) => {
            let file = open_log_file(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open log file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref())?;
    let config = StreakConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    init_tracing(args.verbose, &config.logging)?;

    info!(
        "Starting runstreak v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Config: {}", config_path.display());
    info!("Ledger: {}", config.data_file.display());

    let streak = Streak::from_config(&config, Arc::new(SystemClock));

    match args.command {
        Command::Update => {
            let outcome = streak.update().await.context("Update failed")?;
            println!("{}", outcome);
        }
        Command::Status => {
            let status = streak.status().context("Status failed")?;
            println!("{}", status);
        }
        Command::Create { day } => {
            let outcome = streak.create(day).await.context("Create failed")?;
            println!("{}", outcome);
        }
        Command::Upload { day } => {
            let outcome = streak.upload(day).await.context("Upload failed")?;
            println!("{}", outcome);
        }
        Command::Bot => {
            info!("Supervisor interval: {:?}", config.interval);
            let supervisor = Supervisor::new(streak, config.interval);
            let cycles = supervisor.run_until(shutdown_signal()).await;
            info!("Supervisor stopped after {} cycle(s)", cycles);
        }
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
