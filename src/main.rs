//! viewbind emulator
//!
//! Serves an in-memory instance store over the data-modeling HTTP protocol,
//! for local development against the typed client.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use viewbind::api::{start_server, AppState};
use viewbind::instances::{ApplyRequest, MemoryInstances};
use viewbind::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let matches = Command::new("viewbind-emulator")
        .version(viewbind::VERSION)
        .about("In-memory emulator of the data-modeling instances API.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("addr")
                .long("addr")
                .value_name("ADDR")
                .help("HTTP bind address"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("FILE")
                .help("JSON apply request loaded before serving"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("Log format (pretty, compact)"),
        )
        .get_matches();

    // Load configuration
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    // Apply CLI overrides
    apply_cli_overrides(&mut config, &matches)?;

    viewbind::init(&config)?;
    info!("Starting viewbind emulator v{}", viewbind::VERSION);

    let store = Arc::new(MemoryInstances::new());
    if let Some(seed) = &config.emulator.seed {
        seed_store(&store, seed)?;
    }

    start_server(config.emulator.addr, AppState::new(store), shutdown_signal())
        .await
        .context("emulator failed")?;

    info!("Shutdown complete");
    Ok(())
}

/// Apply command line argument overrides to configuration
fn apply_cli_overrides(config: &mut Config, matches: &ArgMatches) -> Result<()> {
    if let Some(addr) = matches.get_one::<String>("addr") {
        config.emulator.addr = addr
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", addr))?;
    }

    if let Some(seed) = matches.get_one::<String>("seed") {
        config.emulator.seed = Some(seed.into());
    }

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }

    if let Some(format) = matches.get_one::<String>("log-format") {
        config.logging.format = format.clone();
    }

    Ok(())
}

/// Load an apply request from `path` into the store
fn seed_store(store: &MemoryInstances, path: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read seed file {}", path.display()))?;
    let request: ApplyRequest = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid seed file {}", path.display()))?;
    let response = store.seed(&request)?;
    info!(
        instances = response.items.len(),
        nodes = store.node_count(),
        edges = store.edge_count(),
        "store seeded"
    );
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
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
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
