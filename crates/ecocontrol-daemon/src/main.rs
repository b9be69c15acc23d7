//! Ecocontrol Daemon - Main entry point
//!
//! Finds infrared heating panels on the local mesh, keeps a mirror of each
//! panel's state and serves it over a REST/WebSocket API.

mod api;
mod config;
mod server;
mod state;
mod ws;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "ecocontrol")]
#[command(about = "Discovery and state sync daemon for mesh-connected heating panels")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "ecocontrol.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single discovery pass and exit
    #[arg(long)]
    scan_once: bool,

    /// Write a default configuration file and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Ecocontrol v{}", env!("CARGO_PKG_VERSION"));

    if args.init_config {
        config::save_default_config(&args.config)?;
        println!("Wrote default configuration to {}", args.config.display());
        return Ok(());
    }

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    // Override bind address if specified
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }

    info!(
        service = %config.discovery.service_fqdn,
        static_hosts = config.discovery.static_hosts.len(),
        sync_interval_secs = config.sync.interval_secs,
        "Configuration loaded"
    );

    let bind = config.daemon.bind.clone();
    let state = state::AppState::new(config)?;

    if args.scan_once {
        info!("Running single discovery pass");
        let devices = state.discoverer.discover_devices().await;
        println!("Discovered {} panels:", devices.len());
        for device in devices {
            println!("  - {} (node {}) at {}", device.mac, device.id, device.host);
        }
    } else {
        // Daemon mode - run API server, discovery and sync
        server::run(state, &bind).await?;
    }

    Ok(())
}
