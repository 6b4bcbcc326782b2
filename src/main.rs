//! device-query - Main entry point
//!
//! Scans the configured subnet for responsive devices, then queries each one
//! for status and firmware version with the configured rate-limit delay
//! between task submissions. Same-address queries stay inside one task, so
//! the engine's single-writer-per-address requirement holds.

use clap::Parser;
use device_query_rust::{coap, discovery, logging, EngineConfig, QueryEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, warn};

/// Adaptive firmware/status queries for networked devices
#[derive(Parser, Debug)]
#[command(name = "device-query")]
#[command(about = "Adaptive firmware/status queries for networked devices")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "DEVICE_QUERY_CONFIG")]
    config: Option<PathBuf>,

    /// Subnet to scan, overriding the configuration
    #[arg(long, env = "DEVICE_QUERY_CIDR")]
    cidr: Option<String>,

    /// Skip the lightweight multicast discovery sweep
    #[arg(long)]
    skip_lightweight_discovery: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env()?;
    if let Some(cidr) = cli.cidr {
        config.network.cidr = cidr;
    }
    if cli.debug {
        config.logging.level = "debug".to_string();
    }
    config.validate()?;

    logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    if !cli.skip_lightweight_discovery {
        let responders = coap::discover(&config.lightweight).await;
        if responders.is_empty() {
            info!("no lightweight devices responded to discovery");
        } else {
            info!(count = responders.len(), devices = ?responders, "lightweight devices discovered");
        }
    }

    let devices = discovery::scan_network(
        &config.network.cidr,
        config.network.probe_port,
        config.network.probe_timeout,
    )
    .await?;
    info!(count = devices.len(), "network scan completed");

    let rate_limit_delay = config.network.rate_limit_delay;
    let engine = Arc::new(QueryEngine::new(config));

    let mut workers = Vec::with_capacity(devices.len());
    for address in devices {
        let engine = engine.clone();
        workers.push(tokio::spawn(async move {
            match engine.get_status(&address).await {
                Ok(status) => {
                    info!(%address, %status, "device status");
                    println!("Device {address} status: {status}");
                }
                Err(e) => warn!(%address, error = %e, "could not retrieve status"),
            }

            match engine.get_firmware_version(&address).await {
                Ok(version) => {
                    info!(%address, %version, "device firmware version");
                    println!("Device {address} firmware version: {version}");
                }
                Err(e) => warn!(%address, error = %e, "could not retrieve firmware version"),
            }
        }));

        // rate limiting between submissions to spare the network segment
        sleep(rate_limit_delay).await;
    }

    for worker in workers {
        let _ = worker.await;
    }

    Ok(())
}
