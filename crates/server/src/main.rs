//! TravelSafe provisioning server entry point.
//!
//! Loads configuration, wires the provisioner to the hosted backend, serves
//! the provisioning function over HTTP, and shuts down on SIGINT / SIGTERM.

mod signals;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use travelsafe_core::config::AppConfig;
use travelsafe_core::Provisioner;
use travelsafe_web::WebServer;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// TravelSafe account provisioning server.
#[derive(Parser, Debug)]
#[command(
    name = "travelsafe-server",
    version,
    about = "Serve the tourist account provisioning function"
)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config =
        AppConfig::load_and_resolve(&args.config).context("failed to load configuration")?;

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.server.log_level);
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    info!("========================================");
    info!("  TravelSafe Provisioner v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Config file     : {}", args.config.display());
    info!("Backend URL     : {}", config.backend.url);
    info!("Tourists table  : {}", config.backend.tourists_table);
    info!("Function path   : {}", config.server.function_path);
    info!("Fallback lookup : {}", config.provisioning.fallback_lookup);
    info!("Listen          : {}", config.server.listen);
    info!("Log level       : {}", log_level);
    info!("========================================");

    if config.backend.service_role_key.is_none() {
        warn!(
            env = %config.backend.service_role_key_env,
            "service-role key not set; the backend will reject provisioning calls"
        );
    }
    if config.provisioning.expose_passwords {
        warn!("provisioning.expose_passwords is enabled: responses carry plaintext passwords");
    }

    let provisioner =
        Arc::new(Provisioner::from_config(&config).context("failed to build backend clients")?);
    info!("Provisioner initialized");

    let web_server = WebServer::new(config.clone(), provisioner);
    let listen_addr = config.server.listen.clone();

    tokio::select! {
        result = web_server.start(&listen_addr) => {
            result.context("web server error")?;
        }
        _ = signals::wait_for_shutdown() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("TravelSafe provisioner stopped.");
    Ok(())
}
