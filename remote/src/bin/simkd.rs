//! μKernel Simulator Daemon
//!
//! Loads the persisted configuration, builds the kernel and serves the
//! line protocol until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Serve on the default address with ./config.json
//! simkd
//!
//! # Custom address and configuration, debug logging
//! simkd --host 0.0.0.0 --port 7000 --config /etc/simk.json -v
//! ```

use clap::Parser;
use simkernel::config::DEFAULT_CONFIG_FILE;
use simkernel::sync::ResourceManager;
use simkernel::Kernel;
use simremote::Server;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// simkd - μKernel simulator service
#[derive(Parser)]
#[command(name = "simkd")]
#[command(author = "μOS Project")]
#[command(version)]
#[command(about = "μKernel simulator remote control service", long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Listen host
    #[arg(long, env = "SIMKD_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Listen port
    #[arg(short, long, env = "SIMKD_PORT", default_value = "9999")]
    port: u16,

    /// Name of the managed resource
    #[arg(long, default_value = "Printer")]
    resource: String,

    /// Concurrent holders of the managed resource
    #[arg(long, default_value = "1")]
    resource_max: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    let resource = ResourceManager::new(&cli.resource, cli.resource_max)?;
    let kernel = Kernel::with_config_file(&cli.config)?.with_resource(resource);
    let config = kernel.config();
    info!(
        "Configuration {}: {} KB pages, {} KB memory",
        cli.config.display(),
        config.page_size_kb,
        config.total_memory_kb
    );

    let addr = format!("{}:{}", cli.host, cli.port);
    let server = Server::bind(&addr, Arc::new(kernel)).await?;

    info!("Serving. Press Ctrl+C to stop.");

    tokio::select! {
        result = server.run() => {
            if let Err(e) = &result {
                error!("Server failed: {}", e);
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    Ok(())
}
