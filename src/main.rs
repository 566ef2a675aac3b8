//! VPN resource allocator daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   config file ──▶ loader/validation ──▶ Services::build
//!        │                                    │
//!        ▼                                    ▼
//!   ConfigWatcher ──reload──▶ ┌──────────────────────────────┐
//!                             │       ResourceRegistry        │
//!   pick / allocate ─────────▶│  (sharded store, CAS, +/-1)   │
//!                             └──────────────────────────────┘
//!                                ▲          ▲           ▲
//!                    HealthMonitor   Reconciler   ScalingAdvisor
//!                    (probe loop)   (drift loop)   (advice loop)
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use vpn_allocator::config::loader::load_config;
use vpn_allocator::config::watcher::ConfigWatcher;
use vpn_allocator::lifecycle::shutdown::drain;
use vpn_allocator::lifecycle::signals::wait_for_shutdown_signal;
use vpn_allocator::observability::{logging, metrics};
use vpn_allocator::registry::resource::{ProtocolType, ResourceKind, TenantId};
use vpn_allocator::{PickConstraints, Services, Shutdown};

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "vpn-allocator")]
#[command(about = "Least-loaded VPN server and node allocation", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "allocator.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the allocator daemon until interrupted
    Run,
    /// Validate the configuration file and exit
    Validate,
    /// Pick a resource from the declared inventory and print it
    Pick {
        #[arg(short, long)]
        tenant: String,
        #[arg(short, long)]
        protocol: Option<ProtocolType>,
        #[arg(short, long)]
        region: Option<String>,
        #[arg(short, long)]
        kind: Option<ResourceKind>,
        /// Run one health round before picking
        #[arg(long)]
        probe: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init_logging(&config.observability);

    match cli.command {
        Commands::Validate => {
            println!(
                "{}: ok ({} resources)",
                cli.config.display(),
                config.resources.len()
            );
        }
        Commands::Pick {
            tenant,
            protocol,
            region,
            kind,
            probe,
        } => {
            let services = Services::build(&config);
            if probe {
                let report = services.monitor.run_once().await;
                tracing::info!(probed = report.probed, healthy = report.healthy, "Health round complete");
            }

            let constraints = PickConstraints {
                protocol,
                region,
                kind,
                ..Default::default()
            };
            let resource = services.selector.pick(&TenantId::new(tenant), &constraints)?;
            println!("{}", serde_json::to_string_pretty(&resource)?);
        }
        Commands::Run => run(cli.config, config).await?,
    }

    Ok(())
}

async fn run(
    path: PathBuf,
    config: vpn_allocator::AllocatorConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("vpn-allocator v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut services = Services::build(&config);
    let shutdown = Shutdown::new();
    let tasks = services.spawn(&shutdown);

    let (watcher, mut updates) = ConfigWatcher::new(&path, config.clone());
    let _watcher = match watcher.run() {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "Config hot reload unavailable");
            None
        }
    };

    let signal = wait_for_shutdown_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            Some(new_config) = updates.recv() => {
                services.apply_reload(&new_config);
            }
            _ = &mut signal => break,
        }
    }

    tracing::info!("Shutting down");
    shutdown.trigger();
    drain(tasks, SHUTDOWN_DEADLINE).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
