//! stowaged — the Stowage daemon.
//!
//! Assembles the service registry store, capability tracking, and the
//! host manager into one binary:
//! - `service ...` maintains volume service records
//! - `filter` runs one refresh and prints the hosts a request may use
//! - `serve` keeps the host-state map fresh until Ctrl-C
//!
//! # Usage
//!
//! ```text
//! stowaged --data-dir /var/lib/stowage service register --host node1 --zone zone1
//! stowaged --config stowage.toml filter --properties '{"size_gb": 10}'
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{debug, info};

use stowage_scheduler::clock::epoch_secs;
use stowage_scheduler::{
    CapabilityReport, FilterProperties, FilterRegistry, HostManager, RequestContext,
    SchedulerConfig, StowageConfig, StoreServiceRegistry, SystemClock,
};
use stowage_state::StateStore;

#[derive(Parser)]
#[command(name = "stowaged", about = "Stowage volume host selection daemon")]
struct Cli {
    /// Path to stowage.toml (defaults apply when omitted).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the service registry store.
    #[arg(long, global = true, default_value = "/var/lib/stowage")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Maintain volume service records.
    Service {
        #[command(subcommand)]
        action: ServiceAction,
    },
    /// Refresh once and print the hosts passing the filter chain.
    Filter {
        /// Filter properties as JSON.
        #[arg(long, default_value = "{}")]
        properties: String,

        /// Comma-separated filter names (default chain when omitted).
        #[arg(long, value_delimiter = ',')]
        filters: Option<Vec<String>>,

        /// JSON file mapping host name to capability report.
        #[arg(long)]
        capabilities: Option<PathBuf>,
    },
    /// Keep the host-state map fresh until interrupted.
    Serve,
}

#[derive(Subcommand)]
enum ServiceAction {
    /// Register a service (or refresh its zone).
    Register {
        #[arg(long)]
        host: String,
        #[arg(long, default_value = "nova")]
        zone: String,
    },
    /// Record a heartbeat.
    Heartbeat {
        #[arg(long)]
        host: String,
    },
    /// Exclude a service from scheduling.
    Disable {
        #[arg(long)]
        host: String,
    },
    /// Re-admit a disabled service.
    Enable {
        #[arg(long)]
        host: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stowage=debug,stowaged=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let state = open_state(&cli.data_dir)?;

    match cli.command {
        Command::Service { action } => run_service_action(&state, &config, action),
        Command::Filter {
            properties,
            filters,
            capabilities,
        } => run_filter(state, config, &properties, filters, capabilities.as_deref()).await,
        Command::Serve => run_serve(state, config).await,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SchedulerConfig> {
    let raw = match path {
        Some(path) => StowageConfig::from_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => StowageConfig::default(),
    };
    Ok(raw.scheduler_config()?)
}

fn open_state(data_dir: &Path) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("stowage.redb");
    let state = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");
    Ok(state)
}

fn build_manager(state: StateStore, config: SchedulerConfig) -> HostManager<StoreServiceRegistry> {
    let clock = Arc::new(SystemClock);
    let registry = Arc::new(StoreServiceRegistry::new(
        state,
        config.service_down_time,
        clock.clone(),
    ));
    let filters = FilterRegistry::with_builtin_filters();
    debug!(available = ?filters.registered(), "filters registered");
    HostManager::new(registry, filters, config, clock)
}

fn run_service_action(
    state: &StateStore,
    config: &SchedulerConfig,
    action: ServiceAction,
) -> anyhow::Result<()> {
    let topic = config.volume_topic.as_str();
    let now = epoch_secs();
    let (host, found) = match action {
        ServiceAction::Register { host, zone } => {
            let record = state.register_service(topic, &host, &zone, now)?;
            info!(%host, id = record.id, zone = %record.availability_zone, "service registered");
            return Ok(());
        }
        ServiceAction::Heartbeat { host } => {
            let found = state.heartbeat_service(topic, &host, now)?;
            (host, found)
        }
        ServiceAction::Disable { host } => {
            let found = state.set_service_disabled(topic, &host, true)?;
            (host, found)
        }
        ServiceAction::Enable { host } => {
            let found = state.set_service_disabled(topic, &host, false)?;
            (host, found)
        }
    };
    anyhow::ensure!(found, "no {topic} service registered for host {host}");
    info!(%host, "service updated");
    Ok(())
}

async fn run_filter(
    state: StateStore,
    config: SchedulerConfig,
    properties: &str,
    filters: Option<Vec<String>>,
    capabilities: Option<&Path>,
) -> anyhow::Result<()> {
    let props: FilterProperties =
        serde_json::from_str(properties).context("parsing --properties")?;
    let manager = build_manager(state, config);

    if let Some(path) = capabilities {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let reports: HashMap<String, CapabilityReport> = serde_json::from_str(&content)?;
        let topic = manager.config().volume_topic.clone();
        for (host, report) in &reports {
            manager.record_capabilities(&topic, host, report).await;
        }
        info!(hosts = reports.len(), "capability reports loaded");
    }

    let ctx = RequestContext::new("cli-filter");
    let selected = manager
        .select_hosts(&ctx, &props, filters.as_deref())
        .await?;

    let output: Vec<serde_json::Value> = selected
        .iter()
        .map(|host| {
            serde_json::json!({
                "host": host.host,
                "availability_zone": host.availability_zone(),
                "total_capacity_gb": host.total_capacity,
                "free_capacity_gb": host.free_capacity,
                "reserved_percentage": host.reserved_percentage,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_serve(state: StateStore, config: SchedulerConfig) -> anyhow::Result<()> {
    info!(topic = %config.volume_topic, filters = ?config.default_filters, "Stowage daemon starting");
    let manager = Arc::new(build_manager(state, config));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresher = Arc::clone(&manager);
    let refresh_handle = tokio::spawn(async move {
        refresher.run(shutdown_rx).await;
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to install CTRL+C handler")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = refresh_handle.await;

    info!("Stowage daemon stopped");
    Ok(())
}
