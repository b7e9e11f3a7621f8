mod config;
mod database;
mod events;
mod monitoring;
mod network;
mod orchestrator;
mod pool;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::database::{Database, DatabaseImpl};
use crate::events::ServiceEvent;
use crate::monitoring::{ProbeRegistry, ProxyPool, Scheduler};
use crate::network::Network;
use crate::orchestrator::{CheckOrchestrator, CheckRetention, CycleOutcome};

const RELOAD_SETTINGS_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "chainwatch")]
#[command(about = "Liveness and chain height monitor for blockchain RPC endpoints")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/chainwatch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler until Ctrl-C
    Run,
    /// Register nodes for a network
    Add {
        #[arg(long)]
        network: Network,
        /// Newline separated list of URLs
        #[arg(long)]
        file: Option<PathBuf>,
        urls: Vec<String>,
    },
    /// Check one node now
    Check { id: Uuid },
    /// Total and live node counts per network
    Networks,
    /// Nodes with a successful check in the last few minutes
    Live,
    /// Most recent check records
    Checks {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

struct Services {
    database: Arc<dyn Database>,
    orchestrator: Arc<CheckOrchestrator>,
    proxies: Arc<ProxyPool>,
    config: Arc<watch::Sender<Config>>,
}

async fn build_services(config: Config) -> Result<Services> {
    let pool = pool::open_pool(&config.database.path)
        .await
        .with_context(|| format!("failed to open database {}", config.database.path))?;
    {
        let conn = pool.get().await?;
        database::initialize_database(&conn).await?;
    }
    let database: Arc<dyn Database> = Arc::new(DatabaseImpl::new_from_pool(pool));

    let (config_tx, config_rx) = watch::channel(config);
    let proxies = Arc::new(ProxyPool::new(config_rx.clone()));
    let orchestrator = Arc::new(CheckOrchestrator::new(
        database.clone(),
        ProbeRegistry::standard(),
        proxies.clone(),
        config_rx,
    ));

    Ok(Services { database, orchestrator, proxies, config: Arc::new(config_tx) })
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();

    let cli = Cli::parse();
    let config_path = Config::resolve_path(cli.config.as_deref())?;
    let config = Config::from_config(Some(&config_path))?;
    debug!("{}", config);

    let services = build_services(config).await?;

    match cli.command {
        Command::Run => run(services, config_path).await,
        Command::Add { network, file, urls } => add(&services, network, file, urls).await,
        Command::Check { id } => check(&services, id).await,
        Command::Networks => networks(&services).await,
        Command::Live => live(&services).await,
        Command::Checks { limit } => checks(&services, limit).await,
    }
}

async fn run(services: Services, config_path: PathBuf) -> Result<()> {
    // A failed first refresh only means probes start out direct
    let _ = services.proxies.refresh().await;
    info!(
        proxies = services.proxies.len(),
        updated_at = ?services.proxies.updated_at(),
        "Initial proxy pool loaded"
    );

    tokio::spawn(log_events());

    let (checks, proxies, retention) = {
        let config = services.config.borrow();
        (
            Duration::from_secs(config.checks.interval_seconds.max(1)),
            Duration::from_secs(config.proxies.refresh_interval_seconds.max(1)),
            Duration::from_secs(config.retention.cleanup_interval_seconds.max(1)),
        )
    };

    let mut scheduler = Scheduler::new();

    let orchestrator = services.orchestrator.clone();
    scheduler.every("check_next_node", checks, move || {
        let orchestrator = orchestrator.clone();
        async move {
            if let CycleOutcome::Completed { dispatched, ok } = orchestrator.run_due_checks().await? {
                if dispatched > 0 {
                    debug!(dispatched, ok, "Check cycle finished");
                }
            }
            Ok::<(), anyhow::Error>(())
        }
    });

    let pool = services.proxies.clone();
    scheduler.every("update_proxies", proxies, move || {
        let pool = pool.clone();
        async move {
            // Failures are logged and published by the pool itself
            let _ = pool.refresh().await;
            Ok::<(), anyhow::Error>(())
        }
    });

    let cleanup = Arc::new(CheckRetention::new(services.database.clone()));
    scheduler.every("cleanup_checks", retention, move || {
        let cleanup = cleanup.clone();
        async move { cleanup.cleanup_expired_checks().await.map(|_| ()) }
    });

    let sender = services.config.clone();
    scheduler.every("reload_settings", RELOAD_SETTINGS_INTERVAL, move || {
        let sender = sender.clone();
        let path = config_path.clone();
        async move { reload_settings(&sender, &path) }
    });

    info!(tasks = ?scheduler.task_names(), "chainwatch running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received");
    scheduler.shutdown();
    Ok(())
}

/// Re-read the config file and publish it when it changed
fn reload_settings(sender: &watch::Sender<Config>, path: &std::path::Path) -> Result<()> {
    let fresh = Config::read(path)?;
    let changed = sender.send_if_modified(|current| {
        if *current == fresh {
            return false;
        }
        *current = fresh;
        true
    });

    if changed {
        info!(path = %path.display(), "Settings reloaded");
    }
    Ok(())
}

async fn log_events() {
    let mut rx = events::subscribe();
    loop {
        match rx.recv().await {
            Ok(ServiceEvent::ProxiesUpdated { count }) => info!(count, "Proxy pool updated"),
            Ok(ServiceEvent::ProxyRefreshFailed { url, error }) => {
                debug!(url = %url, error = %error, "Proxy refresh failed")
            }
            Ok(ServiceEvent::NodeChecked { id, url, status }) => {
                debug!(id = %id, url = %url, status = %status, "Node checked")
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log lagging"),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn add(services: &Services, network: Network, file: Option<PathBuf>, mut urls: Vec<String>) -> Result<()> {
    if let Some(file) = file {
        let contents = tokio::fs::read_to_string(&file)
            .await
            .with_context(|| format!("failed to read {}", file.display()))?;
        urls.push(contents);
    }

    let created = services.orchestrator.add(network, urls).await?;
    println!("{} node(s) added to {}", created, network);
    Ok(())
}

async fn check(services: &Services, id: Uuid) -> Result<()> {
    let _ = services.proxies.refresh().await;

    match services.orchestrator.check_one(id).await? {
        Ok(height) => println!("ok: height {}", height),
        Err(e) => println!("{}: {}", e.status(), e),
    }
    Ok(())
}

async fn networks(services: &Services) -> Result<()> {
    println!("{:<14} {:>6} {:>6}", "NETWORK", "ALL", "LIVE");
    for info in services.orchestrator.networks_info().await? {
        println!("{:<14} {:>6} {:>6}", info.network, info.all_nodes, info.live_nodes);
    }
    Ok(())
}

async fn live(services: &Services) -> Result<()> {
    for (network, nodes) in services.orchestrator.live_nodes().await? {
        if nodes.is_empty() {
            continue;
        }
        println!("{} ({})", network, nodes.len());
        for node in nodes {
            let height = node.height.map_or_else(|| "-".to_string(), |h| h.to_string());
            println!("  {}  {}  height={}  {}", node.id, node.url, height, node.check_history);
        }
    }
    Ok(())
}

async fn checks(services: &Services, limit: usize) -> Result<()> {
    for check in services.database.recent_checks(limit).await? {
        println!(
            "{}  {:<16} {:>6.2}s  {:<12} {}",
            check.created_at.format("%Y-%m-%d %H:%M:%S"),
            check.status,
            check.elapsed,
            check.network,
            check.url
        );
    }
    Ok(())
}
