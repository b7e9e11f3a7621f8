/// Orchestrator module - health-check core
///
/// The orchestrator:
/// - Picks the nodes that are due (never checked first, then the stalest)
/// - Fans out one probe task per node and waits for all of them
/// - Records each outcome on the node and in the check log
/// - Serialises its own cycles so overlapping scheduler ticks are no-ops
///
/// ## Retention
/// The `retention` submodule sweeps check records past their expiry.

pub mod retention;


pub use retention::CheckRetention;

use anyhow::{Result, anyhow};
use chrono::{Duration, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::database::Database;
use crate::database::models::{Check, NetworkInfo, Node};
use crate::events;
use crate::monitoring::{ProbeOutcome, ProbeRegistry, ProxyPool};
use crate::network::Network;

/// A node is live when its last successful check is this recent
pub const LIVE_WINDOW_MINUTES: i64 = 5;

/// What a call to [`CheckOrchestrator::run_due_checks`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// `auto_check` is off
    Disabled,
    /// Another cycle was still running
    Busy,
    Completed { dispatched: usize, ok: usize },
}

/// Runs a single probe against a node and records the result
pub struct NodeChecker {
    database: Arc<dyn Database>,
    probes: ProbeRegistry,
    proxies: Arc<ProxyPool>,
    config: watch::Receiver<Config>,
}

impl NodeChecker {
    pub fn new(
        database: Arc<dyn Database>,
        probes: ProbeRegistry,
        proxies: Arc<ProxyPool>,
        config: watch::Receiver<Config>,
    ) -> Self {
        Self { database, probes, proxies, config }
    }

    /// Probe `node`, then append its check record and persist the node.
    ///
    /// Probe failures come back as `Ok(Err(..))`; only storage failures are `Err`.
    pub async fn check(&self, mut node: Node) -> Result<ProbeOutcome> {
        let (timeout, ttl) = {
            let config = self.config.borrow();
            (
                config.checks.probe_timeout(),
                Duration::seconds(config.retention.check_ttl_seconds as i64),
            )
        };

        let probe = self.probes.get(node.network.network_type());
        let proxy = self.proxies.pick();

        let started = Instant::now();
        let outcome = probe.fetch_height(&node.url, proxy.as_deref(), timeout).await;
        let elapsed = started.elapsed();

        let now = Utc::now();
        node.record_outcome(&outcome, now);
        let check = Check::new(&node, proxy, &outcome, elapsed, now, ttl);

        self.database.insert_check(&check).await?;
        self.database.save_node_check(&node).await?;

        match &outcome {
            Ok(height) => info!(
                url = %node.url,
                network = %node.network,
                height,
                elapsed = check.elapsed,
                "check ok"
            ),
            Err(e) => info!(
                url = %node.url,
                network = %node.network,
                status = %node.status,
                elapsed = check.elapsed,
                reason = %e,
                "check failed"
            ),
        }
        events::publish_node_checked(node.id, node.url.clone(), node.status);

        Ok(outcome)
    }
}

/// Trim, drop one trailing slash, skip blanks and duplicates (first occurrence wins).
/// Entries may themselves hold several newline separated URLs.
pub fn normalize_urls<I, S>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for entry in urls {
        for line in entry.as_ref().lines() {
            let line = line.trim();
            let url = line.strip_suffix('/').unwrap_or(line);
            if url.is_empty() {
                continue;
            }
            if seen.insert(url.to_string()) {
                result.push(url.to_string());
            }
        }
    }

    result
}

/// Health-check coordinator for the node registry
pub struct CheckOrchestrator {
    database: Arc<dyn Database>,
    checker: Arc<NodeChecker>,
    config: watch::Receiver<Config>,
    cycle_lock: Mutex<()>,
    add_lock: Mutex<()>,
}

impl CheckOrchestrator {
    pub fn new(
        database: Arc<dyn Database>,
        probes: ProbeRegistry,
        proxies: Arc<ProxyPool>,
        config: watch::Receiver<Config>,
    ) -> Self {
        let checker = Arc::new(NodeChecker::new(database.clone(), probes, proxies, config.clone()));
        Self {
            database,
            checker,
            config,
            cycle_lock: Mutex::new(()),
            add_lock: Mutex::new(()),
        }
    }

    /// Register new nodes for `network`. Known URLs are skipped silently.
    /// Returns the number of nodes created.
    pub async fn add<I, S>(&self, network: Network, urls: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let _guard = self.add_lock.lock().await;

        let mut created = 0;
        for url in normalize_urls(urls) {
            if self.database.node_exists(&url).await? {
                debug!(url = %url, "Node already registered");
                continue;
            }
            if self.database.insert_node(&Node::new(network, url)).await? {
                created += 1;
            }
        }

        info!(network = %network, created, "Nodes added");
        Ok(created)
    }

    /// On-demand check of one node
    pub async fn check_one(&self, id: Uuid) -> Result<ProbeOutcome> {
        let node = self
            .database
            .get_node(id)
            .await?
            .ok_or_else(|| anyhow!("Node {} not found", id))?;

        self.checker.check(node).await
    }

    /// One scheduler cycle: select due nodes and check them all concurrently.
    ///
    /// Returns `Busy` immediately when a previous cycle is still running.
    pub async fn run_due_checks(&self) -> Result<CycleOutcome> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            debug!("Previous check cycle still running, skipping");
            return Ok(CycleOutcome::Busy);
        };

        let settings = self.config.borrow().checks.clone();
        if !settings.auto_check {
            return Ok(CycleOutcome::Disabled);
        }

        let nodes = self.select_due_nodes(settings.limit_concurrent_checks, settings.stale_after()).await?;
        let dispatched = nodes.len();
        debug!(dispatched, limit = settings.limit_concurrent_checks, "check_next");

        let mut tasks = JoinSet::new();
        for node in nodes {
            let checker = self.checker.clone();
            tasks.spawn(async move {
                let url = node.url.clone();
                (url, checker.check(node).await)
            });
        }

        let mut ok = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(Ok(_)))) => ok += 1,
                Ok((_, Ok(Err(_)))) => {}
                Ok((url, Err(e))) => warn!(url = %url, "Failed to record check: {:#}", e),
                Err(e) => error!("Check task aborted: {}", e),
            }
        }

        Ok(CycleOutcome::Completed { dispatched, ok })
    }

    /// Never-checked nodes first, topped up with nodes last checked more than
    /// `stale_after` ago, oldest first, `limit` in total.
    async fn select_due_nodes(&self, limit: usize, stale_after: Duration) -> Result<Vec<Node>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut nodes = self.database.find_unchecked_nodes(limit).await?;
        if nodes.len() < limit {
            let checked_before = Utc::now() - stale_after;
            let stale = self.database.find_stale_nodes(checked_before, limit - nodes.len()).await?;
            nodes.extend(stale);
        }

        Ok(nodes)
    }

    /// Live nodes grouped by network; every network is present, possibly empty
    pub async fn live_nodes(&self) -> Result<BTreeMap<Network, Vec<Node>>> {
        let now = Utc::now();
        let window = Duration::minutes(LIVE_WINDOW_MINUTES);
        let live = self.database.find_live_nodes(now - window).await?;

        let mut grouped: BTreeMap<Network, Vec<Node>> =
            Network::ALL.into_iter().map(|network| (network, Vec::new())).collect();
        for node in live.into_iter().filter(|node| node.is_live(now, window)) {
            grouped.entry(node.network).or_default().push(node);
        }

        Ok(grouped)
    }

    /// Total and live node counts for every network
    pub async fn networks_info(&self) -> Result<Vec<NetworkInfo>> {
        let live = self.live_nodes().await?;
        let totals = self.database.count_nodes_by_network().await?;

        Ok(Network::ALL
            .into_iter()
            .map(|network| NetworkInfo {
                network,
                all_nodes: totals.get(&network).copied().unwrap_or(0),
                live_nodes: live.get(&network).map_or(0, |nodes| nodes.len() as u64),
            })
            .collect())
    }
}
