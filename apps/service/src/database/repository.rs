use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Row, params};
use uuid::Uuid;

use super::models::{Check, CheckHistory, Node, i64_to_timestamp, timestamp_to_i64};
use crate::monitoring::types::NodeStatus;
use crate::network::Network;
use crate::pool::LibsqlPool;

const NODE_COLUMNS: &str =
    "id, network, url, status, height, check_history, checked_at, last_ok_at, created_at";

const CHECK_COLUMNS: &str =
    "id, node_id, network, url, proxy, status, elapsed, response, created_at, expires_at";

/// Storage operations the check core relies on
#[async_trait]
pub trait Database: Send + Sync {
    /// Insert a node unless its URL is already registered. Returns whether a row was created.
    async fn insert_node(&self, node: &Node) -> Result<bool>;

    async fn node_exists(&self, url: &str) -> Result<bool>;

    async fn get_node(&self, id: Uuid) -> Result<Option<Node>>;

    /// Up to `limit` nodes that were never checked, in no particular order
    async fn find_unchecked_nodes(&self, limit: usize) -> Result<Vec<Node>>;

    /// Up to `limit` nodes last checked before `checked_before`, oldest first
    async fn find_stale_nodes(&self, checked_before: DateTime<Utc>, limit: usize) -> Result<Vec<Node>>;

    /// Persist the check-owned fields of a node
    async fn save_node_check(&self, node: &Node) -> Result<()>;

    async fn insert_check(&self, check: &Check) -> Result<()>;

    async fn count_nodes_by_network(&self) -> Result<HashMap<Network, u64>>;

    /// Nodes whose last successful check is newer than `since`
    async fn find_live_nodes(&self, since: DateTime<Utc>) -> Result<Vec<Node>>;

    async fn recent_checks(&self, limit: usize) -> Result<Vec<Check>>;

    /// Remove checks whose `expires_at` has passed; returns the number removed
    async fn delete_expired_checks(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    async fn get_conn(&self) -> Result<deadpool::managed::Object<crate::pool::LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    async fn query_nodes(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<Vec<Node>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query(sql, params).await?;

        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await? {
            nodes.push(node_from_row(&row)?);
        }
        Ok(nodes)
    }
}

fn node_from_row(row: &Row) -> Result<Node> {
    let id: String = row.get(0)?;
    let network: String = row.get(1)?;
    let status: String = row.get(3)?;
    let history: String = row.get(5)?;

    Ok(Node {
        id: Uuid::parse_str(&id)?,
        network: network.parse()?,
        url: row.get(2)?,
        status: NodeStatus::from_db(&status),
        height: row.get::<Option<i64>>(4)?.map(|v| v as u64),
        check_history: CheckHistory::from_json(&history)
            .with_context(|| format!("invalid check_history for node {}", id))?,
        checked_at: row.get::<Option<i64>>(6)?.map(i64_to_timestamp),
        last_ok_at: row.get::<Option<i64>>(7)?.map(i64_to_timestamp),
        created_at: i64_to_timestamp(row.get(8)?),
    })
}

fn check_from_row(row: &Row) -> Result<Check> {
    let id: String = row.get(0)?;
    let node_id: String = row.get(1)?;
    let network: String = row.get(2)?;
    let status: String = row.get(5)?;
    let response: String = row.get(7)?;

    Ok(Check {
        id: Uuid::parse_str(&id)?,
        node_id: Uuid::parse_str(&node_id)?,
        network: network.parse()?,
        url: row.get(3)?,
        proxy: row.get(4)?,
        status: NodeStatus::from_db(&status),
        elapsed: row.get(6)?,
        response: serde_json::from_str(&response)?,
        created_at: i64_to_timestamp(row.get(8)?),
        expires_at: i64_to_timestamp(row.get(9)?),
    })
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn insert_node(&self, node: &Node) -> Result<bool> {
        let conn = self.get_conn().await?;

        let inserted = conn
            .execute(
                "INSERT INTO nodes (id, network, url, status, height, check_history, checked_at, last_ok_at, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) ON CONFLICT(url) DO NOTHING",
                params![
                    node.id.to_string(),
                    node.network.as_str(),
                    node.url.clone(),
                    node.status.as_str(),
                    node.height.map(|v| v as i64),
                    node.check_history.to_json(),
                    node.checked_at.map(timestamp_to_i64),
                    node.last_ok_at.map(timestamp_to_i64),
                    timestamp_to_i64(node.created_at)
                ],
            )
            .await?;

        Ok(inserted > 0)
    }

    async fn node_exists(&self, url: &str) -> Result<bool> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT 1 FROM nodes WHERE url = ? LIMIT 1", params![url]).await?;
        Ok(rows.next().await?.is_some())
    }

    async fn get_node(&self, id: Uuid) -> Result<Option<Node>> {
        let sql = format!("SELECT {} FROM nodes WHERE id = ?", NODE_COLUMNS);
        Ok(self.query_nodes(&sql, params![id.to_string()]).await?.into_iter().next())
    }

    async fn find_unchecked_nodes(&self, limit: usize) -> Result<Vec<Node>> {
        let sql = format!("SELECT {} FROM nodes WHERE checked_at IS NULL LIMIT ?", NODE_COLUMNS);
        self.query_nodes(&sql, params![limit as i64]).await
    }

    async fn find_stale_nodes(&self, checked_before: DateTime<Utc>, limit: usize) -> Result<Vec<Node>> {
        let sql = format!(
            "SELECT {} FROM nodes WHERE checked_at IS NOT NULL AND checked_at < ? ORDER BY checked_at ASC LIMIT ?",
            NODE_COLUMNS
        );
        self.query_nodes(&sql, params![timestamp_to_i64(checked_before), limit as i64]).await
    }

    async fn save_node_check(&self, node: &Node) -> Result<()> {
        let conn = self.get_conn().await?;

        conn.execute(
            "UPDATE nodes SET status = ?, height = ?, check_history = ?, checked_at = ?, last_ok_at = ? WHERE id = ?",
            params![
                node.status.as_str(),
                node.height.map(|v| v as i64),
                node.check_history.to_json(),
                node.checked_at.map(timestamp_to_i64),
                node.last_ok_at.map(timestamp_to_i64),
                node.id.to_string()
            ],
        )
        .await?;

        Ok(())
    }

    async fn insert_check(&self, check: &Check) -> Result<()> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO checks (id, node_id, network, url, proxy, status, elapsed, response, created_at, expires_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                check.id.to_string(),
                check.node_id.to_string(),
                check.network.as_str(),
                check.url.clone(),
                check.proxy.clone(),
                check.status.as_str(),
                check.elapsed,
                check.response.to_string(),
                timestamp_to_i64(check.created_at),
                timestamp_to_i64(check.expires_at)
            ],
        )
        .await?;

        Ok(())
    }

    async fn count_nodes_by_network(&self) -> Result<HashMap<Network, u64>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT network, COUNT(*) FROM nodes GROUP BY network", ()).await?;

        let mut counts = HashMap::new();
        while let Some(row) = rows.next().await? {
            let network: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            counts.insert(network.parse()?, count as u64);
        }
        Ok(counts)
    }

    async fn find_live_nodes(&self, since: DateTime<Utc>) -> Result<Vec<Node>> {
        let sql = format!(
            "SELECT {} FROM nodes WHERE last_ok_at > ? ORDER BY network, url",
            NODE_COLUMNS
        );
        self.query_nodes(&sql, params![timestamp_to_i64(since)]).await
    }

    async fn recent_checks(&self, limit: usize) -> Result<Vec<Check>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {} FROM checks ORDER BY created_at DESC LIMIT ?", CHECK_COLUMNS);
        let mut rows = conn.query(&sql, params![limit as i64]).await?;

        let mut checks = Vec::new();
        while let Some(row) = rows.next().await? {
            checks.push(check_from_row(&row)?);
        }
        Ok(checks)
    }

    async fn delete_expired_checks(&self, now: DateTime<Utc>) -> Result<u64> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute("DELETE FROM checks WHERE expires_at <= ?", params![timestamp_to_i64(now)])
            .await?;
        Ok(deleted)
    }
}
