//! Outbound proxy pool.
//!
//! The list is fetched from `proxies.url` (one proxy per line) and swapped in
//! atomically. Probes pick a random entry without taking any lock; refreshes
//! are serialised among themselves.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::events;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ProxyRefreshError {
    #[error("failed to fetch proxy list: {0}")]
    Fetch(String),
    #[error("proxy source answered with status {0}")]
    Status(u16),
}

pub struct ProxyPool {
    proxies: ArcSwap<Vec<String>>,
    updated_at: ArcSwap<Option<DateTime<Utc>>>,
    refresh_lock: Mutex<()>,
    client: reqwest::Client,
    config: watch::Receiver<Config>,
}

/// Non-blank lines, trimmed
pub fn parse_proxy_list(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

impl ProxyPool {
    pub fn new(config: watch::Receiver<Config>) -> Self {
        Self {
            proxies: ArcSwap::from_pointee(Vec::new()),
            updated_at: ArcSwap::from_pointee(None),
            refresh_lock: Mutex::new(()),
            client: reqwest::Client::builder()
                .no_proxy()
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            config,
        }
    }

    /// Random proxy from the current snapshot, `None` when the pool is empty
    pub fn pick(&self) -> Option<String> {
        self.proxies.load().choose(&mut rand::thread_rng()).cloned()
    }

    pub fn len(&self) -> usize {
        self.proxies.load().len()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        **self.updated_at.load()
    }

    /// Reload the pool from the configured source.
    ///
    /// On failure the current pool is kept and the failure is published on the
    /// event bus before being returned.
    pub async fn refresh(&self) -> Result<usize, ProxyRefreshError> {
        let _guard = self.refresh_lock.lock().await;
        let url = self.config.borrow().proxies.url.clone();

        debug!(url = %url, "Refreshing proxy pool");
        match self.fetch(&url).await {
            Ok(proxies) => {
                let count = proxies.len();
                self.proxies.store(Arc::new(proxies));
                self.updated_at.store(Arc::new(Some(Utc::now())));
                info!(count, "Proxy pool updated");
                events::publish_proxies_updated(count);
                Ok(count)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Proxy refresh failed, keeping {} proxies", self.len());
                events::publish_proxy_refresh_failed(url, e.to_string());
                Err(e)
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<String>, ProxyRefreshError> {
        let response = self
            .client
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProxyRefreshError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProxyRefreshError::Status(response.status().as_u16()));
        }

        let body = response.text().await.map_err(|e| ProxyRefreshError::Fetch(e.to_string()))?;
        Ok(parse_proxy_list(&body))
    }
}
