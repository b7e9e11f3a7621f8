//! Expiry of check records.
//!
//! Every check is written with `expires_at = created_at + check_ttl` (three
//! hours by default). The sweep deletes whatever has passed that instant and
//! runs on its own scheduler task.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::Database;

/// Cleanup manager for expired checks
pub struct CheckRetention {
    database: Arc<dyn Database>,
}

impl CheckRetention {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database }
    }

    /// Delete expired checks, returning how many were removed
    pub async fn cleanup_expired_checks(&self) -> Result<u64> {
        let deleted = self.database.delete_expired_checks(Utc::now()).await?;

        if deleted > 0 {
            info!("Retention cleanup completed: {} checks deleted", deleted);
        } else {
            debug!("Retention cleanup: nothing expired");
        }

        Ok(deleted)
    }
}
