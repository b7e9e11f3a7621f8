use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::monitoring::types::{NodeStatus, ProbeOutcome};
use crate::network::Network;

/// Number of outcomes kept per node
pub const HISTORY_CAPACITY: usize = 100;

/// Most-recent-first record of check outcomes (`true` = ok), capped at
/// [`HISTORY_CAPACITY`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckHistory(VecDeque<bool>);

impl CheckHistory {
    pub fn push(&mut self, ok: bool) {
        self.0.push_front(ok);
        self.0.truncate(HISTORY_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ok_count(&self) -> usize {
        self.0.iter().filter(|ok| **ok).count()
    }

    pub fn down_count(&self) -> usize {
        self.len() - self.ok_count()
    }

    #[cfg(test)]
    pub fn latest(&self) -> Option<bool> {
        self.0.front().copied()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    /// Parse a stored history, dropping anything past the capacity
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let mut entries: VecDeque<bool> = serde_json::from_str(raw)?;
        entries.truncate(HISTORY_CAPACITY);
        Ok(Self(entries))
    }
}

impl fmt::Display for CheckHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ok={} down={}", self.ok_count(), self.down_count())
    }
}

impl FromIterator<bool> for CheckHistory {
    /// Builds from most-recent-first entries
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut entries: VecDeque<bool> = iter.into_iter().collect();
        entries.truncate(HISTORY_CAPACITY);
        Self(entries)
    }
}

/// Node model - a monitored blockchain RPC endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub network: Network,
    pub url: String,
    pub status: NodeStatus,
    /// Latest block number or slot, only while `status` is `Ok`
    pub height: Option<u64>,
    pub check_history: CheckHistory,
    pub checked_at: Option<DateTime<Utc>>,
    pub last_ok_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Node {
    /// Create a never-checked node
    pub fn new(network: Network, url: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            network,
            url,
            status: NodeStatus::NotChecked,
            height: None,
            check_history: CheckHistory::default(),
            checked_at: None,
            last_ok_at: None,
            created_at: Utc::now(),
        }
    }

    /// Apply the outcome of a finished check
    pub fn record_outcome(&mut self, outcome: &ProbeOutcome, now: DateTime<Utc>) {
        match outcome {
            Ok(height) => {
                self.status = NodeStatus::Ok;
                self.height = Some(*height);
                self.check_history.push(true);
                // Clocks can step backwards; last_ok_at never does
                self.last_ok_at = Some(self.last_ok_at.map_or(now, |prev| prev.max(now)));
            }
            Err(e) => {
                self.status = e.status();
                self.height = None;
                self.check_history.push(false);
            }
        }
        self.checked_at = Some(now);
    }

    /// Whether the last successful check is newer than `window`
    pub fn is_live(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.last_ok_at.is_some_and(|at| at > now - window)
    }
}

/// Check model - immutable audit record of one probe attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: Uuid,
    pub node_id: Uuid,
    pub network: Network,
    pub url: String,
    pub proxy: Option<String>,
    pub status: NodeStatus,
    /// Probe duration in seconds, two decimals
    pub elapsed: f64,
    pub response: Value,
    pub created_at: DateTime<Utc>,
    /// Records past this instant are swept by retention
    pub expires_at: DateTime<Utc>,
}

impl Check {
    pub fn new(
        node: &Node,
        proxy: Option<String>,
        outcome: &ProbeOutcome,
        elapsed: std::time::Duration,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let status = match outcome {
            Ok(_) => NodeStatus::Ok,
            Err(e) => e.status(),
        };

        Self {
            id: Uuid::new_v4(),
            node_id: node.id,
            network: node.network,
            url: node.url.clone(),
            proxy,
            status,
            elapsed: round_elapsed(elapsed),
            response: response_payload(outcome),
            created_at: now,
            expires_at: now + ttl,
        }
    }
}

/// Seconds rounded to two decimals
pub fn round_elapsed(elapsed: std::time::Duration) -> f64 {
    (elapsed.as_secs_f64() * 100.0).round() / 100.0
}

/// JSON payload stored with a check. Error text is kept as plain strings.
pub fn response_payload(outcome: &ProbeOutcome) -> Value {
    match outcome {
        Ok(height) => json!({ "ok": height }),
        Err(e) => json!({ "err": e.tag(), "message": e.to_string() }),
    }
}

/// Per-network node totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub network: Network,
    pub all_nodes: u64,
    pub live_nodes: u64,
}

pub fn timestamp_to_i64(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

pub fn i64_to_timestamp(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::ProbeError;

    #[test]
    fn test_history_is_capped_most_recent_first() {
        let mut history = CheckHistory::default();
        for _ in 0..150 {
            history.push(false);
        }
        history.push(true);

        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.latest(), Some(true));
        assert_eq!(history.ok_count(), 1);
        assert_eq!(history.down_count(), 99);
    }

    #[test]
    fn test_history_json_round_trip_truncates() {
        let history: CheckHistory = [true, false, true].into_iter().collect();
        assert_eq!(history.to_json(), "[true,false,true]");
        assert_eq!(CheckHistory::from_json("[true,false,true]").unwrap(), history);

        let oversized = serde_json::to_string(&vec![true; 120]).unwrap();
        assert_eq!(CheckHistory::from_json(&oversized).unwrap().len(), HISTORY_CAPACITY);
    }

    #[test]
    fn test_history_display_counts() {
        let history: CheckHistory = [true, false, true, true].into_iter().collect();
        assert_eq!(history.to_string(), "ok=3 down=1");
        assert_eq!(CheckHistory::default().to_string(), "ok=0 down=0");
    }

    #[test]
    fn test_new_node_is_not_checked() {
        let node = Node::new(Network::Ethereum, "http://a".into());
        assert_eq!(node.status, NodeStatus::NotChecked);
        assert!(node.checked_at.is_none());
        assert!(node.height.is_none());
        assert!(node.check_history.is_empty());
    }

    #[test]
    fn test_success_then_failure() {
        let mut node = Node::new(Network::Solana, "http://sol".into());
        let t1 = Utc::now();
        node.record_outcome(&Ok(100), t1);

        assert_eq!(node.status, NodeStatus::Ok);
        assert_eq!(node.height, Some(100));
        assert_eq!(node.last_ok_at, Some(t1));
        assert_eq!(node.checked_at, Some(t1));

        let t2 = t1 + Duration::seconds(70);
        node.record_outcome(&Err(ProbeError::Timeout), t2);

        assert_eq!(node.status, NodeStatus::Timeout);
        assert_eq!(node.height, None);
        assert_eq!(node.last_ok_at, Some(t1));
        assert_eq!(node.checked_at, Some(t2));
        assert_eq!(node.check_history.latest(), Some(false));
        assert_eq!(node.check_history.len(), 2);
    }

    #[test]
    fn test_last_ok_at_never_regresses() {
        let mut node = Node::new(Network::Ethereum, "http://a".into());
        let later = Utc::now();
        let earlier = later - Duration::seconds(30);

        node.record_outcome(&Ok(1), later);
        node.record_outcome(&Ok(2), earlier);

        assert_eq!(node.last_ok_at, Some(later));
    }

    #[test]
    fn test_liveness_window() {
        let now = Utc::now();
        let mut node = Node::new(Network::Ethereum, "http://a".into());
        assert!(!node.is_live(now, Duration::minutes(5)));

        node.record_outcome(&Ok(1), now - Duration::minutes(4));
        assert!(node.is_live(now, Duration::minutes(5)));

        node.last_ok_at = Some(now - Duration::minutes(6));
        assert!(!node.is_live(now, Duration::minutes(5)));
    }

    #[test]
    fn test_check_record_for_failure() {
        let node = Node::new(Network::Solana, "http://sol".into());
        let now = Utc::now();
        let outcome: ProbeOutcome = Err(ProbeError::Service("slot skipped".into()));

        let check = Check::new(
            &node,
            Some("http://proxy:3128".into()),
            &outcome,
            std::time::Duration::from_millis(1234),
            now,
            Duration::hours(3),
        );

        assert_eq!(check.status, NodeStatus::UnknownResponse);
        assert_eq!(check.elapsed, 1.23);
        assert_eq!(check.expires_at, now + Duration::hours(3));
        assert_eq!(check.response["err"], "service_error");
        assert_eq!(check.response["message"], "service_error: slot skipped");
    }

    #[test]
    fn test_elapsed_rounding() {
        assert_eq!(round_elapsed(std::time::Duration::from_millis(6)), 0.01);
        assert_eq!(round_elapsed(std::time::Duration::from_millis(2999)), 3.0);
    }

    #[test]
    fn test_timestamp_conversion_keeps_millis() {
        let now = i64_to_timestamp(timestamp_to_i64(Utc::now()));
        assert_eq!(i64_to_timestamp(timestamp_to_i64(now)), now);
    }
}
