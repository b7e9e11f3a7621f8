use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of a node after its most recent check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    NotChecked,
    Ok,
    Timeout,
    Proxy,
    UnknownResponse,
    Error,
}

impl NodeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::NotChecked => "not_checked",
            NodeStatus::Ok => "ok",
            NodeStatus::Timeout => "timeout",
            NodeStatus::Proxy => "proxy",
            NodeStatus::UnknownResponse => "unknown_response",
            NodeStatus::Error => "error",
        }
    }

    /// Parse a stored status. Unrecognised values collapse to `Error`.
    pub fn from_db(raw: &str) -> Self {
        match raw {
            "not_checked" => NodeStatus::NotChecked,
            "ok" => NodeStatus::Ok,
            "timeout" => NodeStatus::Timeout,
            "proxy" => NodeStatus::Proxy,
            "unknown_response" => NodeStatus::UnknownResponse,
            _ => NodeStatus::Error,
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified failure of a single height probe.
///
/// Probes never surface transport or parsing failures any other way; the
/// orchestrator turns these into a [`NodeStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The request did not finish within the probe timeout
    #[error("timeout")]
    Timeout,

    /// The configured proxy could not be used or refused the connection
    #[error("proxy: {0}")]
    Proxy(String),

    /// Connection, DNS or other transport level failure
    #[error("transport: {0}")]
    Transport(String),

    /// Body was malformed or did not carry the expected field
    #[error("unknown_response: {0}")]
    InvalidResponse(String),

    /// Well-formed body carrying an application level error object
    #[error("service_error: {0}")]
    Service(String),
}

impl ProbeError {
    /// Machine readable outcome tag
    pub fn tag(&self) -> &'static str {
        match self {
            ProbeError::Timeout => "timeout",
            ProbeError::Proxy(_) => "proxy",
            ProbeError::Transport(_) => "transport",
            ProbeError::InvalidResponse(_) => "unknown_response",
            ProbeError::Service(_) => "service_error",
        }
    }

    pub fn status(&self) -> NodeStatus {
        match self {
            ProbeError::Timeout => NodeStatus::Timeout,
            ProbeError::Proxy(_) => NodeStatus::Proxy,
            ProbeError::InvalidResponse(_) | ProbeError::Service(_) => NodeStatus::UnknownResponse,
            ProbeError::Transport(_) => NodeStatus::Error,
        }
    }
}

/// Result of one probe: the observed height or the classified reason
pub type ProbeOutcome = Result<u64, ProbeError>;
