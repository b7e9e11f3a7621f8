use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::checker::HeightProbe;
use super::transport::{post_json_rpc, rpc_result, service_error};
use super::types::{ProbeError, ProbeOutcome};

/// Solana RPC nodes, probed with `getBlockHeight`
pub struct SolanaProbe;

/// A body carrying `error.message` is a service error even when the
/// transport succeeded; no height is read from it.
pub fn parse_solana_height(body: &Value) -> ProbeOutcome {
    if let Some(message) = service_error(body) {
        return Err(ProbeError::Service(message));
    }

    match rpc_result(body)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| ProbeError::InvalidResponse(format!("expected integer result: {}", body))),
        // Some gateways quote the height
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| ProbeError::InvalidResponse(format!("invalid height {:?}: {}", s, e))),
        _ => Err(ProbeError::InvalidResponse(format!("expected integer result: {}", body))),
    }
}

#[async_trait]
impl HeightProbe for SolanaProbe {
    async fn fetch_height(&self, url: &str, proxy: Option<&str>, timeout: Duration) -> ProbeOutcome {
        let body = post_json_rpc(url, "getBlockHeight", proxy, timeout).await?;
        parse_solana_height(&body)
    }
}
