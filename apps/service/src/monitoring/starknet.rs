use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::checker::HeightProbe;
use super::transport::{post_json_rpc, rpc_result, service_error};
use super::types::{ProbeError, ProbeOutcome};

/// Starknet full nodes (Pathfinder, Juno). `starknet_blockNumber` returns a plain integer.
pub struct StarknetProbe;

pub fn parse_starknet_height(body: &Value) -> ProbeOutcome {
    if let Some(message) = service_error(body) {
        return Err(ProbeError::Service(message));
    }

    rpc_result(body)?
        .as_u64()
        .ok_or_else(|| ProbeError::InvalidResponse(format!("expected integer result: {}", body)))
}

#[async_trait]
impl HeightProbe for StarknetProbe {
    async fn fetch_height(&self, url: &str, proxy: Option<&str>, timeout: Duration) -> ProbeOutcome {
        let body = post_json_rpc(url, "starknet_blockNumber", proxy, timeout).await?;
        parse_starknet_height(&body)
    }
}
