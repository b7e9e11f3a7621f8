use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::checker::HeightProbe;
use super::transport::{post_json_rpc, rpc_result, service_error};
use super::types::{ProbeError, ProbeOutcome};

/// EVM execution clients (Geth, Reth, Erigon, hosted RPCs)
pub struct EvmProbe;

/// Height from an `eth_blockNumber` body. The result is a hex quantity like `"0x2a"`.
pub fn parse_evm_height(body: &Value) -> ProbeOutcome {
    if let Some(message) = service_error(body) {
        return Err(ProbeError::Service(message));
    }

    let hex_str = rpc_result(body)?
        .as_str()
        .ok_or_else(|| ProbeError::InvalidResponse(format!("expected hex string result: {}", body)))?;

    let digits = hex_str.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(digits, 16)
        .map_err(|e| ProbeError::InvalidResponse(format!("invalid hex height {:?}: {}", hex_str, e)))
}

#[async_trait]
impl HeightProbe for EvmProbe {
    async fn fetch_height(&self, url: &str, proxy: Option<&str>, timeout: Duration) -> ProbeOutcome {
        let body = post_json_rpc(url, "eth_blockNumber", proxy, timeout).await?;
        parse_evm_height(&body)
    }
}
