use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::checker::HeightProbe;
use super::transport::get_json;
use super::types::{ProbeError, ProbeOutcome};

/// Aptos fullnodes. The REST index (`GET /v1`) reports `block_height` as a string.
pub struct AptosProbe;

pub fn parse_aptos_height(body: &Value) -> ProbeOutcome {
    let raw = body
        .get("block_height")
        .ok_or_else(|| ProbeError::InvalidResponse(format!("no block_height in response: {}", body)))?;

    match raw {
        Value::String(s) => s
            .parse::<u64>()
            .map_err(|e| ProbeError::InvalidResponse(format!("invalid block_height {:?}: {}", s, e))),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| ProbeError::InvalidResponse(format!("invalid block_height: {}", n))),
        other => Err(ProbeError::InvalidResponse(format!("invalid block_height: {}", other))),
    }
}

#[async_trait]
impl HeightProbe for AptosProbe {
    async fn fetch_height(&self, url: &str, proxy: Option<&str>, timeout: Duration) -> ProbeOutcome {
        let body = get_json(url, proxy, timeout).await?;
        parse_aptos_height(&body)
    }
}
