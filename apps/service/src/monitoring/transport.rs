//! Single-shot HTTP transport shared by every height probe.
//!
//! Builds a client bound to the chosen proxy and timeout, sends exactly one
//! request and maps `reqwest` failures onto [`ProbeError`].

use std::time::Duration;

use reqwest::{Client, Proxy};
use serde_json::{Value, json};

use super::types::ProbeError;

fn build_client(proxy: Option<&str>, timeout: Duration) -> Result<Client, ProbeError> {
    let mut builder = Client::builder().timeout(timeout).connect_timeout(timeout);

    builder = match proxy {
        Some(address) => builder.proxy(
            Proxy::all(address).map_err(|e| ProbeError::Proxy(format!("invalid proxy: {}", e)))?,
        ),
        // Direct probes ignore HTTP_PROXY and friends from the environment
        None => builder.no_proxy(),
    };

    builder.build().map_err(|e| ProbeError::Transport(e.to_string()))
}

fn classify(error: reqwest::Error, proxied: bool) -> ProbeError {
    if error.is_timeout() {
        ProbeError::Timeout
    } else if proxied && error.is_connect() {
        ProbeError::Proxy(error.to_string())
    } else if error.is_decode() || error.is_body() {
        ProbeError::InvalidResponse(error.to_string())
    } else {
        ProbeError::Transport(error.to_string())
    }
}

fn parse_body(text: &str) -> Result<Value, ProbeError> {
    serde_json::from_str(text)
        .map_err(|e| ProbeError::InvalidResponse(format!("invalid json body: {}", e)))
}

/// POST a JSON-RPC call without params and return the decoded body
pub async fn post_json_rpc(
    url: &str,
    method: &str,
    proxy: Option<&str>,
    timeout: Duration,
) -> Result<Value, ProbeError> {
    let client = build_client(proxy, timeout)?;

    let response = client
        .post(url)
        .json(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": [],
            "id": "1"
        }))
        .send()
        .await
        .map_err(|e| classify(e, proxy.is_some()))?;

    let text = response.text().await.map_err(|e| classify(e, proxy.is_some()))?;
    parse_body(&text)
}

/// Plain GET returning the decoded JSON body
pub async fn get_json(url: &str, proxy: Option<&str>, timeout: Duration) -> Result<Value, ProbeError> {
    let client = build_client(proxy, timeout)?;

    let response = client.get(url).send().await.map_err(|e| classify(e, proxy.is_some()))?;

    let text = response.text().await.map_err(|e| classify(e, proxy.is_some()))?;
    parse_body(&text)
}

/// `error.message` of a JSON-RPC body, when the node answered with an error object
pub fn service_error(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    match error.get("message") {
        Some(Value::String(message)) => Some(message.clone()),
        Some(other) => Some(other.to_string()),
        None if error.is_null() => None,
        None => Some(error.to_string()),
    }
}

/// The `result` member of a JSON-RPC body
pub fn rpc_result(body: &Value) -> Result<&Value, ProbeError> {
    body.get("result")
        .filter(|value| !value.is_null())
        .ok_or_else(|| ProbeError::InvalidResponse(format!("no result in response: {}", body)))
}
