//! JSON-RPC node endpoint.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use url::Url;
use vigil_types::{ConfigError, ResilienceError};

use super::classify;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

/// One blockchain node reachable over JSON-RPC/HTTP.
#[derive(Debug)]
pub struct RpcEndpoint {
    id: String,
    url: Url,
    client: Client,
    next_id: AtomicU64,
    request_timeout: Duration,
}

impl RpcEndpoint {
    pub fn new(id: impl Into<String>, url: &str, request_timeout: Duration) -> Result<Self, ResilienceError> {
        let url = Url::parse(url).map_err(|e| ConfigError::invalid_value("rpc_url", url, e))?;
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ConfigError::invalid_value("rpc_url", url.as_str(), e))?;
        Ok(Self::with_client(id, url, client, request_timeout))
    }

    pub fn with_client(id: impl Into<String>, url: Url, client: Client, request_timeout: Duration) -> Self {
        Self { id: id.into(), url, client, next_id: AtomicU64::new(1), request_timeout }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Issue one JSON-RPC request and return its `result`.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ResilienceError> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": request_id, "method": method, "params": params });

        let response = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| classify::from_reqwest(&self.id, &e, self.request_timeout))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(classify::from_status(&self.id, status, &headers, &text));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| classify::from_reqwest(&self.id, &e, self.request_timeout))?;

        if let Some(error) = parsed.error {
            return Err(classify::from_rpc_error(&self.id, error.code, &error.message));
        }
        parsed
            .result
            .ok_or_else(|| ResilienceError::upstream(&self.id, format!("{method}: response has no result")))
    }

    pub async fn block_number(&self) -> Result<u64, ResilienceError> {
        let value = self.call("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&self.id, &value)
    }

    pub async fn chain_id(&self) -> Result<u64, ResilienceError> {
        let value = self.call("eth_chainId", json!([])).await?;
        parse_hex_u64(&self.id, &value)
    }

    /// Native balance of `address` at the latest block, in wei.
    pub async fn balance_of(&self, address: &str) -> Result<u128, ResilienceError> {
        let value = self.call("eth_getBalance", json!([address, "latest"])).await?;
        parse_hex_u128(&self.id, &value)
    }

    /// Read-only contract call; returns the raw hex return data.
    pub async fn eth_call(&self, to: &str, data: &str) -> Result<String, ResilienceError> {
        let value = self.call("eth_call", json!([{ "to": to, "data": data }, "latest"])).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ResilienceError::upstream(&self.id, "eth_call: result is not a string"))
    }

    /// Liveness probe: latest block height.
    pub(crate) async fn probe(&self) -> Result<(), ResilienceError> {
        self.block_number().await.map(|_| ())
    }
}

/// Parse a `0x`-prefixed quantity.
pub fn parse_hex_u64(resource_id: &str, value: &Value) -> Result<u64, ResilienceError> {
    let raw = hex_str(resource_id, value)?;
    u64::from_str_radix(raw, 16)
        .map_err(|e| ResilienceError::upstream(resource_id, format!("Invalid quantity {value}: {e}")))
}

pub fn parse_hex_u128(resource_id: &str, value: &Value) -> Result<u128, ResilienceError> {
    let raw = hex_str(resource_id, value)?;
    u128::from_str_radix(raw, 16)
        .map_err(|e| ResilienceError::upstream(resource_id, format!("Invalid quantity {value}: {e}")))
}

fn hex_str<'v>(resource_id: &str, value: &'v Value) -> Result<&'v str, ResilienceError> {
    let s = value
        .as_str()
        .ok_or_else(|| ResilienceError::upstream(resource_id, format!("Expected hex string, got {value}")))?;
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    if digits.is_empty() {
        return Ok("0");
    }
    Ok(digits)
}
