//! JSON-RPC over HTTP: the endpoint-string client and its connector.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use evm_stores_core::{json_chain_id, ChainIdRaw, EndpointConnector, PortError, ProviderPort};

use crate::StoreAdapterConfig;

#[derive(Debug)]
pub struct JsonRpcClient {
    endpoint: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("{method} request failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("{method} json decode failed: {e}")))?;
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "{method} status {status}: {body}"
            )));
        }
        if let Some(err) = body.get("error") {
            return Err(PortError::Transport(format!("{method} returned error: {err}")));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| PortError::Transport(format!("{method} missing result")))
    }
}

#[async_trait]
impl ProviderPort for JsonRpcClient {
    async fn chain_id(&self) -> Result<ChainIdRaw, PortError> {
        let result = self.call("eth_chainId", serde_json::json!([])).await?;
        json_chain_id(&result)
    }

    async fn accounts(&self) -> Result<Vec<String>, PortError> {
        let result = self.call("eth_accounts", serde_json::json!([])).await?;
        parse_accounts("eth_accounts", &result)
    }
}

pub(crate) fn parse_accounts(method: &str, value: &Value) -> Result<Vec<String>, PortError> {
    let arr = value
        .as_array()
        .ok_or_else(|| PortError::Transport(format!("{method}: array expected")))?;
    arr.iter()
        .map(|item| {
            item.as_str()
                .map(str::to_owned)
                .ok_or_else(|| PortError::Transport(format!("{method}: string expected")))
        })
        .collect()
}

/// Builds [`JsonRpcClient`]s sharing one HTTP connection pool.
#[derive(Debug, Clone)]
pub struct JsonRpcConnector {
    client: reqwest::Client,
}

impl JsonRpcConnector {
    pub fn with_config(config: &StoreAdapterConfig) -> Result<Self, PortError> {
        Ok(Self {
            client: http_client(config)?,
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl EndpointConnector for JsonRpcConnector {
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn ProviderPort>, PortError> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|e| PortError::Validation(format!("invalid endpoint {endpoint:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PortError::Validation(format!(
                "unsupported endpoint scheme {:?}",
                url.scheme()
            )));
        }
        Ok(Arc::new(JsonRpcClient::new(url, self.client.clone())))
    }
}

pub(crate) fn http_client(config: &StoreAdapterConfig) -> Result<reqwest::Client, PortError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout_ms) = config.rpc_timeout_ms {
        builder = builder.timeout(Duration::from_millis(timeout_ms));
    }
    builder
        .build()
        .map_err(|e| PortError::Transport(format!("failed to build http client: {e}")))
}
