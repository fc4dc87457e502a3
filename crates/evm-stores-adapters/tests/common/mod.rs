#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tiny_http::{Response, Server};
use tokio::sync::{watch, Notify};

use evm_stores_adapters::{Eip1193Adapter, JsonRpcConnector, StaticEnvironment, StoreAdapterConfig};
use evm_stores_core::{
    ChainIdRaw, ChainRegistry, ConnectionSnapshot, EvmStore, PortError, ProviderEventKind,
    ProviderListener, ProviderPort, WalletMarkers,
};

pub const ACCOUNT_A: &str = "0xA";
pub const ACCOUNT_B: &str = "0xB";
pub const ACCOUNT_C: &str = "0xC";

pub fn chains() -> Arc<ChainRegistry> {
    Arc::new(ChainRegistry::builtin())
}

pub fn wallet(chain_id: u64, accounts: &[&str]) -> Eip1193Adapter {
    Eip1193Adapter::new()
        .with_chain_id(chain_id)
        .with_accounts(accounts.iter().copied())
}

pub fn metamask(chain_id: u64, accounts: &[&str]) -> Eip1193Adapter {
    wallet(chain_id, accounts).with_markers(WalletMarkers {
        is_metamask: true,
        ..WalletMarkers::default()
    })
}

pub fn store_with_browser(name: &str, provider: impl ProviderPort + 'static) -> EvmStore {
    let env = StaticEnvironment::new().with_injected(provider).into_shared();
    EvmStore::new(name, env, chains())
}

pub fn store_with_connector(name: &str) -> EvmStore {
    let connector =
        JsonRpcConnector::with_config(&StoreAdapterConfig::default()).expect("http connector");
    let env = StaticEnvironment::new().with_connector(connector).into_shared();
    EvmStore::new(name, env, chains())
}

pub fn store_without_environment(name: &str) -> EvmStore {
    EvmStore::new(name, StaticEnvironment::new().into_shared(), chains())
}

/// Waits until the published snapshot satisfies `pred`.
pub async fn wait_for(
    rx: &mut watch::Receiver<ConnectionSnapshot>,
    pred: impl Fn(&ConnectionSnapshot) -> bool,
) -> ConnectionSnapshot {
    let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| pred(s)))
        .await
        .expect("state change within timeout")
        .expect("store still alive");
    snapshot.clone()
}

/// Wallet whose `chain_id` blocks until released, for interleaving two
/// connects.
pub struct GatedProvider {
    pub inner: Eip1193Adapter,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GatedProvider {
    pub fn new(inner: Eip1193Adapter) -> Self {
        Self {
            inner,
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl ProviderPort for GatedProvider {
    async fn chain_id(&self) -> Result<ChainIdRaw, PortError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.chain_id().await
    }

    async fn accounts(&self) -> Result<Vec<String>, PortError> {
        self.inner.accounts().await
    }

    fn supports_request(&self) -> bool {
        self.inner.supports_request()
    }

    async fn request_accounts(&self) -> Result<Vec<String>, PortError> {
        self.inner.request_accounts().await
    }

    fn supports_events(&self) -> bool {
        self.inner.supports_events()
    }

    fn on(&self, kind: ProviderEventKind, listener: ProviderListener) -> Result<(), PortError> {
        self.inner.on(kind, listener)
    }

    fn remove_listener(
        &self,
        kind: ProviderEventKind,
        listener: &ProviderListener,
    ) -> Result<(), PortError> {
        self.inner.remove_listener(kind, listener)
    }

    fn wallet_markers(&self) -> WalletMarkers {
        self.inner.wallet_markers()
    }
}

/// Wallet whose `disconnect` blocks until released.
pub struct SlowDisconnectProvider {
    pub inner: Eip1193Adapter,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl SlowDisconnectProvider {
    pub fn new(inner: Eip1193Adapter) -> Self {
        Self {
            inner: inner.with_disconnect(),
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl ProviderPort for SlowDisconnectProvider {
    async fn chain_id(&self) -> Result<ChainIdRaw, PortError> {
        self.inner.chain_id().await
    }

    async fn accounts(&self) -> Result<Vec<String>, PortError> {
        self.inner.accounts().await
    }

    fn supports_request(&self) -> bool {
        self.inner.supports_request()
    }

    async fn request_accounts(&self) -> Result<Vec<String>, PortError> {
        self.inner.request_accounts().await
    }

    fn supports_disconnect(&self) -> bool {
        true
    }

    async fn disconnect(&self) -> Result<(), PortError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.disconnect().await
    }
}

/// Canned JSON-RPC node. Methods map to a `result` value, or to an `error`
/// object when the value is `Err`.
pub type RpcAnswers = HashMap<&'static str, Result<Value, Value>>;

pub fn spawn_rpc_server(
    answers: RpcAnswers,
    calls: Arc<Mutex<Vec<String>>>,
) -> (String, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").expect("start server");
    let addr = format!("http://{}", server.server_addr());

    let join = thread::spawn(move || {
        for _ in 0..32 {
            let mut req = match server.recv() {
                Ok(r) => r,
                Err(_) => break,
            };
            let mut body = String::new();
            let _ = req.as_reader().read_to_string(&mut body);
            let payload: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let method = payload
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            let id = payload.get("id").cloned().unwrap_or(Value::Null);
            if let Ok(mut g) = calls.lock() {
                g.push(method.clone());
            }

            let reply = match answers.get(method.as_str()) {
                Some(Ok(result)) => serde_json::json!({"jsonrpc": "2.0", "id": id, "result": result}),
                Some(Err(error)) => serde_json::json!({"jsonrpc": "2.0", "id": id, "error": error}),
                None => serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": -32601, "message": "method not found"}
                }),
            };
            let _ = req.respond(Response::from_string(reply.to_string()));
        }
    });

    (addr, join)
}
