use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use evm_stores_core::{
    json_chain_id, ChainIdRaw, PortError, ProviderEvent, ProviderEventKind, ProviderListener,
    ProviderPort, WalletMarkers,
};

use crate::rpc::{http_client, parse_accounts, JsonRpcClient};
use crate::StoreAdapterConfig;

/// Injected-wallet provider. Without a proxy URL it answers from local state
/// that the `debug_*` hooks drive; with one it forwards requests to a
/// JSON-RPC wallet proxy and keeps the local state as a cache.
#[derive(Debug, Clone)]
pub struct Eip1193Adapter {
    mode: ProviderMode,
    state: Arc<Mutex<ProviderState>>,
}

#[derive(Debug, Clone)]
enum ProviderMode {
    Deterministic,
    Proxy(Arc<JsonRpcClient>),
}

struct ProviderState {
    accounts: Vec<String>,
    chain_id: ChainIdRaw,
    markers: WalletMarkers,
    supports_request: bool,
    supports_events: bool,
    supports_disconnect: bool,
    static_accounts: Option<Vec<String>>,
    reject_request: bool,
    fail_accounts: bool,
    fail_chain_id: bool,
    fail_disconnect: bool,
    request_calls: u64,
    disconnect_calls: u64,
    auto_refresh: bool,
    listeners: HashMap<ProviderEventKind, Vec<ProviderListener>>,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self {
            accounts: vec!["0x1000000000000000000000000000000000000001".to_owned()],
            chain_id: ChainIdRaw::Number(1),
            markers: WalletMarkers::default(),
            supports_request: true,
            supports_events: true,
            supports_disconnect: false,
            static_accounts: None,
            reject_request: false,
            fail_accounts: false,
            fail_chain_id: false,
            fail_disconnect: false,
            request_calls: 0,
            disconnect_calls: 0,
            auto_refresh: true,
            listeners: HashMap::new(),
        }
    }
}

impl fmt::Debug for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderState")
            .field("accounts", &self.accounts)
            .field("chain_id", &self.chain_id)
            .field("markers", &self.markers)
            .field("request_calls", &self.request_calls)
            .field("disconnect_calls", &self.disconnect_calls)
            .field(
                "listeners",
                &self.listeners.values().map(Vec::len).sum::<usize>(),
            )
            .finish_non_exhaustive()
    }
}

impl Default for Eip1193Adapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Eip1193Adapter {
    pub fn new() -> Self {
        Self {
            mode: ProviderMode::Deterministic,
            state: Arc::new(Mutex::new(ProviderState::default())),
        }
    }

    pub fn with_config(config: &StoreAdapterConfig) -> Result<Self, PortError> {
        let Some(base_url) = config.injected_proxy_url.as_deref() else {
            return Ok(Self::new());
        };
        let url = reqwest::Url::parse(base_url)
            .map_err(|e| PortError::Validation(format!("invalid proxy url {base_url:?}: {e}")))?;
        let client = JsonRpcClient::new(url, http_client(config)?);
        tracing::debug!(proxy = client.endpoint(), "injected provider uses wallet proxy");
        Ok(Self {
            mode: ProviderMode::Proxy(Arc::new(client)),
            state: Arc::new(Mutex::new(ProviderState::default())),
        })
    }

    pub fn with_accounts<I, S>(self, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().accounts = accounts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_chain_id(self, chain_id: impl Into<ChainIdRaw>) -> Self {
        self.lock().chain_id = chain_id.into();
        self
    }

    pub fn with_markers(self, markers: WalletMarkers) -> Self {
        self.lock().markers = markers;
        self
    }

    /// Legacy wallet: no `eth_requestAccounts`.
    pub fn without_request(self) -> Self {
        self.lock().supports_request = false;
        self
    }

    pub fn with_static_accounts<I, S>(self, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().static_accounts = Some(accounts.into_iter().map(Into::into).collect());
        self
    }

    pub fn without_events(self) -> Self {
        self.lock().supports_events = false;
        self
    }

    pub fn with_disconnect(self) -> Self {
        self.lock().supports_disconnect = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> Result<MutexGuard<'_, ProviderState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("provider lock poisoned: {e}")))
    }

    /// Listeners run after the state lock is released.
    fn emit(&self, event: ProviderEvent) {
        let listeners = self
            .lock()
            .listeners
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();
        tracing::trace!(event = event.kind().as_str(), listeners = listeners.len(), "emit");
        for listener in listeners {
            listener(event.clone());
        }
    }

    pub fn debug_inject_accounts_changed<I, S>(&self, accounts: I) -> Result<(), PortError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let accounts: Vec<String> = accounts.into_iter().map(Into::into).collect();
        self.state()?.accounts = accounts.clone();
        self.emit(ProviderEvent::AccountsChanged(accounts));
        Ok(())
    }

    pub fn debug_inject_chain_changed(&self, chain_id: impl Into<ChainIdRaw>) -> Result<(), PortError> {
        let chain_id = chain_id.into();
        self.state()?.chain_id = chain_id.clone();
        self.emit(ProviderEvent::ChainChanged(chain_id));
        Ok(())
    }

    pub fn debug_inject_disconnect(&self, reason: Option<&str>) {
        self.emit(ProviderEvent::Disconnect(reason.map(str::to_owned)));
    }

    pub fn debug_reject_request(&self, reject: bool) {
        self.lock().reject_request = reject;
    }

    pub fn debug_fail_accounts(&self, fail: bool) {
        self.lock().fail_accounts = fail;
    }

    pub fn debug_fail_chain_id(&self, fail: bool) {
        self.lock().fail_chain_id = fail;
    }

    pub fn debug_fail_disconnect(&self, fail: bool) {
        self.lock().fail_disconnect = fail;
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.values().map(Vec::len).sum()
    }

    pub fn listener_count_for(&self, kind: ProviderEventKind) -> usize {
        self.lock().listeners.get(&kind).map_or(0, Vec::len)
    }

    pub fn request_calls(&self) -> u64 {
        self.lock().request_calls
    }

    pub fn disconnect_calls(&self) -> u64 {
        self.lock().disconnect_calls
    }

    pub fn auto_refresh_on_network_change(&self) -> bool {
        self.lock().auto_refresh
    }

    async fn proxy_accounts(&self, proxy: &JsonRpcClient, method: &str) -> Result<Vec<String>, PortError> {
        let result = proxy.call(method, Value::Array(Vec::new())).await?;
        let accounts = parse_accounts(method, &result)?;
        let changed = {
            let mut g = self.state()?;
            let changed = g.accounts != accounts;
            g.accounts = accounts.clone();
            changed
        };
        if changed {
            self.emit(ProviderEvent::AccountsChanged(accounts.clone()));
        }
        Ok(accounts)
    }
}

#[async_trait]
impl ProviderPort for Eip1193Adapter {
    async fn chain_id(&self) -> Result<ChainIdRaw, PortError> {
        let fail = self.state()?.fail_chain_id;
        if fail {
            return Err(PortError::Transport("eth_chainId unavailable".to_owned()));
        }
        if let ProviderMode::Proxy(proxy) = &self.mode {
            let result = proxy.call("eth_chainId", Value::Array(Vec::new())).await?;
            let chain_id = json_chain_id(&result)?;
            let changed = {
                let mut g = self.state()?;
                let changed = g.chain_id.normalize().ok() != chain_id.normalize().ok();
                g.chain_id = chain_id.clone();
                changed
            };
            if changed {
                self.emit(ProviderEvent::ChainChanged(chain_id.clone()));
            }
            return Ok(chain_id);
        }
        Ok(self.state()?.chain_id.clone())
    }

    async fn accounts(&self) -> Result<Vec<String>, PortError> {
        let fail = self.state()?.fail_accounts;
        if fail {
            return Err(PortError::Transport("eth_accounts unavailable".to_owned()));
        }
        if let ProviderMode::Proxy(proxy) = &self.mode {
            return self.proxy_accounts(proxy, "eth_accounts").await;
        }
        Ok(self.state()?.accounts.clone())
    }

    fn supports_request(&self) -> bool {
        self.lock().supports_request
    }

    async fn request_accounts(&self) -> Result<Vec<String>, PortError> {
        {
            let mut g = self.state()?;
            g.request_calls = g.request_calls.saturating_add(1);
            if !g.supports_request {
                return Err(PortError::NotImplemented("eth_requestAccounts"));
            }
            if g.reject_request {
                return Err(PortError::Transport("user rejected the request".to_owned()));
            }
        }
        if let ProviderMode::Proxy(proxy) = &self.mode {
            return self.proxy_accounts(proxy, "eth_requestAccounts").await;
        }
        Ok(self.state()?.accounts.clone())
    }

    fn static_accounts(&self) -> Option<Vec<String>> {
        self.lock().static_accounts.clone()
    }

    fn supports_events(&self) -> bool {
        self.lock().supports_events
    }

    fn on(&self, kind: ProviderEventKind, listener: ProviderListener) -> Result<(), PortError> {
        let mut g = self.state()?;
        if !g.supports_events {
            return Err(PortError::NotImplemented("provider.on"));
        }
        g.listeners.entry(kind).or_default().push(listener);
        Ok(())
    }

    fn remove_listener(
        &self,
        kind: ProviderEventKind,
        listener: &ProviderListener,
    ) -> Result<(), PortError> {
        let mut g = self.state()?;
        if let Some(attached) = g.listeners.get_mut(&kind) {
            attached.retain(|l| !Arc::ptr_eq(l, listener));
        }
        Ok(())
    }

    fn supports_disconnect(&self) -> bool {
        self.lock().supports_disconnect
    }

    async fn disconnect(&self) -> Result<(), PortError> {
        let mut g = self.state()?;
        if !g.supports_disconnect {
            return Err(PortError::NotImplemented("provider.disconnect"));
        }
        g.disconnect_calls = g.disconnect_calls.saturating_add(1);
        if g.fail_disconnect {
            return Err(PortError::Transport("wallet refused to disconnect".to_owned()));
        }
        Ok(())
    }

    fn wallet_markers(&self) -> WalletMarkers {
        self.lock().markers
    }

    fn set_auto_refresh_on_network_change(&self, enabled: bool) {
        self.lock().auto_refresh = enabled;
    }
}
