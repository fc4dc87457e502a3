//! Connection state machine for one named store.
//!
//! Every `set_provider`, `disconnect` and `init` call takes a token from a
//! monotonic counter. A connect only commits if its token is still the
//! latest one issued; provider events carry the generation they were
//! attached under and are dropped once that generation is no longer the
//! published one. The state mutex is never held across an `.await`, and
//! observers are notified only after the lock is released.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::adapter::{
    classify_provider, ListenerSet, Negotiated, ProviderAdapter, ProviderClass, ProviderSource,
};
use crate::chain::ChainRegistry;
use crate::domain::{
    ConnectReport, ConnectionSnapshot, PartialUpdate, ProviderEvent, ProviderKind, WalletMarkers,
};
use crate::error::StoreError;
use crate::notify::{Notifier, SubscriptionId};
use crate::ports::{AmbientEnvironment, ProviderPort};
use crate::state_machine::{connection_transition, ConnectionAction, ConnectionStatus};
use crate::view::DerivedView;

#[derive(Clone)]
pub struct EvmStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    name: String,
    adapter: ProviderAdapter,
    state: Mutex<ConnectionState>,
    notifier: Notifier,
}

#[derive(Default)]
struct ConnectionState {
    status: ConnectionStatus,
    connected: bool,
    provider_kind: ProviderKind,
    provider: Option<Arc<dyn ProviderPort>>,
    endpoint: Option<String>,
    chain_id: Option<u64>,
    accounts: Vec<String>,
    selected_index: usize,
    wallet_markers: Option<WalletMarkers>,
    listeners: ListenerSet,
    event_pump: Option<JoinHandle<()>>,
    generation: u64,
    latest_token: u64,
    revision: u64,
    // set while `disconnect` awaits the provider; updates are refused
    disconnecting: bool,
}

impl ConnectionState {
    fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            status: self.status,
            connected: self.connected,
            provider_kind: self.provider_kind,
            chain_id: self.chain_id,
            accounts: self.accounts.clone(),
            selected_index: self.selected_index,
            wallet_markers: self.wallet_markers,
            endpoint: self.endpoint.clone(),
            generation: self.generation,
            revision: self.revision,
        }
    }

    fn issue_token(&mut self) -> u64 {
        self.latest_token = self.latest_token.saturating_add(1);
        self.latest_token
    }

    /// Applies `action` to the status. Illegal transitions leave the status
    /// alone and return `None`; otherwise reports whether it changed.
    fn apply(&mut self, action: ConnectionAction) -> Option<bool> {
        match connection_transition(self.status, action) {
            Ok((to, _)) => {
                let changed = to != self.status;
                self.status = to;
                Some(changed)
            }
            Err(e) => {
                tracing::debug!(error = %e, "transition ignored");
                None
            }
        }
    }

    /// Detaches listeners, stops the event pump and clears every field.
    /// Returns whether there was anything to clear.
    fn teardown(&mut self, adapter: &ProviderAdapter) -> bool {
        let had_data = self.connected
            || self.provider.is_some()
            || self.chain_id.is_some()
            || !self.accounts.is_empty()
            || self.provider_kind != ProviderKind::None;

        if let Some(provider) = self.provider.take() {
            adapter.unsubscribe(&provider, &self.listeners);
        }
        self.listeners = ListenerSet::default();
        if let Some(pump) = self.event_pump.take() {
            pump.abort();
        }
        self.connected = false;
        self.provider_kind = ProviderKind::None;
        self.endpoint = None;
        self.chain_id = None;
        self.accounts.clear();
        self.selected_index = 0;
        self.wallet_markers = None;
        self.disconnecting = false;
        had_data
    }

    fn bump(&mut self) -> ConnectionSnapshot {
        self.revision = self.revision.saturating_add(1);
        self.snapshot()
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(provider) = state.provider.take() {
            self.adapter.unsubscribe(&provider, &state.listeners);
        }
        if let Some(pump) = state.event_pump.take() {
            pump.abort();
        }
    }
}

impl fmt::Debug for EvmStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmStore")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

impl EvmStore {
    pub fn new(
        name: impl Into<String>,
        environment: Arc<dyn AmbientEnvironment>,
        chains: Arc<ChainRegistry>,
    ) -> Self {
        let state = ConnectionState::default();
        let notifier = Notifier::new(chains, state.snapshot());
        Self {
            inner: Arc::new(StoreInner {
                name: name.into(),
                adapter: ProviderAdapter::new(environment),
                state: Mutex::new(state),
                notifier,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.lock().snapshot()
    }

    pub fn view(&self) -> DerivedView {
        DerivedView::new(self.snapshot(), Arc::clone(self.inner.notifier.chains()))
    }

    pub fn chains(&self) -> &Arc<ChainRegistry> {
        self.inner.notifier.chains()
    }

    pub fn watch(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.inner.notifier.watch()
    }

    /// Calls `observer` with the current view right away and again after
    /// every change. A panicking observer is logged and skipped.
    pub fn subscribe(
        &self,
        observer: impl Fn(&DerivedView) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner
            .notifier
            .subscribe(self.name(), Arc::new(observer), self.snapshot())
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.notifier.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.notifier.subscriber_count()
    }

    /// Number of listeners currently attached to the provider.
    pub fn attached_listeners(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn provider_available(&self) -> bool {
        self.inner.adapter.has_connector() || self.inner.adapter.ambient_provider().is_some()
    }

    /// Resets the store to `Disconnected`, detaching every listener.
    pub fn init(&self) -> Result<(), StoreError> {
        if !self.provider_available() {
            return Err(StoreError::ProviderMissing);
        }
        self.reset(ConnectionAction::Init);
        Ok(())
    }

    pub async fn set_browser_provider(
        &self,
        preferred_index: usize,
    ) -> Result<ConnectReport, StoreError> {
        self.set_provider(ProviderSource::Browser, preferred_index)
            .await
    }

    pub async fn set_provider(
        &self,
        source: impl Into<ProviderSource>,
        preferred_index: usize,
    ) -> Result<ConnectReport, StoreError> {
        let source = source.into();
        if !matches!(source, ProviderSource::Provider(_)) && !self.provider_available() {
            return Err(StoreError::ProviderMissing);
        }

        let class = classify_provider(&source);
        let token = self.begin_connect();
        tracing::debug!(store = %self.name(), token, ?class, ?source, "connecting");

        let adapter = &self.inner.adapter;
        let negotiated = match (class, source) {
            (ProviderClass::Endpoint, ProviderSource::Endpoint(endpoint)) => adapter
                .connect_with_endpoint(&endpoint)
                .await
                .map(|n| n.select(preferred_index)),
            (ProviderClass::Endpoint, ProviderSource::Provider(provider)) => adapter
                .connect_with_client(provider)
                .await
                .map(|n| n.select(preferred_index)),
            (ProviderClass::Injected, ProviderSource::Provider(provider)) => {
                adapter
                    .connect_with_injected(provider, preferred_index, ProviderKind::Injected)
                    .await
            }
            _ => adapter.connect_with_browser_default(preferred_index).await,
        };

        match negotiated {
            Ok(negotiated) => self.commit(token, negotiated),
            Err(e) => {
                self.abandon(token, &e);
                Err(e)
            }
        }
    }

    /// Re-derives accounts and chain id for the current generation. Returns
    /// false when there is no live connection to update.
    pub async fn on_accounts_or_chain_changed(&self, update: PartialUpdate) -> bool {
        let generation = self.lock().generation;
        self.apply_update(generation, update).await
    }

    pub async fn disconnect(&self) {
        let (token, provider) = {
            let mut state = self.lock();
            let token = state.issue_token();
            // events of the outgoing connection are stale from here on
            state.generation = token;
            state.disconnecting = true;
            (token, state.provider.clone())
        };

        if let Some(provider) = provider.filter(|p| p.supports_disconnect()) {
            if let Err(e) = provider.disconnect().await {
                tracing::warn!(store = %self.name(), error = %e, "provider disconnect failed");
            }
        }

        let snapshot = {
            let mut state = self.lock();
            if state.generation != token {
                tracing::debug!(store = %self.name(), token, "newer connection committed; skipping teardown");
                return;
            }
            let cleared = state.teardown(&self.inner.adapter);
            let moved = state.apply(ConnectionAction::Disconnect).unwrap_or(false);
            (cleared || moved).then(|| state.bump())
        };

        if let Some(snapshot) = snapshot {
            tracing::info!(store = %self.name(), generation = token, "disconnected");
            self.inner.notifier.publish(self.name(), snapshot);
        }
    }

    pub async fn close(&self) {
        self.disconnect().await
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn reset(&self, action: ConnectionAction) {
        let snapshot = {
            let mut state = self.lock();
            let token = state.issue_token();
            state.generation = token;
            let cleared = state.teardown(&self.inner.adapter);
            let moved = state.apply(action).unwrap_or(false);
            (cleared || moved).then(|| state.bump())
        };
        if let Some(snapshot) = snapshot {
            self.inner.notifier.publish(self.name(), snapshot);
        }
    }

    fn begin_connect(&self) -> u64 {
        let (token, snapshot) = {
            let mut state = self.lock();
            let mut moved = false;
            if state.status == ConnectionStatus::Uninitialized {
                moved |= state.apply(ConnectionAction::Init).unwrap_or(false);
            }
            moved |= state.apply(ConnectionAction::BeginConnect).unwrap_or(false);
            let token = state.issue_token();
            (token, moved.then(|| state.bump()))
        };
        if let Some(snapshot) = snapshot {
            self.inner.notifier.publish(self.name(), snapshot);
        }
        token
    }

    fn commit(&self, token: u64, negotiated: Negotiated) -> Result<ConnectReport, StoreError> {
        let Negotiated {
            provider,
            kind,
            endpoint,
            chain_id,
            accounts,
            selected_index,
            warnings,
        } = negotiated;

        let snapshot = {
            let mut state = self.lock();
            if state.latest_token != token {
                tracing::debug!(
                    store = %self.name(),
                    token,
                    latest = state.latest_token,
                    "discarding superseded connect"
                );
                return Err(StoreError::Superseded { token });
            }

            state.teardown(&self.inner.adapter);

            let (tx, rx) = mpsc::unbounded_channel();
            let listeners = self.inner.adapter.subscribe(&provider, &tx);
            if !listeners.is_empty() {
                state.event_pump = self.spawn_event_pump(token, rx);
            }
            state.listeners = listeners;

            // only injected wallets expose vendor markers
            state.wallet_markers = matches!(kind, ProviderKind::Injected | ProviderKind::Browser)
                .then(|| provider.wallet_markers());
            state.provider = Some(provider);
            state.provider_kind = kind;
            state.endpoint = endpoint;
            state.chain_id = Some(chain_id);
            state.accounts = accounts;
            state.selected_index = selected_index;
            state.connected = true;
            state.generation = token;
            state.apply(ConnectionAction::ConnectSucceeded);
            state.bump()
        };

        tracing::info!(
            store = %self.name(),
            generation = token,
            chain_id,
            accounts = snapshot.accounts.len(),
            kind = ?snapshot.provider_kind,
            "provider connected"
        );

        let report = ConnectReport {
            generation: token,
            provider_kind: snapshot.provider_kind,
            chain_id,
            account_count: snapshot.accounts.len(),
            selected_index: snapshot.selected_index,
            warnings,
        };
        self.inner.notifier.publish(self.name(), snapshot);
        Ok(report)
    }

    fn abandon(&self, token: u64, error: &StoreError) {
        let snapshot = {
            let mut state = self.lock();
            if state.latest_token != token {
                None
            } else {
                let moved = state.apply(ConnectionAction::ConnectFailed).unwrap_or(false);
                moved.then(|| state.bump())
            }
        };
        tracing::warn!(store = %self.name(), token, %error, "connect failed");
        if let Some(snapshot) = snapshot {
            self.inner.notifier.publish(self.name(), snapshot);
        }
    }

    fn spawn_event_pump(
        &self,
        generation: u64,
        mut rx: mpsc::UnboundedReceiver<ProviderEvent>,
    ) -> Option<JoinHandle<()>> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(store = %self.name(), error = %e, "no runtime; provider events will be ignored");
                return None;
            }
        };
        let store: Weak<StoreInner> = Arc::downgrade(&self.inner);
        Some(runtime.spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(inner) = store.upgrade() else {
                    break;
                };
                EvmStore { inner }.handle_provider_event(generation, event).await;
            }
        }))
    }

    async fn handle_provider_event(&self, generation: u64, event: ProviderEvent) {
        tracing::debug!(store = %self.name(), generation, event = event.kind().as_str(), "provider event");
        match event {
            ProviderEvent::AccountsChanged(accounts) => {
                self.apply_update(generation, PartialUpdate::accounts(accounts))
                    .await;
            }
            ProviderEvent::ChainChanged(chain_id) => {
                self.apply_update(generation, PartialUpdate::chain_id(chain_id))
                    .await;
            }
            ProviderEvent::Disconnect(reason) => self.provider_disconnected(generation, reason),
        }
    }

    async fn apply_update(&self, generation: u64, update: PartialUpdate) -> bool {
        let provider = {
            let state = self.lock();
            if state.generation != generation || !state.connected || state.disconnecting {
                return false;
            }
            match &state.provider {
                Some(provider) => Arc::clone(provider),
                None => return false,
            }
        };

        let chain_id = match update.chain_id {
            Some(raw) => raw.normalize(),
            None => provider.chain_id().await.and_then(|raw| raw.normalize()),
        };
        let chain_id = match chain_id {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(store = %self.name(), generation, error = %e, "keeping previous chain id");
                None
            }
        };

        let accounts = match update.accounts {
            Some(accounts) => Some(accounts),
            None => match provider.accounts().await {
                Ok(accounts) => Some(accounts),
                Err(e) => {
                    tracing::warn!(store = %self.name(), generation, error = %e, "keeping previous accounts");
                    None
                }
            },
        };

        let snapshot = {
            let mut state = self.lock();
            if state.generation != generation || state.disconnecting {
                tracing::debug!(
                    store = %self.name(),
                    generation,
                    current = state.generation,
                    disconnecting = state.disconnecting,
                    "dropping update from stale generation"
                );
                return false;
            }
            if state.apply(ConnectionAction::ProviderUpdated).is_none() {
                return false;
            }

            let mut changed = false;
            if let Some(id) = chain_id.filter(|id| state.chain_id != Some(*id)) {
                state.chain_id = Some(id);
                changed = true;
            }
            if let Some(accounts) = accounts.filter(|a| *a != state.accounts) {
                // wallets list the active account first
                state.accounts = accounts;
                state.selected_index = 0;
                changed = true;
            }
            changed.then(|| state.bump())
        };

        if let Some(snapshot) = snapshot {
            tracing::info!(
                store = %self.name(),
                generation,
                chain_id = ?snapshot.chain_id,
                accounts = snapshot.accounts.len(),
                "provider state updated"
            );
            self.inner.notifier.publish(self.name(), snapshot);
        }
        true
    }

    fn provider_disconnected(&self, generation: u64, reason: Option<String>) {
        let snapshot = {
            let mut state = self.lock();
            if state.generation != generation || !state.connected {
                return;
            }
            let token = state.issue_token();
            state.generation = token;
            state.teardown(&self.inner.adapter);
            state.apply(ConnectionAction::ProviderDisconnected);
            state.bump()
        };
        tracing::warn!(store = %self.name(), generation, reason = ?reason, "provider disconnected");
        self.inner.notifier.publish(self.name(), snapshot);
    }
}
