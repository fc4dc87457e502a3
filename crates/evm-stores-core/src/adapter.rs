//! Normalizes endpoint clients and injected wallets into one handshake
//! result.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::domain::{
    clamp_selected_index, ProviderEvent, ProviderEventKind, ProviderKind, StoreWarning,
};
use crate::error::StoreError;
use crate::ports::{AmbientEnvironment, EndpointConnector, ProviderListener, ProviderPort};

/// What the caller handed to `set_provider`.
#[derive(Clone, Default)]
pub enum ProviderSource {
    /// Use the ambient injected provider.
    #[default]
    Browser,
    Endpoint(String),
    Provider(Arc<dyn ProviderPort>),
}

impl ProviderSource {
    pub fn provider(provider: impl ProviderPort + 'static) -> Self {
        Self::Provider(Arc::new(provider))
    }
}

impl fmt::Debug for ProviderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Browser => f.write_str("Browser"),
            Self::Endpoint(endpoint) => f.debug_tuple("Endpoint").field(endpoint).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

impl From<&str> for ProviderSource {
    fn from(value: &str) -> Self {
        Self::Endpoint(value.to_owned())
    }
}

impl From<String> for ProviderSource {
    fn from(value: String) -> Self {
        Self::Endpoint(value)
    }
}

impl From<Arc<dyn ProviderPort>> for ProviderSource {
    fn from(value: Arc<dyn ProviderPort>) -> Self {
        Self::Provider(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderClass {
    Endpoint,
    Injected,
    /// Nothing usable was supplied; the ambient provider is used instead.
    Unknown,
}

pub fn classify_provider(source: &ProviderSource) -> ProviderClass {
    match source {
        ProviderSource::Browser => ProviderClass::Unknown,
        ProviderSource::Endpoint(endpoint) if endpoint.trim().is_empty() => ProviderClass::Unknown,
        ProviderSource::Endpoint(_) => ProviderClass::Endpoint,
        ProviderSource::Provider(p) if p.supports_request() => ProviderClass::Injected,
        ProviderSource::Provider(_) => ProviderClass::Endpoint,
    }
}

/// Result of a successful handshake, not yet committed to a store.
pub struct Negotiated {
    pub provider: Arc<dyn ProviderPort>,
    pub kind: ProviderKind,
    pub endpoint: Option<String>,
    pub chain_id: u64,
    pub accounts: Vec<String>,
    pub selected_index: usize,
    pub warnings: Vec<StoreWarning>,
}

impl Negotiated {
    pub fn select(mut self, preferred_index: usize) -> Self {
        let (index, warning) = clamp_selected_index(preferred_index, self.accounts.len());
        if let Some(warning) = warning {
            tracing::warn!(%warning, "clamping preferred account index");
            self.warnings.push(warning);
        }
        self.selected_index = index;
        self
    }
}

/// Listeners attached to one provider, kept so the identical `Arc`s can be
/// detached later.
#[derive(Default)]
pub struct ListenerSet {
    attached: Vec<(ProviderEventKind, ProviderListener)>,
}

impl ListenerSet {
    pub fn len(&self) -> usize {
        self.attached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.attached.iter().map(|(kind, _)| kind))
            .finish()
    }
}

pub struct ProviderAdapter {
    connector: Option<Arc<dyn EndpointConnector>>,
    environment: Arc<dyn AmbientEnvironment>,
}

impl ProviderAdapter {
    /// The endpoint connector is resolved once, here, and reused for every
    /// endpoint connect.
    pub fn new(environment: Arc<dyn AmbientEnvironment>) -> Self {
        Self {
            connector: environment.connector(),
            environment,
        }
    }

    pub fn has_connector(&self) -> bool {
        self.connector.is_some()
    }

    pub fn ambient_provider(&self) -> Option<Arc<dyn ProviderPort>> {
        self.environment.injected_provider()
    }

    pub async fn connect_with_endpoint(&self, endpoint: &str) -> Result<Negotiated, StoreError> {
        let connector = self.connector.as_ref().ok_or(StoreError::ProviderMissing)?;
        let provider =
            connector
                .connect(endpoint)
                .map_err(|source| StoreError::EndpointUnavailable {
                    endpoint: endpoint.to_owned(),
                    source,
                })?;
        let mut negotiated = self.connect_with_client(provider).await?;
        negotiated.endpoint = Some(endpoint.to_owned());
        Ok(negotiated)
    }

    /// Plain client flow: chain id is mandatory, accounts are best-effort.
    pub async fn connect_with_client(
        &self,
        provider: Arc<dyn ProviderPort>,
    ) -> Result<Negotiated, StoreError> {
        let chain_id = provider
            .chain_id()
            .await
            .and_then(|raw| raw.normalize())
            .map_err(StoreError::ChainIdUnavailable)?;

        let mut warnings = Vec::new();
        let accounts = match provider.accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                let warning = StoreWarning::AccountQueryUnsupported {
                    reason: e.to_string(),
                };
                tracing::warn!(%warning, chain_id, "continuing without accounts");
                warnings.push(warning);
                Vec::new()
            }
        };

        Ok(Negotiated {
            provider,
            kind: ProviderKind::StringRpc,
            endpoint: None,
            chain_id,
            accounts,
            selected_index: 0,
            warnings,
        })
    }

    pub async fn connect_with_injected(
        &self,
        provider: Arc<dyn ProviderPort>,
        preferred_index: usize,
        kind: ProviderKind,
    ) -> Result<Negotiated, StoreError> {
        let accounts = if provider.supports_request() {
            provider
                .request_accounts()
                .await
                .map_err(StoreError::AuthorizationFailed)?
        } else if let Some(accounts) = provider.static_accounts() {
            tracing::debug!("provider has no request method; using its accounts field");
            accounts
        } else {
            return Err(StoreError::ProviderIncompatible);
        };

        let chain_id = provider
            .chain_id()
            .await
            .and_then(|raw| raw.normalize())
            .map_err(StoreError::ChainIdUnavailable)?;

        Ok(Negotiated {
            provider,
            kind,
            endpoint: None,
            chain_id,
            accounts,
            selected_index: 0,
            warnings: Vec::new(),
        }
        .select(preferred_index))
    }

    pub async fn connect_with_browser_default(
        &self,
        preferred_index: usize,
    ) -> Result<Negotiated, StoreError> {
        let provider = self
            .environment
            .injected_provider()
            .ok_or(StoreError::NoBrowserProvider)?;
        provider.set_auto_refresh_on_network_change(false);
        self.connect_with_injected(provider, preferred_index, ProviderKind::Browser)
            .await
    }

    /// Attaches one forwarding listener per event kind. Providers without an
    /// event capability get an empty set.
    pub fn subscribe(
        &self,
        provider: &Arc<dyn ProviderPort>,
        sender: &UnboundedSender<ProviderEvent>,
    ) -> ListenerSet {
        let mut set = ListenerSet::default();
        if !provider.supports_events() {
            return set;
        }
        for kind in ProviderEventKind::ALL {
            let tx = sender.clone();
            let listener: ProviderListener = Arc::new(move |event: ProviderEvent| {
                // receiver is gone once the generation is torn down
                let _ = tx.send(event);
            });
            match provider.on(kind, Arc::clone(&listener)) {
                Ok(()) => set.attached.push((kind, listener)),
                Err(e) => tracing::warn!(event = kind.as_str(), error = %e, "listener not attached"),
            }
        }
        set
    }

    pub fn unsubscribe(&self, provider: &Arc<dyn ProviderPort>, listeners: &ListenerSet) {
        for (kind, listener) in &listeners.attached {
            if let Err(e) = provider.remove_listener(*kind, listener) {
                tracing::warn!(event = kind.as_str(), error = %e, "listener detach failed");
            }
        }
    }
}
