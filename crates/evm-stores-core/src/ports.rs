use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::chain::ChainIdRaw;
use crate::domain::{ProviderEvent, ProviderEventKind, WalletMarkers};

#[derive(Debug, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
}

/// Listener handed to [`ProviderPort::on`]. Detaching compares `Arc`
/// identity, so the exact value passed to `on` must be passed to
/// `remove_listener`.
pub type ProviderListener = Arc<dyn Fn(ProviderEvent) + Send + Sync>;

/// Capability contract of a chain provider.
///
/// `chain_id` and `accounts` are mandatory; everything else is optional and
/// the defaults report the capability as absent.
#[async_trait]
pub trait ProviderPort: Send + Sync {
    async fn chain_id(&self) -> Result<ChainIdRaw, PortError>;

    /// Non-interactive account listing (`eth_accounts`).
    async fn accounts(&self) -> Result<Vec<String>, PortError>;

    fn supports_request(&self) -> bool {
        false
    }

    /// Authorization flow (`eth_requestAccounts`).
    async fn request_accounts(&self) -> Result<Vec<String>, PortError> {
        Err(PortError::NotImplemented("eth_requestAccounts"))
    }

    /// Pre-populated accounts field of legacy injected providers.
    fn static_accounts(&self) -> Option<Vec<String>> {
        None
    }

    fn supports_events(&self) -> bool {
        false
    }

    fn on(&self, _kind: ProviderEventKind, _listener: ProviderListener) -> Result<(), PortError> {
        Err(PortError::NotImplemented("provider.on"))
    }

    /// Must be idempotent: removing an unknown listener is not an error.
    fn remove_listener(
        &self,
        _kind: ProviderEventKind,
        _listener: &ProviderListener,
    ) -> Result<(), PortError> {
        Ok(())
    }

    fn supports_disconnect(&self) -> bool {
        false
    }

    async fn disconnect(&self) -> Result<(), PortError> {
        Err(PortError::NotImplemented("provider.disconnect"))
    }

    fn wallet_markers(&self) -> WalletMarkers {
        WalletMarkers::default()
    }

    fn set_auto_refresh_on_network_change(&self, _enabled: bool) {}
}

/// Builds a client for a fixed RPC endpoint string.
pub trait EndpointConnector: Send + Sync {
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn ProviderPort>, PortError>;
}

/// Host environment lookups. Either may be absent.
pub trait AmbientEnvironment: Send + Sync {
    fn connector(&self) -> Option<Arc<dyn EndpointConnector>>;
    fn injected_provider(&self) -> Option<Arc<dyn ProviderPort>>;
}
