use thiserror::Error;

use crate::ports::PortError;

/// Fatal failures of a store operation. The published state is left as it
/// was before the call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no provider available: configure an endpoint connector or an injected provider")]
    ProviderMissing,
    #[error("no injected provider found; authorize a browser extension (MetaMask or similar)")]
    NoBrowserProvider,
    #[error("injected provider exposes neither eth_requestAccounts nor an accounts field")]
    ProviderIncompatible,
    #[error("store {0:?} does not exist")]
    UnknownInstance(String),
    #[error("cannot build client for endpoint {endpoint:?}: {source}")]
    EndpointUnavailable {
        endpoint: String,
        #[source]
        source: PortError,
    },
    #[error("chain id query failed: {0}")]
    ChainIdUnavailable(#[source] PortError),
    #[error("account authorization failed: {0}")]
    AuthorizationFailed(#[source] PortError),
    #[error("connect attempt {token} superseded by a newer connect or disconnect")]
    Superseded { token: u64 },
}
