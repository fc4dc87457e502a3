use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::ChainIdRaw;
use crate::state_machine::ConnectionStatus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[default]
    None,
    /// Endpoint string, or a provider object without an authorization flow.
    StringRpc,
    Injected,
    Browser,
}

/// Vendor flags exposed by injected wallets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletMarkers {
    pub is_metamask: bool,
    pub is_nifty_wallet: bool,
    pub is_trust: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletKind {
    MetaMask,
    Nifty,
    Trust,
    Unknown,
}

impl WalletKind {
    /// First matching marker wins.
    pub fn classify(markers: &WalletMarkers) -> Self {
        if markers.is_metamask {
            Self::MetaMask
        } else if markers.is_nifty_wallet {
            Self::Nifty
        } else if markers.is_trust {
            Self::Trust
        } else {
            Self::Unknown
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::MetaMask => "MetaMask (or compatible)",
            Self::Nifty => "Nifty",
            Self::Trust => "Trust",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderEventKind {
    AccountsChanged,
    ChainChanged,
    Disconnect,
}

impl ProviderEventKind {
    pub const ALL: [ProviderEventKind; 3] = [
        ProviderEventKind::AccountsChanged,
        ProviderEventKind::ChainChanged,
        ProviderEventKind::Disconnect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountsChanged => "accountsChanged",
            Self::ChainChanged => "chainChanged",
            Self::Disconnect => "disconnect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<String>),
    ChainChanged(ChainIdRaw),
    Disconnect(Option<String>),
}

impl ProviderEvent {
    pub fn kind(&self) -> ProviderEventKind {
        match self {
            Self::AccountsChanged(_) => ProviderEventKind::AccountsChanged,
            Self::ChainChanged(_) => ProviderEventKind::ChainChanged,
            Self::Disconnect(_) => ProviderEventKind::Disconnect,
        }
    }
}

/// Whatever is known when a change notification arrives. Missing pieces are
/// re-queried from the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialUpdate {
    pub accounts: Option<Vec<String>>,
    pub chain_id: Option<ChainIdRaw>,
}

impl PartialUpdate {
    pub fn accounts(accounts: Vec<String>) -> Self {
        Self {
            accounts: Some(accounts),
            chain_id: None,
        }
    }

    pub fn chain_id(chain_id: impl Into<ChainIdRaw>) -> Self {
        Self {
            accounts: None,
            chain_id: Some(chain_id.into()),
        }
    }
}

/// Published state of one store. Never carries the provider handle itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    pub connected: bool,
    pub provider_kind: ProviderKind,
    pub chain_id: Option<u64>,
    pub accounts: Vec<String>,
    pub selected_index: usize,
    /// `None` when no provider is attached.
    pub wallet_markers: Option<WalletMarkers>,
    pub endpoint: Option<String>,
    pub generation: u64,
    pub revision: u64,
}

/// Non-fatal conditions, recovered locally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreWarning {
    #[error("account index {requested} out of range for {available} account(s); using 0")]
    IndexOutOfRange { requested: usize, available: usize },
    #[error("provider does not list accounts: {reason}")]
    AccountQueryUnsupported { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectReport {
    pub generation: u64,
    pub provider_kind: ProviderKind,
    pub chain_id: u64,
    pub account_count: usize,
    pub selected_index: usize,
    pub warnings: Vec<StoreWarning>,
}

/// Keeps `requested` when `requested < max(1, available)`, otherwise falls
/// back to 0 and reports why.
pub fn clamp_selected_index(requested: usize, available: usize) -> (usize, Option<StoreWarning>) {
    if requested < available.max(1) {
        (requested, None)
    } else {
        (
            0,
            Some(StoreWarning::IndexOutOfRange {
                requested,
                available,
            }),
        )
    }
}
