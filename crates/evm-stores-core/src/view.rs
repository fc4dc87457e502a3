//! Read-only projections of a store snapshot.

use std::sync::Arc;

use serde::Serialize;

use crate::chain::{ChainData, ChainRegistry, NativeCurrency};
use crate::domain::{ConnectionSnapshot, ProviderKind, WalletKind};
use crate::state_machine::ConnectionStatus;

/// Everything an observer can read about a store. Projections are computed
/// on each call from the snapshot; nothing here is cached or mutable.
#[derive(Debug, Clone)]
pub struct DerivedView {
    snapshot: ConnectionSnapshot,
    chains: Arc<ChainRegistry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewSummary {
    pub status: ConnectionStatus,
    pub connected: bool,
    pub provider_kind: ProviderKind,
    pub chain_id: Option<u64>,
    pub chain_name: Option<String>,
    pub native_currency: Option<String>,
    pub selected_account: Option<String>,
    pub account_count: usize,
    pub wallet_kind: Option<WalletKind>,
}

impl DerivedView {
    pub fn new(snapshot: ConnectionSnapshot, chains: Arc<ChainRegistry>) -> Self {
        Self { snapshot, chains }
    }

    pub fn snapshot(&self) -> &ConnectionSnapshot {
        &self.snapshot
    }

    pub fn connected(&self) -> bool {
        self.snapshot.connected
    }

    pub fn status(&self) -> ConnectionStatus {
        self.snapshot.status
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.snapshot.chain_id
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.snapshot.provider_kind
    }

    pub fn accounts(&self) -> &[String] {
        &self.snapshot.accounts
    }

    pub fn selected_account(&self) -> Option<&str> {
        if !self.snapshot.connected {
            return None;
        }
        self.snapshot
            .accounts
            .get(self.snapshot.selected_index)
            .map(String::as_str)
    }

    pub fn chain_data(&self) -> &ChainData {
        match self.snapshot.chain_id {
            Some(id) => self.chains.lookup(id),
            None => self.chains.empty_record(),
        }
    }

    /// `None` when the chain is not in the registry.
    pub fn chain_name(&self) -> Option<&str> {
        let data = self.chain_data();
        (!data.name.is_empty()).then_some(data.name.as_str())
    }

    pub fn native_currency(&self) -> Option<&NativeCurrency> {
        let currency = &self.chain_data().native_currency;
        (!currency.symbol.is_empty()).then_some(currency)
    }

    pub fn wallet_kind(&self) -> Option<WalletKind> {
        self.snapshot.wallet_markers.as_ref().map(WalletKind::classify)
    }

    pub fn summary(&self) -> ViewSummary {
        ViewSummary {
            status: self.status(),
            connected: self.connected(),
            provider_kind: self.provider_kind(),
            chain_id: self.chain_id(),
            chain_name: self.chain_name().map(str::to_owned),
            native_currency: self.native_currency().map(|c| c.symbol.clone()),
            selected_account: self.selected_account().map(str::to_owned),
            account_count: self.accounts().len(),
            wallet_kind: self.wallet_kind(),
        }
    }
}
