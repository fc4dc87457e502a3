use std::sync::Arc;

use evm_stores_core::{
    ChainRegistry, ConnectionSnapshot, ConnectionStatus, DerivedView, ProviderKind, WalletKind,
    WalletMarkers,
};

fn connected_snapshot() -> ConnectionSnapshot {
    ConnectionSnapshot {
        status: ConnectionStatus::Connected,
        connected: true,
        provider_kind: ProviderKind::Injected,
        chain_id: Some(137),
        accounts: vec!["0xA".to_owned(), "0xB".to_owned()],
        selected_index: 1,
        wallet_markers: Some(WalletMarkers {
            is_metamask: true,
            ..WalletMarkers::default()
        }),
        endpoint: None,
        generation: 3,
        revision: 4,
    }
}

#[test]
fn disconnected_view_is_empty() {
    let view = DerivedView::new(
        ConnectionSnapshot::default(),
        Arc::new(ChainRegistry::builtin()),
    );
    assert!(!view.connected());
    assert!(view.accounts().is_empty());
    assert_eq!(view.selected_account(), None);
    assert!(view.chain_data().is_empty());
    assert_eq!(view.chain_name(), None);
    assert_eq!(view.wallet_kind(), None);
}

#[test]
fn connected_view_projects_snapshot() {
    let view = DerivedView::new(connected_snapshot(), Arc::new(ChainRegistry::builtin()));
    assert_eq!(view.selected_account(), Some("0xB"));
    assert_eq!(view.chain_name(), Some("Polygon Mainnet"));
    assert_eq!(view.native_currency().map(|c| c.symbol.as_str()), Some("MATIC"));
    assert_eq!(view.wallet_kind(), Some(WalletKind::MetaMask));

    let summary = view.summary();
    assert_eq!(summary.account_count, 2);
    assert_eq!(summary.selected_account.as_deref(), Some("0xB"));
    let json = serde_json::to_value(&summary).expect("serialize summary");
    assert_eq!(json["chain_id"], 137);
}

#[test]
fn wallet_kind_follows_marker_priority_and_is_stable() {
    let all = WalletMarkers {
        is_metamask: true,
        is_nifty_wallet: true,
        is_trust: true,
    };
    assert_eq!(WalletKind::classify(&all), WalletKind::MetaMask);
    let nifty_trust = WalletMarkers {
        is_nifty_wallet: true,
        is_trust: true,
        ..WalletMarkers::default()
    };
    assert_eq!(WalletKind::classify(&nifty_trust), WalletKind::Nifty);
    assert_eq!(WalletKind::classify(&nifty_trust), WalletKind::classify(&nifty_trust));
    let trust = WalletMarkers {
        is_trust: true,
        ..WalletMarkers::default()
    };
    assert_eq!(WalletKind::classify(&trust).to_string(), "Trust");
    assert_eq!(
        WalletKind::classify(&WalletMarkers::default()),
        WalletKind::Unknown
    );
}

#[test]
fn unknown_chain_yields_default_chain_data() {
    let mut snapshot = connected_snapshot();
    snapshot.chain_id = Some(4_242_424);
    let view = DerivedView::new(snapshot, Arc::new(ChainRegistry::builtin()));
    assert!(view.chain_data().is_empty());
    assert_eq!(view.native_currency(), None);
}
