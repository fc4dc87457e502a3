mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{metamask, store_with_browser, wait_for, wallet, ACCOUNT_A, ACCOUNT_B, ACCOUNT_C};
use evm_stores_core::{ConnectionStatus, PartialUpdate, ProviderEventKind, ProviderSource};

#[tokio::test]
async fn chain_changed_event_updates_view() {
    let provider = metamask(1, &[ACCOUNT_A]);
    let store = store_with_browser("chain-event", provider.clone());
    store.set_browser_provider(0).await.expect("connect");
    let mut rx = store.watch();

    provider.debug_inject_chain_changed("0x2105").expect("inject");
    let snapshot = wait_for(&mut rx, |s| s.chain_id == Some(8453)).await;
    assert!(snapshot.connected);
    assert_eq!(snapshot.accounts, vec![ACCOUNT_A.to_owned()]);
    assert_eq!(store.view().chain_name(), Some("Base"));
}

#[tokio::test]
async fn accounts_changed_event_resets_selection() {
    let provider = wallet(1, &[ACCOUNT_A, ACCOUNT_B]);
    let store = store_with_browser("accounts-event", provider.clone());
    store.set_browser_provider(1).await.expect("connect");
    assert_eq!(store.view().selected_account(), Some(ACCOUNT_B));
    let mut rx = store.watch();

    provider
        .debug_inject_accounts_changed([ACCOUNT_C, ACCOUNT_A])
        .expect("inject");
    let snapshot = wait_for(&mut rx, |s| s.accounts.first().map(String::as_str) == Some(ACCOUNT_C)).await;
    assert_eq!(snapshot.selected_index, 0);
    assert_eq!(snapshot.chain_id, Some(1));
}

#[tokio::test]
async fn provider_disconnect_event_tears_down() {
    let provider = wallet(1, &[ACCOUNT_A]);
    let store = store_with_browser("dropped", provider.clone());
    store.set_browser_provider(0).await.expect("connect");
    let mut rx = store.watch();

    provider.debug_inject_disconnect(Some("wallet locked"));
    let snapshot = wait_for(&mut rx, |s| !s.connected).await;
    assert_eq!(snapshot.status, ConnectionStatus::Disconnected);
    assert!(snapshot.accounts.is_empty());
    assert_eq!(provider.listener_count(), 0);
    assert_eq!(store.attached_listeners(), 0);
}

#[tokio::test]
async fn listeners_do_not_accumulate_across_reconnects() {
    let provider = wallet(1, &[ACCOUNT_A]);
    let store = store_with_browser("cycles", provider.clone());

    for _ in 0..3 {
        store.set_browser_provider(0).await.expect("connect");
        assert_eq!(provider.listener_count(), 3);
        for kind in ProviderEventKind::ALL {
            assert_eq!(provider.listener_count_for(kind), 1);
        }
        assert_eq!(store.attached_listeners(), 3);
    }

    store.disconnect().await;
    assert_eq!(provider.listener_count(), 0);
    assert_eq!(store.attached_listeners(), 0);
}

#[tokio::test]
async fn replaced_provider_events_are_ignored() {
    let old = wallet(1, &[ACCOUNT_A]);
    let store = store_with_browser("stale", old.clone());
    store.set_browser_provider(0).await.expect("first");

    let new = wallet(137, &[ACCOUNT_B]);
    store
        .set_provider(ProviderSource::provider(new.clone()), 0)
        .await
        .expect("second");
    let revision = store.snapshot().revision;

    old.debug_inject_chain_changed(56u64).expect("inject");
    old.debug_inject_disconnect(None);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = store.snapshot();
    assert_eq!(snapshot.revision, revision);
    assert_eq!(snapshot.chain_id, Some(137));
    assert!(snapshot.connected);
}

#[tokio::test]
async fn manual_update_fills_missing_pieces_from_provider() {
    let provider = wallet(1, &[ACCOUNT_A]);
    let store = store_with_browser("manual", provider.clone());
    assert!(!store.on_accounts_or_chain_changed(PartialUpdate::chain_id(10u64)).await);

    store.set_browser_provider(0).await.expect("connect");
    provider
        .debug_inject_accounts_changed([ACCOUNT_B])
        .expect("inject");
    // drain the event the injection produced
    let mut rx = store.watch();
    wait_for(&mut rx, |s| s.accounts == vec![ACCOUNT_B.to_owned()]).await;

    provider.debug_fail_accounts(true);
    assert!(store.on_accounts_or_chain_changed(PartialUpdate::chain_id("0x89")).await);
    let snapshot = store.snapshot();
    assert_eq!(snapshot.chain_id, Some(137));
    assert_eq!(snapshot.accounts, vec![ACCOUNT_B.to_owned()]);
}

#[tokio::test]
async fn malformed_chain_event_keeps_previous_chain() {
    let provider = wallet(1, &[ACCOUNT_A]);
    let store = store_with_browser("malformed", provider.clone());
    store.set_browser_provider(0).await.expect("connect");

    assert!(store.on_accounts_or_chain_changed(PartialUpdate::chain_id("0xzz")).await);
    assert_eq!(store.snapshot().chain_id, Some(1));
    assert!(store.snapshot().connected);
}

#[tokio::test]
async fn observers_see_increasing_revisions() {
    let provider = wallet(1, &[ACCOUNT_A]);
    let store = store_with_browser("observed", provider.clone());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    store.subscribe(move |view| {
        sink.lock()
            .expect("observer log")
            .push((view.snapshot().revision, view.connected()));
    });

    store.init().expect("init");
    store.set_browser_provider(0).await.expect("connect");
    store.disconnect().await;

    let seen = seen.lock().expect("observer log").clone();
    assert_eq!(seen.first(), Some(&(0, false)));
    assert!(seen.windows(2).all(|w| w[0].0 < w[1].0));
    assert!(seen.iter().any(|(_, connected)| *connected));
    assert_eq!(seen.last().map(|(_, connected)| *connected), Some(false));
}

#[tokio::test]
async fn panicking_observer_does_not_break_connect() {
    let store = store_with_browser("panicky", wallet(1, &[ACCOUNT_A]));
    let calm = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&calm);

    let noisy = store.subscribe(|view| {
        if view.connected() {
            panic!("observer failure");
        }
    });
    store.subscribe(move |_| {
        *counter.lock().expect("counter") += 1;
    });

    store.set_browser_provider(0).await.expect("connect survives observer panic");
    assert!(store.snapshot().connected);
    assert!(*calm.lock().expect("counter") >= 2);

    assert!(store.unsubscribe(noisy));
    assert!(!store.unsubscribe(noisy));
    assert_eq!(store.subscriber_count(), 1);
}
