mod common;

use common::{chains, wallet, ACCOUNT_A, ACCOUNT_B};
use evm_stores_adapters::StaticEnvironment;
use evm_stores_core::{ProviderSource, StoreError, StoreRegistry, DEFAULT_STORE_NAME};

fn registry() -> StoreRegistry {
    let env = StaticEnvironment::new()
        .with_injected(wallet(1, &[ACCOUNT_A]))
        .into_shared();
    StoreRegistry::with_default(env, chains())
}

#[tokio::test]
async fn instances_are_independent() {
    let registry = registry();
    let main = registry.default_store().expect("default store");
    let side = registry.create("side");
    assert_eq!(registry.names(), vec![DEFAULT_STORE_NAME.to_owned(), "side".to_owned()]);

    main.set_browser_provider(0).await.expect("main connect");
    side.set_provider(ProviderSource::provider(wallet(137, &[ACCOUNT_B])), 0)
        .await
        .expect("side connect");

    assert_eq!(main.snapshot().chain_id, Some(1));
    assert_eq!(side.snapshot().chain_id, Some(137));

    side.disconnect().await;
    assert!(main.snapshot().connected);
    assert!(!registry.get("side").expect("side").snapshot().connected);
}

#[test]
fn unknown_instance_is_an_error() {
    let registry = registry();
    let err = registry.get("missing").expect_err("missing store");
    assert!(matches!(err, StoreError::UnknownInstance(ref name) if name == "missing"));
    assert!(registry.remove("missing").is_none());
}

#[tokio::test]
async fn recreating_an_instance_starts_fresh() {
    let provider = wallet(1, &[ACCOUNT_A]);
    let env = StaticEnvironment::new()
        .with_injected(provider.clone())
        .into_shared();
    let registry = StoreRegistry::new(env, chains());

    let first = registry.create("app");
    first.set_browser_provider(0).await.expect("connect");
    assert_eq!(provider.listener_count(), 3);
    drop(first);

    let second = registry.create("app");
    assert!(!second.snapshot().connected);
    assert_eq!(registry.names(), vec!["app".to_owned()]);
    // the replaced store's last handle went away with the map entry
    assert_eq!(provider.listener_count(), 0);
}

#[test]
fn stores_share_the_chain_table() {
    let registry = registry();
    let store = registry.create("shared");
    assert!(std::sync::Arc::ptr_eq(store.chains(), registry.chains()));
    assert_eq!(store.name(), "shared");
}
