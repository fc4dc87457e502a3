//! evm-stores: connect the default store to an EVM provider and print the
//! derived view.
//!
//! Usage: `evm-stores [ENDPOINT]`. Without an endpoint argument the
//! `EVM_STORES_RPC_URL` setting is used, and without that the injected
//! wallet proxy (`EVM_STORES_INJECTED_PROXY_URL`).

use std::sync::Arc;

use evm_stores_adapters::{load_chain_registry, StaticEnvironment, StoreAdapterConfig};
use evm_stores_core::{ProviderSource, StoreRegistry};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = StoreAdapterConfig::from_env();
    let endpoint = std::env::args().nth(1).or_else(|| config.rpc_url.clone());

    let chains = Arc::new(load_chain_registry(&config)?);
    let environment = StaticEnvironment::from_config(&config)?.into_shared();
    let registry = StoreRegistry::with_default(environment, chains);
    let store = registry.default_store()?;

    store.subscribe(|view| {
        tracing::info!(
            status = ?view.status(),
            chain_id = ?view.chain_id(),
            account = ?view.selected_account(),
            "store changed"
        );
    });
    store.init()?;

    let source = endpoint.map(ProviderSource::from).unwrap_or_default();
    tracing::info!(?source, "connecting");
    let report = store
        .set_provider(source, config.preferred_account_index)
        .await?;
    for warning in &report.warnings {
        tracing::warn!(%warning, "connected with warning");
    }

    println!("{}", serde_json::to_string_pretty(&store.view().summary())?);

    store.close().await;
    Ok(())
}
