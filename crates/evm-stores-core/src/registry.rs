use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::chain::ChainRegistry;
use crate::error::StoreError;
use crate::ports::AmbientEnvironment;
use crate::store::EvmStore;

pub const DEFAULT_STORE_NAME: &str = "default";

/// Named stores sharing one environment and one chain table. Owned by the
/// application's composition root.
pub struct StoreRegistry {
    environment: Arc<dyn AmbientEnvironment>,
    chains: Arc<ChainRegistry>,
    stores: RwLock<BTreeMap<String, EvmStore>>,
}

impl StoreRegistry {
    pub fn new(environment: Arc<dyn AmbientEnvironment>, chains: Arc<ChainRegistry>) -> Self {
        Self {
            environment,
            chains,
            stores: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registry with the `default` store already created.
    pub fn with_default(
        environment: Arc<dyn AmbientEnvironment>,
        chains: Arc<ChainRegistry>,
    ) -> Self {
        let registry = Self::new(environment, chains);
        registry.create(DEFAULT_STORE_NAME);
        registry
    }

    /// Creates a fresh store under `name`, replacing any previous one. The
    /// replaced store is not disconnected first; its listeners are detached
    /// when its last handle is dropped.
    pub fn create(&self, name: &str) -> EvmStore {
        let store = EvmStore::new(
            name,
            Arc::clone(&self.environment),
            Arc::clone(&self.chains),
        );
        let previous = self
            .stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_owned(), store.clone());
        if let Some(previous) = previous {
            tracing::warn!(
                store = name,
                was_connected = previous.snapshot().connected,
                "replacing existing store"
            );
        }
        store
    }

    pub fn get(&self, name: &str) -> Result<EvmStore, StoreError> {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownInstance(name.to_owned()))
    }

    pub fn default_store(&self) -> Result<EvmStore, StoreError> {
        self.get(DEFAULT_STORE_NAME)
    }

    pub fn remove(&self, name: &str) -> Option<EvmStore> {
        self.stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn chains(&self) -> &Arc<ChainRegistry> {
        &self.chains
    }
}
