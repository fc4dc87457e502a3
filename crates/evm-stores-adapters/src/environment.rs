use std::sync::Arc;

use evm_stores_core::{AmbientEnvironment, EndpointConnector, PortError, ProviderPort};

use crate::{Eip1193Adapter, JsonRpcConnector, StoreAdapterConfig};

/// Fixed answers to the store's environment lookups.
#[derive(Clone, Default)]
pub struct StaticEnvironment {
    connector: Option<Arc<dyn EndpointConnector>>,
    injected: Option<Arc<dyn ProviderPort>>,
}

impl StaticEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP connector always; an injected wallet only when a proxy URL is
    /// configured.
    pub fn from_config(config: &StoreAdapterConfig) -> Result<Self, PortError> {
        let mut env = Self::new().with_connector(JsonRpcConnector::with_config(config)?);
        if config.injected_proxy_url.is_some() {
            env = env.with_injected(Eip1193Adapter::with_config(config)?);
        }
        Ok(env)
    }

    pub fn with_connector(mut self, connector: impl EndpointConnector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    pub fn with_injected(mut self, provider: impl ProviderPort + 'static) -> Self {
        self.injected = Some(Arc::new(provider));
        self
    }

    pub fn into_shared(self) -> Arc<dyn AmbientEnvironment> {
        Arc::new(self)
    }
}

impl AmbientEnvironment for StaticEnvironment {
    fn connector(&self) -> Option<Arc<dyn EndpointConnector>> {
        self.connector.clone()
    }

    fn injected_provider(&self) -> Option<Arc<dyn ProviderPort>> {
        self.injected.clone()
    }
}
