use evm_stores_core::{ChainRegistry, PortError};

use crate::StoreAdapterConfig;

/// Reads the configured dataset, or falls back to the built-in one.
pub fn load_chain_registry(config: &StoreAdapterConfig) -> Result<ChainRegistry, PortError> {
    let Some(path) = config.chains_path.as_ref() else {
        return Ok(ChainRegistry::builtin());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|e| PortError::NotFound(format!("{}: {e}", path.display())))?;
    let chains = ChainRegistry::from_json_str(&raw)?;
    tracing::info!(path = %path.display(), chains = chains.len(), "loaded chain dataset");
    Ok(chains)
}
