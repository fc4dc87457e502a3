use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreAdapterConfig {
    pub rpc_url: Option<String>,
    /// Per-request timeout of the HTTP client. `None` waits indefinitely.
    pub rpc_timeout_ms: Option<u64>,
    pub injected_proxy_url: Option<String>,
    pub chains_path: Option<PathBuf>,
    pub preferred_account_index: usize,
}

impl StoreAdapterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        Self {
            rpc_url: text("EVM_STORES_RPC_URL"),
            rpc_timeout_ms: text("EVM_STORES_RPC_TIMEOUT_MS")
                .and_then(|raw| parse_number("EVM_STORES_RPC_TIMEOUT_MS", &raw)),
            injected_proxy_url: text("EVM_STORES_INJECTED_PROXY_URL"),
            chains_path: text("EVM_STORES_CHAINS_PATH").map(PathBuf::from),
            preferred_account_index: text("EVM_STORES_ACCOUNT_INDEX")
                .and_then(|raw| parse_number("EVM_STORES_ACCOUNT_INDEX", &raw))
                .unwrap_or_default(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = raw, "ignoring non-numeric setting");
            None
        }
    }
}
