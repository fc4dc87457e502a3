//! Chain id normalization and the static chain metadata table.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ports::PortError;

const BUILTIN_CHAINS: &str = include_str!("../data/chains.json");

/// Chain id as handed over by a provider: EIP-1193 wallets report a hex
/// quantity, RPC clients usually a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainIdRaw {
    Number(u64),
    Text(String),
}

impl ChainIdRaw {
    pub fn normalize(&self) -> Result<u64, PortError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => parse_chain_id_str(s),
        }
    }
}

impl From<u64> for ChainIdRaw {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ChainIdRaw {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ChainIdRaw {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for ChainIdRaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

pub fn parse_chain_id_str(raw: &str) -> Result<u64, PortError> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
            .map_err(|e| PortError::Validation(format!("invalid hex chain id {raw:?}: {e}")))
    } else {
        raw.parse()
            .map_err(|e| PortError::Validation(format!("invalid chain id {raw:?}: {e}")))
    }
}

pub fn json_chain_id(value: &Value) -> Result<ChainIdRaw, PortError> {
    if let Some(n) = value.as_u64() {
        return Ok(ChainIdRaw::Number(n));
    }
    value
        .as_str()
        .map(|s| ChainIdRaw::Text(s.to_owned()))
        .ok_or_else(|| PortError::Validation("chain id must be string or number".to_owned()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Explorer {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub standard: String,
}

/// One entry of a chainid.network style dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChainData {
    pub chain_id: u64,
    pub name: String,
    pub chain: String,
    pub short_name: String,
    pub network_id: u64,
    pub native_currency: NativeCurrency,
    pub rpc: Vec<String>,
    pub faucets: Vec<String>,
    #[serde(rename = "infoURL")]
    pub info_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub explorers: Vec<Explorer>,
}

impl ChainData {
    /// True for the record returned when a chain is not in the table.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Read-only chain metadata table, shared across every store.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: Vec<ChainData>,
    by_id: HashMap<u64, usize>,
    empty: ChainData,
}

impl ChainRegistry {
    pub fn from_records(records: Vec<ChainData>) -> Self {
        let mut by_id = HashMap::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            // first definition wins on duplicate ids
            by_id.entry(record.chain_id).or_insert(idx);
        }
        Self {
            chains: records,
            by_id,
            empty: ChainData::default(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, PortError> {
        let records: Vec<ChainData> = serde_json::from_str(raw)
            .map_err(|e| PortError::Validation(format!("invalid chain dataset: {e}")))?;
        Ok(Self::from_records(records))
    }

    /// Table compiled into the crate.
    pub fn builtin() -> Self {
        Self::from_json_str(BUILTIN_CHAINS).expect("valid built-in chain dataset")
    }

    pub fn lookup(&self, chain_id: u64) -> &ChainData {
        self.by_id
            .get(&chain_id)
            .and_then(|idx| self.chains.get(*idx))
            .unwrap_or(&self.empty)
    }

    /// Lookup for ids still in provider form. Unparseable ids resolve to the
    /// empty record like unknown ones.
    pub fn lookup_raw(&self, chain_id: &ChainIdRaw) -> &ChainData {
        match chain_id.normalize() {
            Ok(id) => self.lookup(id),
            Err(_) => &self.empty,
        }
    }

    pub fn empty_record(&self) -> &ChainData {
        &self.empty
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainData> {
        self.chains.iter()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
