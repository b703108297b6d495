//! Selectable network settings.

use crate::error::ChainIdError;
use serde::{Deserialize, Serialize};

/// The public Scolcoin POA RPC endpoints, in order of preference.
pub const DEFAULT_RPCS: [&str; 3] =
    ["https://mainnet-rpc.scolcoin.com", "https://mainrpc.scolcoin.com", "https://seed.scolcoin.com"];

/// Blockscout instance indexing Scolcoin POA.
pub const DEFAULT_EXPLORER: &str = "https://explorador.scolcoin.com";

/// Display name of the default chain.
pub const DEFAULT_CHAIN_NAME: &str = "Scolcoin POA";

/// Chain id of Scolcoin POA (65450).
pub const DEFAULT_CHAIN_ID: u64 = 65450;

/// Native currency descriptor, as used by `wallet_addEthereumChain`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Default for NativeCurrency {
    fn default() -> Self {
        Self { name: "Scolcoin".to_string(), symbol: "SCOL".to_string(), decimals: 18 }
    }
}

/// The network the wallet talks to.
///
/// Every field is user editable. The chain id is kept as entered, hex or decimal, and is only
/// interpreted when it is needed (see [`parse_chain_id`]).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint. `None` or blank means the network is not configured.
    pub rpc_url: Option<String>,
    /// Block explorer base URL.
    pub explorer_url: Option<String>,
    pub chain_name: String,
    /// Chain id as entered, e.g. `0xffaa` or `65450`.
    pub chain_id: String,
    pub native_currency: NativeCurrency,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: Some(DEFAULT_RPCS[0].to_string()),
            explorer_url: Some(DEFAULT_EXPLORER.to_string()),
            chain_name: DEFAULT_CHAIN_NAME.to_string(),
            chain_id: format!("{DEFAULT_CHAIN_ID:#x}"),
            native_currency: NativeCurrency::default(),
        }
    }
}

impl NetworkConfig {
    /// Returns the RPC endpoint if one is configured.
    pub fn rpc_url(&self) -> Option<&str> {
        non_blank(self.rpc_url.as_deref())
    }

    /// Returns the explorer base URL without a trailing slash.
    pub fn explorer_base(&self) -> Option<&str> {
        non_blank(self.explorer_url.as_deref()).map(|url| url.trim_end_matches('/'))
    }

    /// Parses the configured chain id.
    pub fn chain_id(&self) -> Result<u64, ChainIdError> {
        parse_chain_id(&self.chain_id)
    }

    /// Builds the `wallet_addEthereumChain` parameter object (EIP-3085) for this network.
    pub fn add_chain_params(&self) -> Result<AddChainParams, ChainIdError> {
        Ok(AddChainParams {
            chain_id: format!("{:#x}", self.chain_id()?),
            chain_name: self.chain_name.clone(),
            native_currency: self.native_currency.clone(),
            rpc_urls: self.rpc_url().map(str::to_string).into_iter().collect(),
            block_explorer_urls: non_blank(self.explorer_url.as_deref())
                .map(str::to_string)
                .into_iter()
                .collect(),
        })
    }
}

/// Parameters of a `wallet_addEthereumChain` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParams {
    /// Hex encoded chain id, `0x` prefixed.
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

/// Parses a chain id given either as `0x` prefixed hex or as a decimal number.
pub fn parse_chain_id(s: &str) -> Result<u64, ChainIdError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ChainIdError::Empty);
    }
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| ChainIdError::Invalid(s.to_string()))
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
