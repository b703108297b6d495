//! # scol-config
//!
//! Network and wallet configuration, loaded from defaults, `scol.toml` and `SCOL_*` environment
//! variables.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

use figment::{
    Figment, Metadata, Profile, Provider,
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Map},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

pub use figment;

mod error;
pub use error::{ChainIdError, ExtractConfigError, FAILED_TO_EXTRACT_CONFIG_PANIC_MSG};

mod network;
pub use network::{
    AddChainParams, DEFAULT_CHAIN_ID, DEFAULT_CHAIN_NAME, DEFAULT_EXPLORER, DEFAULT_RPCS,
    NativeCurrency, NetworkConfig, parse_chain_id,
};

/// Wallet configuration.
///
/// # Defaults
///
/// [`Config::default()`] describes Scolcoin POA: the first of [`DEFAULT_RPCS`], the public
/// explorer and chain id `0xffaa`. [`Config::load()`] merges, in increasing priority:
///
///   * the defaults,
///   * `scol.toml` in the current directory, or the file named by `SCOL_CONFIG`,
///   * `SCOL_`-prefixed environment variables, e.g. `SCOL_RPC_URL`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The active JSON-RPC endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    /// Alternative endpoints offered to the user.
    pub rpc_urls: Vec<String>,
    /// Block explorer base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    pub chain_name: String,
    /// Chain id, hex (`0xffaa`) or decimal (`65450`).
    #[serde(deserialize_with = "deserialize_chain_id")]
    pub chain_id: String,
    pub native_currency: NativeCurrency,
    /// Number of explorer transactions to fetch. **(default: 20)**
    pub history_limit: usize,
    /// How long a notice stays visible, in milliseconds. **(default: 3500)**
    pub notice_ttl_ms: u64,
    /// Upper bound on the confirmation wait, in seconds.
    ///
    /// Unset means the wallet waits for the transport's confirmation signal indefinitely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_timeout: Option<u64>,
    /// Where the exported keystore bundle is kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let network = NetworkConfig::default();
        Self {
            rpc_url: network.rpc_url,
            rpc_urls: DEFAULT_RPCS.iter().map(|url| url.to_string()).collect(),
            explorer_url: network.explorer_url,
            chain_name: network.chain_name,
            chain_id: network.chain_id,
            native_currency: network.native_currency,
            history_limit: 20,
            notice_ttl_ms: 3500,
            confirmation_timeout: None,
            data_dir: None,
        }
    }
}

impl Config {
    /// The default config file name.
    pub const FILE_NAME: &'static str = "scol.toml";

    /// Name of the directory under the platform data dir.
    pub const DATA_DIR_NAME: &'static str = "scol-wallet";

    /// Returns the current `Config`.
    ///
    /// # Panics
    ///
    /// If extraction fails. For a version that doesn't panic, use [`Config::try_load()`].
    #[track_caller]
    pub fn load() -> Self {
        Self::from_provider(Self::figment())
    }

    /// Returns the current `Config`, or the extraction error.
    pub fn try_load() -> Result<Self, ExtractConfigError> {
        Self::try_from(Self::figment())
    }

    /// Extract a `Config` from `provider`, panicking if extraction fails.
    #[track_caller]
    pub fn from_provider<T: Provider>(provider: T) -> Self {
        trace!("load config with provider: {:?}", provider.metadata());
        Self::try_from(provider).unwrap_or_else(|err| panic!("{}", err))
    }

    /// Attempts to extract a `Config` from `provider`.
    pub fn try_from<T: Provider>(provider: T) -> Result<Self, ExtractConfigError> {
        Figment::from(provider).extract::<Self>().map_err(ExtractConfigError::new)
    }

    /// Returns the default figment: defaults, then the toml file, then the environment.
    pub fn figment() -> Figment {
        let file = std::env::var_os("SCOL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(Self::FILE_NAME));
        Figment::from(Self::default())
            .merge(Toml::file(file))
            .merge(Env::prefixed("SCOL_").ignore(&["CONFIG"]))
    }

    /// The network section of this config.
    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            rpc_url: self.rpc_url.clone(),
            explorer_url: self.explorer_url.clone(),
            chain_name: self.chain_name.clone(),
            chain_id: self.chain_id.clone(),
            native_currency: self.native_currency.clone(),
        }
    }

    /// Notice lifetime.
    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }

    /// Confirmation wait bound, if any.
    pub fn confirmation_timeout(&self) -> Option<Duration> {
        self.confirmation_timeout.map(Duration::from_secs)
    }

    /// Returns the data directory, falling back to `<platform data dir>/scol-wallet`.
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(|| dirs::data_dir().map(|dir| dir.join(Self::DATA_DIR_NAME)))
    }
}

/// Accepts the chain id as a string or as a bare integer (`chain_id = 65450`).
fn deserialize_chain_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ChainIdRepr {
        Number(u64),
        Text(String),
    }

    Ok(match ChainIdRepr::deserialize(deserializer)? {
        ChainIdRepr::Number(id) => id.to_string(),
        ChainIdRepr::Text(id) => id,
    })
}

impl Provider for Config {
    fn metadata(&self) -> Metadata {
        Metadata::named("Scol Config")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        Serialized::defaults(self).data()
    }
}
