use crate::{
    cmd::{
        chain::ChainArgs, history::HistoryArgs, keystore::KeystoreSubcommand, send::SendArgs,
        token::TokenArgs, wallet::BalanceArgs,
    },
    utils::prompt_secret,
};
use alloy_primitives::Address;
use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use scol_config::{
    Config,
    figment::{
        self, Metadata, Profile, Provider,
        value::{Dict, Map, Value},
    },
};
use scol_wallets::{FileKeystoreStore, KeystoreStore, Wallet, WalletSession, utils::read_phrase};
use std::path::PathBuf;

/// Non-custodial wallet for Scolcoin POA and other EVM networks.
#[derive(Debug, Parser)]
#[command(name = "scol", version, next_display_order = None)]
pub struct Scol {
    #[command(flatten)]
    pub network: NetworkOpts,

    #[command(subcommand)]
    pub cmd: ScolSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ScolSubcommand {
    /// Generate a new wallet and print its address, key and recovery phrase.
    #[command(visible_alias = "n")]
    New {
        /// Print the wallet as JSON.
        #[arg(long, short)]
        json: bool,
    },

    /// Print the address of the configured wallet.
    #[command(visible_alias = "a")]
    Address {
        #[command(flatten)]
        wallet: WalletOpts,
    },

    /// Print the native balance, and optionally token balances.
    #[command(visible_alias = "b")]
    Balance(BalanceArgs),

    /// Send the native currency or an ERC-20 token and wait for the confirmation.
    #[command(visible_alias = "s")]
    Send(SendArgs),

    /// Read an ERC-20 token's metadata and the wallet's balance of it.
    #[command(visible_alias = "t")]
    Token(TokenArgs),

    /// Print the wallet's recent transactions from the explorer.
    #[command(visible_alias = "h")]
    History(HistoryArgs),

    /// Export or import encrypted keystore bundles.
    #[command(visible_alias = "k")]
    Keystore {
        #[command(subcommand)]
        command: KeystoreSubcommand,
    },

    /// Print the `wallet_addEthereumChain` parameters of the network, or request it.
    Chain(ChainArgs),
}

/// Network overrides, merged over `scol.toml` and the `SCOL_*` environment.
#[derive(Clone, Debug, Default, Parser)]
#[command(next_help_heading = "Network options")]
pub struct NetworkOpts {
    /// The JSON-RPC endpoint.
    #[arg(long, short, global = true, value_name = "URL", env = "SCOL_RPC_URL")]
    pub rpc_url: Option<String>,

    /// The block explorer base URL.
    #[arg(long, global = true, value_name = "URL")]
    pub explorer_url: Option<String>,

    /// The chain id, hex or decimal.
    #[arg(long, global = true, value_name = "CHAIN_ID")]
    pub chain_id: Option<String>,

    /// Where the exported keystore is kept.
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
}

impl NetworkOpts {
    /// Loads the config with these options merged on top.
    pub fn load_config(&self) -> Result<Config> {
        Ok(Config::try_from(Config::figment().merge(self))?)
    }

    pub fn dict(&self) -> Dict {
        let mut dict = Dict::new();
        if let Some(url) = &self.rpc_url {
            dict.insert("rpc_url".into(), url.clone().into());
        }
        if let Some(url) = &self.explorer_url {
            dict.insert("explorer_url".into(), url.clone().into());
        }
        if let Some(chain_id) = &self.chain_id {
            dict.insert("chain_id".into(), chain_id.clone().into());
        }
        if let Some(dir) = &self.data_dir {
            dict.insert("data_dir".into(), Value::from(dir.display().to_string()));
        }
        dict
    }
}

impl Provider for NetworkOpts {
    fn metadata(&self) -> Metadata {
        Metadata::named("NetworkOpts")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        Ok(Map::from([(Profile::Default, self.dict())]))
    }
}

/// Where the signing key comes from.
///
/// Exactly one of a private key, a mnemonic, a keystore file or the saved keystore.
#[derive(Clone, Debug, Default, Parser)]
#[command(next_help_heading = "Wallet options")]
pub struct WalletOpts {
    /// Use the provided private key.
    #[arg(long, value_name = "RAW_PRIVATE_KEY", env = "SCOL_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Use the mnemonic phrase, or the mnemonic file at the specified path.
    #[arg(long, alias = "mnemonic-path", conflicts_with = "private_key")]
    pub mnemonic: Option<String>,

    /// Use the keystore bundle or encrypted keystore at the specified path.
    #[arg(long, value_name = "PATH", conflicts_with_all = ["private_key", "mnemonic"])]
    pub keystore: Option<PathBuf>,

    /// Use the keystore saved by the last `scol keystore export`.
    #[arg(long, conflicts_with_all = ["private_key", "mnemonic", "keystore"])]
    pub saved: bool,

    /// The keystore password. Prompted for when omitted.
    #[arg(long, value_name = "PASSWORD", env = "SCOL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Open an interactive prompt to enter your private key.
    #[arg(long, short)]
    pub interactive: bool,
}

/// A resolved [`WalletOpts`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credential {
    PrivateKey(String),
    Phrase(String),
    Keystore { json: String, password: String },
}

impl WalletOpts {
    /// Reads the key material these options point at, prompting for secrets as needed.
    pub fn credential(&self, config: &Config) -> Result<Credential> {
        if let Some(key) = &self.private_key {
            return Ok(Credential::PrivateKey(key.clone()));
        }
        if let Some(mnemonic) = &self.mnemonic {
            let phrase = read_phrase(mnemonic).wrap_err("failed to read mnemonic")?;
            return Ok(Credential::Phrase(phrase.trim().to_string()));
        }
        if let Some(path) = &self.keystore {
            let json = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read keystore {}", path.display()))?;
            return Ok(Credential::Keystore { json, password: self.password()? });
        }
        if self.saved {
            let dir = config.data_dir().ok_or_else(|| eyre::eyre!("no data directory"))?;
            let store = FileKeystoreStore::new(dir);
            let json = store.load()?.ok_or_else(|| {
                eyre::eyre!("no keystore saved in {}", store.path().display())
            })?;
            return Ok(Credential::Keystore { json, password: self.password()? });
        }
        if self.interactive {
            return Ok(Credential::PrivateKey(prompt_secret("Enter private key: ")?));
        }
        eyre::bail!(
            "no wallet configured; use --private-key, --mnemonic, --keystore, --saved or --interactive"
        )
    }

    fn password(&self) -> Result<String> {
        match &self.password {
            Some(password) => Ok(password.clone()),
            None => prompt_secret("Enter keystore password: "),
        }
    }

    /// Opens the session offline, without touching the network.
    pub async fn session(&self, config: &Config) -> Result<WalletSession> {
        Ok(match self.credential(config)? {
            Credential::PrivateKey(key) => WalletSession::from_private_key(&key)?,
            Credential::Phrase(phrase) => WalletSession::from_phrase(&phrase)?,
            Credential::Keystore { json, password } => {
                WalletSession::from_keystore(&json, &password).await?
            }
        })
    }

    /// Makes the credential the active session of `wallet`.
    pub async fn install(&self, wallet: &Wallet, config: &Config) -> Result<Address> {
        Ok(match self.credential(config)? {
            Credential::PrivateKey(key) => wallet.import_private_key(&key).await?,
            Credential::Phrase(phrase) => wallet.import_phrase(&phrase).await?,
            Credential::Keystore { json, password } => {
                wallet.import_keystore(&json, &password).await?
            }
        })
    }
}
