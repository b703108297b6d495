//! The active wallet identity.

use crate::{
    error::WalletError,
    keystore,
    utils::{create_mnemonic_signer, create_private_key_signer, normalize_phrase, random_phrase},
};
use alloy_primitives::{Address, U256, hex, utils::format_units};
use alloy_signer_local::PrivateKeySigner;
use std::fmt;

/// A cached balance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Balance {
    /// Not fetched yet, or the fetch failed before any value was known.
    #[default]
    Unknown,
    Known(U256),
}

impl Balance {
    pub fn value(&self) -> Option<U256> {
        match self {
            Self::Unknown => None,
            Self::Known(value) => Some(*value),
        }
    }

    /// Formats the balance with `decimals` decimals, `-` when unknown.
    pub fn format(&self, decimals: u8) -> String {
        match self {
            Self::Unknown => "-".to_string(),
            Self::Known(value) => {
                format_units(*value, decimals).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(18))
    }
}

/// How a session was established.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionSource {
    Random,
    Phrase,
    PrivateKey,
    Keystore,
}

/// A keypair-derived identity plus its cached native balance.
///
/// The private key determines the address. The recovery phrase is only known for sessions
/// created randomly or imported from a phrase.
#[derive(Clone)]
pub struct WalletSession {
    signer: PrivateKeySigner,
    phrase: Option<String>,
    source: SessionSource,
    balance: Balance,
}

impl fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSession")
            .field("address", &self.address())
            .field("source", &self.source)
            .field("balance", &self.balance)
            .finish_non_exhaustive()
    }
}

impl WalletSession {
    fn new(signer: PrivateKeySigner, phrase: Option<String>, source: SessionSource) -> Self {
        Self { signer, phrase, source, balance: Balance::Unknown }
    }

    /// Generates a fresh 12-word phrase and derives the first account from it.
    pub fn create_random() -> Result<Self, WalletError> {
        let phrase = random_phrase()?;
        let signer = create_mnemonic_signer(&phrase)?;
        Ok(Self::new(signer, Some(phrase), SessionSource::Random))
    }

    /// Imports a recovery phrase, tolerating case and whitespace differences.
    pub fn from_phrase(phrase: &str) -> Result<Self, WalletError> {
        let phrase = normalize_phrase(phrase);
        let signer = create_mnemonic_signer(&phrase)?;
        Ok(Self::new(signer, Some(phrase), SessionSource::Phrase))
    }

    /// Imports a raw private key, with or without the `0x` prefix.
    pub fn from_private_key(key: &str) -> Result<Self, WalletError> {
        let signer = create_private_key_signer(key)?;
        Ok(Self::new(signer, None, SessionSource::PrivateKey))
    }

    /// Decrypts a keystore bundle or a bare Web3 Secret Storage document.
    pub async fn from_keystore(json: &str, password: &str) -> Result<Self, WalletError> {
        let signer = keystore::decrypt(json, password).await?;
        Ok(Self::new(signer, None, SessionSource::Keystore))
    }

    /// The checksummed account address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// The `0x` prefixed private key.
    pub fn private_key(&self) -> String {
        hex::encode_prefixed(self.signer.to_bytes())
    }

    pub fn recovery_phrase(&self) -> Option<&str> {
        self.phrase.as_deref()
    }

    pub fn source(&self) -> SessionSource {
        self.source
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }

    pub(crate) fn set_balance(&mut self, balance: Balance) {
        self.balance = balance;
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}
