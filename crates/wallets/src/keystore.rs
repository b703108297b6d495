//! Password-encrypted keystore bundles and their local storage.

use crate::error::{MIN_PASSWORD_LEN, WalletError};
use alloy_primitives::B256;
use alloy_signer_local::PrivateKeySigner;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

/// `type` tag of keystore bundles.
pub const KEYSTORE_BUNDLE_TYPE: &str = "scol-wallet-keystore";

/// Current bundle format version.
pub const KEYSTORE_BUNDLE_VERSION: u32 = 1;

/// Fixed key the most recent bundle is stored under.
pub const KEYSTORE_STORAGE_KEY: &str = "scol_keystore_json";

/// Prefix of exported bundle file names.
pub const KEYSTORE_FILE_PREFIX: &str = "scolwallet";

const STAGING_FILE: &str = "keystore.json";

/// A Web3 Secret Storage document wrapped with wallet metadata.
///
/// `address` is informational; only decryption determines the identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystoreBundle {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub chain_id: Option<u64>,
    pub address: String,
    pub keystore: Value,
}

impl KeystoreBundle {
    pub fn new(chain_id: Option<u64>, address: String, keystore: Value) -> Self {
        Self {
            kind: KEYSTORE_BUNDLE_TYPE.to_string(),
            version: KEYSTORE_BUNDLE_VERSION,
            created_at: Utc::now(),
            chain_id,
            address,
            keystore,
        }
    }

    /// Download name: `scolwallet-{first 8 chars of the address}.json`.
    pub fn file_name(&self) -> String {
        let prefix = self.address.get(..8).unwrap_or(&self.address);
        format!("{KEYSTORE_FILE_PREFIX}-{prefix}.json")
    }
}

/// The result of an export: the stored bundle and its downloadable form.
#[derive(Clone, Debug)]
pub struct KeystoreExport {
    pub bundle: KeystoreBundle,
    /// Pretty-printed bundle.
    pub json: String,
    pub file_name: String,
}

/// Checks an export password and its confirmation, returning the trimmed password.
pub fn validate_export_password<'a>(
    password: &'a str,
    confirm: Option<&str>,
) -> Result<&'a str, WalletError> {
    let trimmed = password.trim();
    if trimmed.chars().count() < MIN_PASSWORD_LEN {
        return Err(WalletError::WeakPassword);
    }
    if confirm.is_some_and(|confirm| confirm.trim() != trimmed) {
        return Err(WalletError::PasswordMismatch);
    }
    Ok(trimmed)
}

/// Encrypts the signer's key under `password`, returning the Web3 Secret Storage document.
pub async fn encrypt(signer: &PrivateKeySigner, password: &str) -> Result<Value, WalletError> {
    let key = signer.to_bytes();
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let dir = tempfile::tempdir()?;
        let mut rng = rand_08::thread_rng();
        eth_keystore::encrypt_key(dir.path(), &mut rng, key, password, Some(STAGING_FILE))
            .map_err(|err| WalletError::Keystore(err.to_string()))?;
        let json = fs::read_to_string(dir.path().join(STAGING_FILE))?;
        Ok(serde_json::from_str(&json)?)
    })
    .await
    .map_err(|err| WalletError::Keystore(err.to_string()))?
}

/// Decrypts a bundle, or a bare encrypted document, with `password`.
pub async fn decrypt(json: &str, password: &str) -> Result<PrivateKeySigner, WalletError> {
    if json.trim().is_empty() {
        return Err(WalletError::EmptyKeystore);
    }
    let password = password.trim();
    if password.is_empty() {
        return Err(WalletError::EmptyPassword);
    }

    let payload = unwrap_payload(json);
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(STAGING_FILE);
        fs::write(&path, payload)?;
        let key = eth_keystore::decrypt_key(&path, password).map_err(|err| {
            debug!(%err, "keystore decryption failed");
            WalletError::DecryptionFailed
        })?;
        if key.len() != 32 {
            return Err(WalletError::DecryptionFailed);
        }
        PrivateKeySigner::from_bytes(&B256::from_slice(&key))
            .map_err(|_| WalletError::DecryptionFailed)
    })
    .await
    .map_err(|err| WalletError::Keystore(err.to_string()))?
}

/// Extracts the encrypted document: the bundle's `keystore` if present, else the input itself.
fn unwrap_payload(json: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<Value>(json) else {
        trace!("keystore input is not JSON");
        return json.to_string();
    };
    let payload = match parsed {
        Value::Object(mut obj) => match obj.remove("keystore") {
            Some(keystore) => keystore,
            None => Value::Object(obj),
        },
        other => other,
    };
    match payload {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Durable storage holding at most one keystore bundle.
pub trait KeystoreStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, WalletError>;

    /// Stores `json`, replacing any previous bundle.
    fn save(&self, json: &str) -> Result<(), WalletError>;
}

/// Stores the bundle as `scol_keystore_json.json` in a directory.
#[derive(Clone, Debug)]
pub struct FileKeystoreStore {
    path: PathBuf,
}

impl FileKeystoreStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { path: dir.as_ref().join(format!("{KEYSTORE_STORAGE_KEY}.json")) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeystoreStore for FileKeystoreStore {
    fn load(&self) -> Result<Option<String>, WalletError> {
        match fs::read_to_string(&self.path) {
            Ok(json) => Ok(Some(json)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, json: &str) -> Result<(), WalletError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), "saved keystore bundle");
        Ok(())
    }
}

/// In-memory [`KeystoreStore`]. Clones share the slot.
#[derive(Clone, Debug, Default)]
pub struct MemoryKeystoreStore(Arc<Mutex<Option<String>>>);

impl KeystoreStore for MemoryKeystoreStore {
    fn load(&self) -> Result<Option<String>, WalletError> {
        Ok(self.0.lock().clone())
    }

    fn save(&self, json: &str) -> Result<(), WalletError> {
        *self.0.lock() = Some(json.to_string());
        Ok(())
    }
}
