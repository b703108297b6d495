use alloy_primitives::Address;
use scol_config::ChainIdError;

/// Minimum keystore password length, counted after trimming.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Fallback shown when the transport failed without a usable message.
pub const GENERIC_TRANSPORT_ERROR: &str = "the network request failed";

/// An error reported by the RPC transport or the contract layer.
///
/// The transport's own message is kept verbatim when it has one.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{}", .message.as_deref().unwrap_or(GENERIC_TRANSPORT_ERROR))]
pub struct TransportError {
    message: Option<String>,
}

impl TransportError {
    /// Creates an error carrying `message`. Blank messages are treated as absent.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = message.trim();
        Self { message: (!message.is_empty()).then(|| message.to_string()) }
    }

    /// An error without a message.
    pub fn opaque() -> Self {
        Self { message: None }
    }

    /// The transport's message, if it provided one.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl From<alloy_transport::TransportError> for TransportError {
    fn from(err: alloy_transport::TransportError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<alloy_contract::Error> for TransportError {
    fn from(err: alloy_contract::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<alloy_provider::PendingTransactionError> for TransportError {
    fn from(err: alloy_provider::PendingTransactionError) -> Self {
        Self::new(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("invalid mnemonic phrase")]
    InvalidMnemonic,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("failed to decrypt keystore: incorrect password or malformed keystore")]
    DecryptionFailed,
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
    #[error("invalid recipient address `{0}`")]
    InvalidRecipient(String),
    #[error("invalid amount `{0}`")]
    InvalidAmount(String),
    #[error("password must be at least {MIN_PASSWORD_LEN} characters long")]
    WeakPassword,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("keystore password is empty")]
    EmptyPassword,
    #[error("no keystore provided")]
    EmptyKeystore,
    #[error("could not read token metadata for {address}: {source}")]
    TokenMetadataUnavailable { address: Address, source: TransportError },
    #[error("{0}")]
    PreconditionFailed(&'static str),
    #[error("a transfer is already in progress")]
    TransferBusy,
    #[error(transparent)]
    InvalidChainId(#[from] ChainIdError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("keystore error: {0}")]
    Keystore(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl WalletError {
    pub(crate) fn rpc_and_wallet_required() -> Self {
        Self::PreconditionFailed("configure RPC and wallet")
    }

    pub(crate) fn rpc_required() -> Self {
        Self::PreconditionFailed("configure the RPC endpoint first")
    }

    pub(crate) fn wallet_required() -> Self {
        Self::PreconditionFailed("no active wallet")
    }

    /// Returns `true` for errors caused by user input rather than the network.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidMnemonic
                | Self::InvalidPrivateKey
                | Self::InvalidAddress(_)
                | Self::InvalidRecipient(_)
                | Self::InvalidAmount(_)
                | Self::WeakPassword
                | Self::PasswordMismatch
                | Self::EmptyPassword
                | Self::EmptyKeystore
        )
    }
}
