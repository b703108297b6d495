//! Wallet-aware error reporting.

use scol_wallets::WalletError;
use std::error::Error;

/// The messages of `error` and its sources, outermost first.
///
/// A source whose message is already part of the message above it is skipped, so wrapped
/// transport errors are only printed once.
pub fn causes(error: &(dyn Error + 'static)) -> Vec<String> {
    let mut causes: Vec<String> = Vec::new();
    for err in std::iter::successors(Some(error), |&err| err.source()) {
        let message = err.to_string();
        let message = message.trim();
        if !causes.last().is_some_and(|above| above.contains(message)) {
            causes.push(message.to_string());
        }
    }
    causes
}

/// The first [`WalletError`] in the chain of `error`.
pub fn wallet_error<'a>(error: &'a (dyn Error + 'static)) -> Option<&'a WalletError> {
    std::iter::successors(Some(error), |&err| err.source())
        .find_map(|err| err.downcast_ref::<WalletError>())
}

/// What the user can do about `err`, if anything.
pub fn hint(err: &WalletError) -> Option<&'static str> {
    Some(match err {
        WalletError::PreconditionFailed(_) => {
            "set the RPC endpoint with --rpc-url or `rpc_url` in scol.toml, and pick a wallet with \
             --private-key, --mnemonic, --keystore, --saved or --interactive"
        }
        WalletError::DecryptionFailed => {
            "check the password; wallet bundles and bare Web3 keystores are both accepted"
        }
        WalletError::TokenMetadataUnavailable { .. } => {
            "make sure the address is an ERC-20 contract on the configured network"
        }
        WalletError::InvalidChainId(_) => "chain ids are decimal or 0x-prefixed hex, e.g. 0xffaa",
        WalletError::TransferBusy => "wait for the pending transfer to settle",
        _ => return None,
    })
}
