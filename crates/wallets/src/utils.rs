use crate::error::WalletError;
use alloy_primitives::{
    Address, B256, U256,
    hex::FromHex,
    utils::{ParseUnits, parse_units},
};
use alloy_signer_local::{
    MnemonicBuilder, PrivateKeySigner,
    coins_bip39::{English, Mnemonic},
};
use std::{fs, path::Path, str::FromStr};

/// Number of words in freshly generated recovery phrases.
pub const PHRASE_WORD_COUNT: usize = 12;

/// Validates and sanitizes a private key, returning the signer it defines.
///
/// The key may be given with or without the `0x` prefix.
pub fn create_private_key_signer(private_key_str: &str) -> Result<PrivateKeySigner, WalletError> {
    let trimmed = private_key_str.trim();
    let prefixed =
        if trimmed.starts_with("0x") { trimmed.to_string() } else { format!("0x{trimmed}") };
    let Ok(private_key) = B256::from_hex(&prefixed) else {
        return Err(WalletError::InvalidPrivateKey);
    };
    PrivateKeySigner::from_bytes(&private_key).map_err(|err| {
        debug!(%err, "rejected private key");
        WalletError::InvalidPrivateKey
    })
}

/// Trims, lower-cases and collapses the whitespace of a recovery phrase.
pub fn normalize_phrase(phrase: &str) -> String {
    phrase.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Derives the signer at the default path (`m/44'/60'/0'/0/0`) of a normalized phrase.
pub fn create_mnemonic_signer(phrase: &str) -> Result<PrivateKeySigner, WalletError> {
    if phrase.is_empty() {
        return Err(WalletError::InvalidMnemonic);
    }
    MnemonicBuilder::<English>::default()
        .phrase(phrase)
        .index(0u32)
        .and_then(|builder| builder.build())
        .map_err(|err| {
            debug!(%err, "rejected mnemonic");
            WalletError::InvalidMnemonic
        })
}

/// Reads a phrase from `mnemonic` if it names a file, otherwise returns it unchanged.
pub fn read_phrase(mnemonic: &str) -> std::io::Result<String> {
    if Path::new(mnemonic).is_file() { fs::read_to_string(mnemonic) } else { Ok(mnemonic.to_owned()) }
}

/// Generates a fresh English recovery phrase.
pub fn random_phrase() -> Result<String, WalletError> {
    let mut rng = rand_08::thread_rng();
    Mnemonic::<English>::new_with_count(&mut rng, PHRASE_WORD_COUNT)
        .map(|mnemonic| mnemonic.to_phrase())
        .map_err(|err| WalletError::Keystore(format!("could not generate a recovery phrase: {err}")))
}

/// Parses an account address.
///
/// All-lowercase and all-uppercase hex is accepted as is; mixed case must be a valid EIP-55
/// checksum so transcription errors are caught.
pub fn parse_address(s: &str) -> Option<Address> {
    let s = s.trim();
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.len() != 40 {
        return None;
    }
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        let prefixed = format!("0x{digits}");
        Address::parse_checksummed(prefixed, None).ok()
    } else {
        Address::from_str(digits).ok()
    }
}

/// Parses a positive decimal amount with at most `decimals` significant fractional digits.
///
/// Trailing zeros are not significant: `"1.50"` is accepted with one decimal.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, WalletError> {
    let trimmed = amount.trim();
    let invalid = || WalletError::InvalidAmount(amount.to_string());

    let (int, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (int.is_empty() && frac.is_empty()) || !all_digits(int) || !all_digits(frac) {
        return Err(invalid());
    }
    let frac = frac.trim_end_matches('0');
    if frac.len() > decimals as usize {
        return Err(invalid());
    }
    let int = if int.is_empty() { "0" } else { int };
    let canonical = if frac.is_empty() { int.to_string() } else { format!("{int}.{frac}") };

    match parse_units(&canonical, decimals).map_err(|_| invalid())? {
        ParseUnits::U256(value) if !value.is_zero() => Ok(value),
        _ => Err(invalid()),
    }
}

/// Shortens an address or hash for display: `0xf39Fd6…b92266`.
pub fn short_hex(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 14 {
        return value.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 6..].iter().collect();
    format!("{head}…{tail}")
}
