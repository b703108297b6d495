//! The user-curated set of ERC-20 tokens.

use crate::transfer::TransferForm;
use alloy_primitives::{Address, U256, utils::format_units};

/// A tracked ERC-20 contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedToken {
    /// Checksummed contract address.
    pub address: Address,
    pub symbol: String,
    /// Fetched once when the token is added.
    pub decimals: u8,
    pub balance: U256,
    /// Pending transfer form for this token.
    pub form: TransferForm,
}

impl TrackedToken {
    pub fn new(address: Address, symbol: String, decimals: u8) -> Self {
        Self { address, symbol, decimals, balance: U256::ZERO, form: TransferForm::default() }
    }

    pub fn formatted_balance(&self) -> String {
        format_units(self.balance, self.decimals).unwrap_or_else(|_| self.balance.to_string())
    }
}

/// Append-only registry of tracked tokens, in insertion order.
///
/// Addresses are unique. [`Address`] equality is byte equality, so two spellings of the same
/// address that only differ in letter case are the same entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenRegistry {
    tokens: Vec<TrackedToken>,
}

impl TokenRegistry {
    pub fn get(&self, address: &Address) -> Option<&TrackedToken> {
        self.tokens.iter().find(|token| token.address == *address)
    }

    pub(crate) fn get_mut(&mut self, address: &Address) -> Option<&mut TrackedToken> {
        self.tokens.iter_mut().find(|token| token.address == *address)
    }

    /// Inserts `token` unless its address is already tracked. Returns the entry in the registry
    /// and whether it was inserted.
    pub(crate) fn insert(&mut self, token: TrackedToken) -> (&TrackedToken, bool) {
        match self.tokens.iter().position(|existing| existing.address == token.address) {
            Some(idx) => (&self.tokens[idx], false),
            None => {
                self.tokens.push(token);
                (&self.tokens[self.tokens.len() - 1], true)
            }
        }
    }

    /// Applies fetched balances. Tokens missing from `balances` keep their previous balance.
    pub(crate) fn apply_balances(&mut self, balances: impl IntoIterator<Item = (Address, U256)>) {
        for (address, balance) in balances {
            if let Some(token) = self.get_mut(&address) {
                token.balance = balance;
            }
        }
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.tokens.iter().map(|token| token.address).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedToken> {
        self.tokens.iter()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl<'a> IntoIterator for &'a TokenRegistry {
    type Item = &'a TrackedToken;
    type IntoIter = std::slice::Iter<'a, TrackedToken>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}
