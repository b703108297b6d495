//! Subcommands of `scol`.

use crate::opts::WalletOpts;
use alloy_primitives::Address;
use eyre::Result;
use scol_config::{Config, NetworkConfig};
use scol_wallets::{Wallet, WalletBuilder};

pub mod chain;
pub mod history;
pub mod keystore;
pub mod send;
pub mod token;
pub mod wallet;

/// Builds a wallet from `config` without a session.
pub fn build_wallet(config: &Config) -> Result<Wallet> {
    Ok(WalletBuilder::from_config(config).build()?)
}

/// Builds a wallet from `config` and installs the session `opts` point at.
pub async fn open_wallet(config: &Config, opts: &WalletOpts) -> Result<(Wallet, Address)> {
    let wallet = build_wallet(config)?;
    let address = opts.install(&wallet, config).await?;
    Ok((wallet, address))
}

/// Like [`open_wallet`], but without RPC or explorer so nothing is fetched.
pub async fn open_offline_wallet(config: &Config, opts: &WalletOpts) -> Result<(Wallet, Address)> {
    let network = NetworkConfig { rpc_url: None, explorer_url: None, ..config.network() };
    let wallet = WalletBuilder::from_config(config).network(network).build()?;
    let address = opts.install(&wallet, config).await?;
    Ok((wallet, address))
}
