//! # scol-wallets
//!
//! Non-custodial wallet core for the Scolcoin POA chain and other EVM networks: the active
//! session, ERC-20 token registry, explorer history cache, transfer workflow, keystore bundles and
//! user notices.
//!
//! Everything is reached through a [`Wallet`] handle:
//!
//! ```no_run
//! # async fn run() -> Result<(), scol_wallets::WalletError> {
//! use scol_wallets::{TransferForm, Wallet};
//!
//! let wallet = Wallet::builder().build()?;
//! wallet.create_random().await?;
//! wallet.set_native_form(TransferForm::new("0x1111111111111111111111111111111111111111", "1.5"));
//! let confirmation = wallet.send_native().await?;
//! println!("mined in block {:?}", confirmation.block_number);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

pub mod error;
pub use error::{TransportError, WalletError};

mod generation;
pub use generation::{Generation, Ticket};

pub mod history;
pub use history::{ExplorerClient, HistoryError, HistorySource, Transaction};

pub mod keystore;
pub use keystore::{
    FileKeystoreStore, KeystoreBundle, KeystoreExport, KeystoreStore, MemoryKeystoreStore,
};

pub mod notice;
pub use notice::{Notice, Notifier, Outcome, OutcomeStatus};

pub mod rpc;
pub use rpc::{ChainClient, Confirmation, Connector, HttpConnector, RpcClient, TokenMetadata};

pub mod session;
pub use session::{Balance, SessionSource, WalletSession};

pub mod tokens;
pub use tokens::{TokenRegistry, TrackedToken};

pub mod transfer;
pub use transfer::{Asset, Settlement, TransferForm, TransferIntent, TransferState};

pub mod utils;

mod wallet;
pub use wallet::{Wallet, WalletBuilder};
