//! Test doubles for the chain and the explorer.

use alloy_primitives::{Address, TxHash, U256, keccak256, utils::parse_ether};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use parking_lot::Mutex;
use scol_config::{AddChainParams, NetworkConfig};
use scol_wallets::{
    ChainClient, Confirmation, HistoryError, HistorySource, MemoryKeystoreStore, TokenMetadata,
    Transaction, TransportError, Wallet, utils::create_private_key_signer,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::Semaphore;

pub const GAS_USED: u64 = 21_000;
pub const GAS_PRICE: u128 = 1_000_000_000;

pub const RECIPIENT: &str = "0x1111111111111111111111111111111111111111";

/// Anvil's first two dev accounts.
pub const KEY_A: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const KEY_B: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

#[derive(Clone, Debug)]
pub struct MockToken {
    pub symbol: String,
    /// `None` makes `decimals()` fail.
    pub decimals: Option<u8>,
    pub balances: HashMap<Address, U256>,
    pub fail_balance: bool,
}

impl MockToken {
    pub fn new(symbol: &str, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            decimals: Some(decimals),
            balances: HashMap::new(),
            fail_balance: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentTx {
    pub hash: TxHash,
    pub from: Address,
    pub to: Address,
    pub token: Option<Address>,
    pub amount: U256,
}

#[derive(Debug, Default)]
struct ChainState {
    balances: HashMap<Address, U256>,
    tokens: HashMap<Address, MockToken>,
    sent: Vec<SentTx>,
    send_error: Option<TransportError>,
    confirm_error: Option<TransportError>,
    revert: bool,
    added_chains: Vec<AddChainParams>,
    /// The next balance read of these owners answers after the delay.
    delays: HashMap<Address, Duration>,
}

/// An in-memory chain. Transfers settle when they are sent; confirmations can be held back with
/// [`MockChain::hold_confirmations`].
#[derive(Debug, Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MockChain {
    pub fn fund(&self, address: Address, amount: U256) {
        self.state.lock().balances.insert(address, amount);
    }

    pub fn balance_of(&self, address: Address) -> U256 {
        self.state.lock().balances.get(&address).copied().unwrap_or_default()
    }

    pub fn deploy(&self, address: Address, token: MockToken) {
        self.state.lock().tokens.insert(address, token);
    }

    pub fn set_token_balance(&self, token: Address, owner: Address, amount: U256) {
        if let Some(token) = self.state.lock().tokens.get_mut(&token) {
            token.balances.insert(owner, amount);
        }
    }

    pub fn fail_token_balance(&self, token: Address, fail: bool) {
        if let Some(token) = self.state.lock().tokens.get_mut(&token) {
            token.fail_balance = fail;
        }
    }

    /// Holds back the answer to the next native or token balance read of `owner`. The balance is
    /// read before the delay, like a response already in flight.
    pub fn delay_next_read(&self, owner: Address, delay: Duration) {
        self.state.lock().delays.insert(owner, delay);
    }

    async fn delay(&self, owner: Address) {
        let delay = self.state.lock().delays.remove(&owner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn fail_sends(&self, err: TransportError) {
        self.state.lock().send_error = Some(err);
    }

    pub fn fail_confirmations(&self, err: TransportError) {
        self.state.lock().confirm_error = Some(err);
    }

    pub fn revert_all(&self) {
        self.state.lock().revert = true;
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.state.lock().sent.clone()
    }

    pub fn added_chains(&self) -> Vec<AddChainParams> {
        self.state.lock().added_chains.clone()
    }

    /// Blocks confirmations until [`MockChain::release_confirmation`] is called.
    pub fn hold_confirmations(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_confirmation(&self) {
        if let Some(gate) = self.gate.lock().as_ref() {
            gate.add_permits(1);
        }
    }

    fn record(
        &self,
        from: Address,
        to: Address,
        token: Option<Address>,
        amount: U256,
    ) -> Result<TxHash, TransportError> {
        let mut state = self.state.lock();
        if let Some(err) = state.send_error.clone() {
            return Err(err);
        }
        let fee = U256::from(GAS_USED) * U256::from(GAS_PRICE);
        let native = state.balances.get(&from).copied().unwrap_or_default();
        let debit = if token.is_some() { fee } else { amount + fee };
        if native < debit {
            return Err(TransportError::new("insufficient funds for gas * price + value"));
        }
        state.balances.insert(from, native - debit);

        match token {
            None => *state.balances.entry(to).or_default() += amount,
            Some(token) => {
                let token = state
                    .tokens
                    .get_mut(&token)
                    .ok_or_else(|| TransportError::new("execution reverted"))?;
                let held = token.balances.get(&from).copied().unwrap_or_default();
                if held < amount {
                    return Err(TransportError::new(
                        "execution reverted: ERC20: transfer amount exceeds balance",
                    ));
                }
                token.balances.insert(from, held - amount);
                *token.balances.entry(to).or_default() += amount;
            }
        }

        let hash = keccak256(state.sent.len().to_be_bytes());
        state.sent.push(SentTx { hash, from, to, token, amount });
        Ok(hash)
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn native_balance(&self, address: Address) -> Result<U256, TransportError> {
        let balance = self.balance_of(address);
        self.delay(address).await;
        Ok(balance)
    }

    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata, TransportError> {
        let state = self.state.lock();
        let token = state.tokens.get(&token).ok_or_else(TransportError::opaque)?;
        let decimals = token
            .decimals
            .ok_or_else(|| TransportError::new("execution reverted: decimals() not supported"))?;
        Ok(TokenMetadata { symbol: token.symbol.clone(), decimals })
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, TransportError> {
        let balance = {
            let state = self.state.lock();
            let token = state.tokens.get(&token).ok_or_else(TransportError::opaque)?;
            if token.fail_balance {
                return Err(TransportError::new("header not found"));
            }
            token.balances.get(&owner).copied().unwrap_or_default()
        };
        self.delay(owner).await;
        Ok(balance)
    }

    async fn send_native(
        &self,
        signer: &PrivateKeySigner,
        to: Address,
        value: U256,
    ) -> Result<TxHash, TransportError> {
        self.record(signer.address(), to, None, value)
    }

    async fn send_token(
        &self,
        signer: &PrivateKeySigner,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<TxHash, TransportError> {
        self.record(signer.address(), to, Some(token), amount)
    }

    async fn wait_for_confirmation(
        &self,
        hash: TxHash,
        _timeout: Option<Duration>,
    ) -> Result<Confirmation, TransportError> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.acquire().await.map_err(|err| TransportError::new(err.to_string()))?.forget();
        }
        let state = self.state.lock();
        if let Some(err) = state.confirm_error.clone() {
            return Err(err);
        }
        Ok(Confirmation {
            hash,
            block_number: Some(state.sent.len() as u64),
            success: !state.revert,
            gas_used: GAS_USED,
            effective_gas_price: GAS_PRICE,
        })
    }

    async fn add_chain(&self, params: &AddChainParams) -> Result<(), TransportError> {
        self.state.lock().added_chains.push(params.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct HistoryState {
    pages: HashMap<Address, Vec<Transaction>>,
    delays: HashMap<Address, Duration>,
    failing: bool,
    calls: Vec<(String, Address, usize)>,
}

/// An explorer serving canned pages, optionally after a delay.
#[derive(Debug, Default)]
pub struct MockHistory {
    state: Mutex<HistoryState>,
}

impl MockHistory {
    pub fn set_page(&self, address: Address, txs: Vec<Transaction>) {
        self.state.lock().pages.insert(address, txs);
    }

    pub fn set_delay(&self, address: Address, delay: Duration) {
        self.state.lock().delays.insert(address, delay);
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    pub fn calls(&self) -> Vec<(String, Address, usize)> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl HistorySource for MockHistory {
    async fn transactions(
        &self,
        explorer: &str,
        address: Address,
        limit: usize,
    ) -> Result<Vec<Transaction>, HistoryError> {
        let delay = {
            let mut state = self.state.lock();
            state.calls.push((explorer.to_string(), address, limit));
            state.delays.get(&address).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock();
        if state.failing {
            return Err(HistoryError::Malformed(serde_json::from_str::<()>("<html>").unwrap_err()));
        }
        Ok(state.pages.get(&address).cloned().unwrap_or_default())
    }
}

pub fn tx(hash: &str, label: &str) -> Transaction {
    Transaction {
        hash: hash.to_string(),
        from: None,
        to: None,
        label: label.to_string(),
        block_number: None,
        timestamp: None,
    }
}

/// A wallet wired to in-memory doubles.
pub struct TestWallet {
    pub wallet: Wallet,
    pub chain: Arc<MockChain>,
    pub history: Arc<MockHistory>,
    pub store: MemoryKeystoreStore,
}

impl TestWallet {
    pub fn new() -> Self {
        Self::with_network(NetworkConfig {
            rpc_url: Some("http://localhost:8545".to_string()),
            explorer_url: Some("http://localhost:4000/".to_string()),
            ..Default::default()
        })
    }

    pub fn with_network(network: NetworkConfig) -> Self {
        let chain = Arc::new(MockChain::default());
        let history = Arc::new(MockHistory::default());
        let store = MemoryKeystoreStore::default();
        let connected = Arc::clone(&chain);
        let wallet = Wallet::builder()
            .network(network)
            .connector(move |_: &str| -> Result<Arc<dyn ChainClient>, TransportError> {
                Ok(connected.clone())
            })
            .history_source(Arc::clone(&history))
            .keystore_store(store.clone())
            .build()
            .unwrap();
        Self { wallet, chain, history, store }
    }

    /// Imports `key` and funds it with `ether`.
    pub async fn funded(&self, key: &str, ether: &str) -> Address {
        let address = create_private_key_signer(key).unwrap().address();
        self.chain.fund(address, parse_ether(ether).unwrap());
        self.wallet.import_private_key(key).await.unwrap()
    }
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) {
    tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
