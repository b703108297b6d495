use crate::{
    error::{TransportError, WalletError},
    generation::{Generations, Ticket},
    history::{DEFAULT_HISTORY_LIMIT, ExplorerClient, HistorySource, Transaction},
    keystore::{
        self, FileKeystoreStore, KeystoreBundle, KeystoreExport, KeystoreStore,
        MemoryKeystoreStore, validate_export_password,
    },
    notice::{DEFAULT_NOTICE_TTL, Notifier, Outcome},
    rpc::{ChainClient, Confirmation, Connector, HttpConnector},
    session::{Balance, WalletSession},
    tokens::{TokenRegistry, TrackedToken},
    transfer::{
        Asset, BusyGuard, Settlement, TransferForm, TransferIntent, TransferState, TransferTracker,
    },
    utils::parse_address,
};
use alloy_primitives::{Address, U256};
use parking_lot::Mutex;
use scol_config::{AddChainParams, Config, NetworkConfig};
use std::{fmt, sync::Arc, time::Duration};
use tokio::sync::broadcast;

/// Everything the wallet owns that changes over time. Only mutated under the lock, never held
/// across an await point.
struct State {
    network: NetworkConfig,
    client: Option<Arc<dyn ChainClient>>,
    session: Option<WalletSession>,
    tokens: TokenRegistry,
    history: Vec<Transaction>,
    native_form: TransferForm,
}

struct Inner {
    state: Mutex<State>,
    connector: Box<dyn Connector>,
    history_source: Arc<dyn HistorySource>,
    store: Arc<dyn KeystoreStore>,
    notifier: Notifier,
    transfers: Arc<TransferTracker>,
    generations: Generations,
    history_limit: usize,
    confirmation_timeout: Option<Duration>,
}

/// A handle to the wallet: the active session, the network it talks to, tracked tokens, the
/// history cache and the transfer workflow.
///
/// Cloning is cheap and clones share all state.
#[derive(Clone)]
pub struct Wallet {
    inner: Arc<Inner>,
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Wallet")
            .field("network", &state.network)
            .field("session", &state.session)
            .field("tokens", &state.tokens.len())
            .finish_non_exhaustive()
    }
}

/// Which transfer is being submitted.
#[derive(Clone, Copy, Debug)]
enum TransferTarget {
    Native,
    Token(Address),
}

/// Configures and builds a [`Wallet`].
pub struct WalletBuilder {
    network: NetworkConfig,
    connector: Box<dyn Connector>,
    history_source: Arc<dyn HistorySource>,
    store: Arc<dyn KeystoreStore>,
    notice_ttl: Duration,
    history_limit: usize,
    confirmation_timeout: Option<Duration>,
}

impl Default for WalletBuilder {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            connector: Box::new(HttpConnector),
            history_source: Arc::new(ExplorerClient::default()),
            store: Arc::new(MemoryKeystoreStore::default()),
            notice_ttl: DEFAULT_NOTICE_TTL,
            history_limit: DEFAULT_HISTORY_LIMIT,
            confirmation_timeout: None,
        }
    }
}

impl WalletBuilder {
    /// Applies the network and wallet settings of `config`. The keystore is stored in the
    /// config's data dir when there is one.
    pub fn from_config(config: &Config) -> Self {
        let mut builder = Self::default()
            .network(config.network())
            .notice_ttl(config.notice_ttl())
            .history_limit(config.history_limit)
            .confirmation_timeout(config.confirmation_timeout());
        if let Some(dir) = config.data_dir() {
            builder = builder.keystore_store(FileKeystoreStore::new(dir));
        }
        builder
    }

    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Box::new(connector);
        self
    }

    pub fn history_source(mut self, source: impl HistorySource + 'static) -> Self {
        self.history_source = Arc::new(source);
        self
    }

    pub fn keystore_store(mut self, store: impl KeystoreStore + 'static) -> Self {
        self.store = Arc::new(store);
        self
    }

    pub fn notice_ttl(mut self, ttl: Duration) -> Self {
        self.notice_ttl = ttl;
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn confirmation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Builds the wallet, connecting to the network's RPC endpoint if one is set.
    pub fn build(self) -> Result<Wallet, WalletError> {
        let client = match self.network.rpc_url() {
            Some(url) => Some(self.connector.connect(url)?),
            None => None,
        };
        let state = State {
            network: self.network,
            client,
            session: None,
            tokens: TokenRegistry::default(),
            history: Vec::new(),
            native_form: TransferForm::default(),
        };
        Ok(Wallet {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                connector: self.connector,
                history_source: self.history_source,
                store: self.store,
                notifier: Notifier::new(self.notice_ttl),
                transfers: Default::default(),
                generations: Generations::default(),
                history_limit: self.history_limit,
                confirmation_timeout: self.confirmation_timeout,
            }),
        })
    }
}

impl Wallet {
    pub fn builder() -> WalletBuilder {
        WalletBuilder::default()
    }

    fn notify(&self, message: impl Into<String>) {
        self.inner.notifier.notify(message);
    }

    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    // --- network ---

    pub fn network(&self) -> NetworkConfig {
        self.inner.state.lock().network.clone()
    }

    /// Switches to `network`, reconnecting and refreshing everything for the active address.
    pub async fn set_network(&self, network: NetworkConfig) -> Result<(), WalletError> {
        let client = match network.rpc_url() {
            Some(url) => Some(self.inner.connector.connect(url)?),
            None => None,
        };
        {
            let mut state = self.inner.state.lock();
            debug!(rpc_url = ?network.rpc_url(), chain = %network.chain_name, "switching network");
            state.network = network;
            state.client = client;
            self.inner.generations.advance_all();
        }
        self.refresh_all().await;
        Ok(())
    }

    /// The `wallet_addEthereumChain` parameters of the active network.
    pub fn add_chain_params(&self) -> Result<AddChainParams, WalletError> {
        Ok(self.network().add_chain_params()?)
    }

    /// Asks the RPC endpoint to add the active network.
    pub async fn request_add_chain(&self) -> Result<AddChainParams, WalletError> {
        let Some(client) = self.client() else {
            self.notify("Configure the RPC first");
            return Err(WalletError::rpc_required());
        };
        let result = async {
            let params = self.add_chain_params()?;
            client.add_chain(&params).await?;
            Ok::<_, WalletError>(params)
        }
        .await;
        match &result {
            Ok(params) => {
                debug!(chain_id = %params.chain_id, "chain added");
                self.notify("Network added to the wallet");
            }
            Err(err) => {
                warn!(%err, "unable to add chain");
                self.notify("Could not add the network");
            }
        }
        result
    }

    fn client(&self) -> Option<Arc<dyn ChainClient>> {
        self.inner.state.lock().client.clone()
    }

    // --- session ---

    pub fn session(&self) -> Option<WalletSession> {
        self.inner.state.lock().session.clone()
    }

    pub fn address(&self) -> Option<Address> {
        self.inner.state.lock().session.as_ref().map(WalletSession::address)
    }

    pub fn balance(&self) -> Balance {
        self.inner.state.lock().session.as_ref().map(WalletSession::balance).unwrap_or_default()
    }

    /// Generates a new wallet and makes it the active session.
    pub async fn create_random(&self) -> Result<Address, WalletError> {
        match WalletSession::create_random() {
            Ok(session) => {
                let message = "New wallet created. Save the recovery phrase!";
                Ok(self.install_session(session, message).await)
            }
            Err(err) => {
                error!(%err, "failed to create wallet");
                self.notify("Error creating the wallet");
                Err(err)
            }
        }
    }

    /// Imports a recovery phrase and makes it the active session.
    pub async fn import_phrase(&self, phrase: &str) -> Result<Address, WalletError> {
        if phrase.trim().is_empty() {
            self.notify("Enter a valid mnemonic");
            return Err(WalletError::InvalidMnemonic);
        }
        match WalletSession::from_phrase(phrase) {
            Ok(session) => Ok(self.install_session(session, "Wallet imported from mnemonic").await),
            Err(err) => {
                self.notify("Invalid mnemonic");
                Err(err)
            }
        }
    }

    /// Imports a raw private key and makes it the active session.
    pub async fn import_private_key(&self, key: &str) -> Result<Address, WalletError> {
        if key.trim().is_empty() {
            self.notify("Enter a valid private key");
            return Err(WalletError::InvalidPrivateKey);
        }
        match WalletSession::from_private_key(key) {
            Ok(session) => {
                Ok(self.install_session(session, "Wallet imported from private key").await)
            }
            Err(err) => {
                self.notify("Invalid private key");
                Err(err)
            }
        }
    }

    /// Decrypts a keystore bundle, or a bare encrypted document, and makes it the active session.
    pub async fn import_keystore(&self, json: &str, password: &str) -> Result<Address, WalletError> {
        match WalletSession::from_keystore(json, password).await {
            Ok(session) => Ok(self.install_session(session, "Keystore loaded").await),
            Err(err) => {
                self.notify(match err {
                    WalletError::EmptyKeystore => "Provide a keystore file",
                    WalletError::EmptyPassword => "Enter the keystore password",
                    _ => "Could not open the keystore",
                });
                Err(err)
            }
        }
    }

    /// Imports the bundle saved by the last export.
    pub async fn import_saved_keystore(&self, password: &str) -> Result<Address, WalletError> {
        match self.load_saved_keystore()? {
            Some(json) => self.import_keystore(&json, password).await,
            None => {
                self.notify("No keystore saved on this device");
                Err(WalletError::EmptyKeystore)
            }
        }
    }

    /// Replaces the active session and refreshes everything that depends on the address.
    async fn install_session(&self, session: WalletSession, message: &str) -> Address {
        let address = session.address();
        {
            let mut state = self.inner.state.lock();
            state.session = Some(session);
            self.inner.generations.advance_all();
        }
        debug!(%address, "session installed");
        self.notify(message);
        self.refresh_all().await;
        address
    }

    // --- keystore ---

    /// Encrypts the active key under `password`, stores the bundle and returns it.
    ///
    /// When `confirm` is given it must match `password`.
    pub async fn export_keystore(
        &self,
        password: &str,
        confirm: Option<&str>,
    ) -> Result<KeystoreExport, WalletError> {
        let (session, network) = {
            let state = self.inner.state.lock();
            (state.session.clone(), state.network.clone())
        };
        let Some(session) = session else {
            self.notify("No wallet");
            return Err(WalletError::wallet_required());
        };
        let password = match validate_export_password(password, confirm) {
            Ok(password) => password,
            Err(err) => {
                self.notify(match err {
                    WalletError::PasswordMismatch => "Passwords do not match",
                    _ => "Use a password of at least 8 characters",
                });
                return Err(err);
            }
        };

        let export = async {
            let keystore = keystore::encrypt(session.signer(), password).await?;
            let address = session.address().to_string();
            let bundle = KeystoreBundle::new(network.chain_id().ok(), address, keystore);
            let json = serde_json::to_string_pretty(&bundle)?;
            self.inner.store.save(&json)?;
            Ok::<_, WalletError>(KeystoreExport { file_name: bundle.file_name(), json, bundle })
        }
        .await;
        match &export {
            Ok(_) => self.notify("Keystore saved. Keep the password and the file somewhere safe"),
            Err(err) => {
                error!(%err, "failed to export keystore");
                self.notify("Could not encrypt/save the keystore");
            }
        }
        export
    }

    /// The bundle saved by the last export, if any.
    pub fn load_saved_keystore(&self) -> Result<Option<String>, WalletError> {
        self.inner.store.load()
    }

    // --- refreshes ---

    /// Refreshes the native balance, token balances and history concurrently.
    pub async fn refresh_all(&self) {
        futures::future::join3(self.refresh_balance(), self.refresh_tokens(), self.refresh_history())
            .await;
    }

    /// Fetches the native balance of the active address.
    pub async fn fetch_balance(&self) -> Result<U256, WalletError> {
        let (client, address) = {
            let state = self.inner.state.lock();
            (state.client.clone(), state.session.as_ref().map(WalletSession::address))
        };
        let (Some(client), Some(address)) = (client, address) else {
            return Err(WalletError::rpc_and_wallet_required());
        };
        Ok(client.native_balance(address).await?)
    }

    /// Refreshes the cached native balance. Failures are logged and the cached value kept.
    pub async fn refresh_balance(&self) {
        let ticket = self.inner.generations.balance.advance();
        match self.fetch_balance().await {
            Ok(balance) => {
                let mut state = self.inner.state.lock();
                if !self.inner.generations.balance.is_current(ticket) {
                    trace!("discarding stale balance");
                    return;
                }
                if let Some(session) = state.session.as_mut() {
                    session.set_balance(Balance::Known(balance));
                }
            }
            Err(WalletError::PreconditionFailed(_)) => {}
            Err(err) => warn!(%err, "unable to refresh wallet balance"),
        }
    }

    /// Re-fetches every tracked token's balance for the active address.
    ///
    /// Balances are fetched concurrently and applied together; a failed fetch keeps that token's
    /// previous balance. The whole snapshot is dropped if the registry or session changed
    /// meanwhile.
    pub async fn refresh_tokens(&self) {
        let (ticket, client, owner, tokens) = {
            let state = self.inner.state.lock();
            (
                self.inner.generations.tokens.advance(),
                state.client.clone(),
                state.session.as_ref().map(WalletSession::address),
                state.tokens.addresses(),
            )
        };
        let (Some(client), Some(owner)) = (client, owner) else { return };
        if tokens.is_empty() {
            return;
        }
        self.fetch_token_balances(ticket, client, owner, tokens).await;
    }

    /// Refreshes one token's balance. Older in-flight token refreshes are invalidated.
    async fn refresh_token(&self, token: Address) {
        let (ticket, client, owner) = {
            let state = self.inner.state.lock();
            (
                self.inner.generations.tokens.advance(),
                state.client.clone(),
                state.session.as_ref().map(WalletSession::address),
            )
        };
        let (Some(client), Some(owner)) = (client, owner) else { return };
        self.fetch_token_balances(ticket, client, owner, vec![token]).await;
    }

    async fn fetch_token_balances(
        &self,
        ticket: Ticket,
        client: Arc<dyn ChainClient>,
        owner: Address,
        tokens: Vec<Address>,
    ) {
        let fetches = tokens.into_iter().map(|token| {
            let client = Arc::clone(&client);
            async move { (token, client.token_balance(token, owner).await) }
        });
        let balances = futures::future::join_all(fetches)
            .await
            .into_iter()
            .filter_map(|(token, result)| match result {
                Ok(balance) => Some((token, balance)),
                Err(err) => {
                    warn!(%token, %err, "unable to refresh token balance");
                    None
                }
            })
            .collect::<Vec<_>>();

        let mut state = self.inner.state.lock();
        if !self.inner.generations.tokens.is_current(ticket) {
            trace!("discarding stale token balances");
            return;
        }
        state.tokens.apply_balances(balances);
    }

    /// Replaces the history cache with the explorer's latest transactions for the active address.
    ///
    /// Without an active address or an explorer the cache is cleared. Failures are logged and the
    /// cache kept.
    pub async fn refresh_history(&self) {
        let (ticket, address, explorer) = {
            let mut state = self.inner.state.lock();
            let ticket = self.inner.generations.history.advance();
            let address = state.session.as_ref().map(WalletSession::address);
            let explorer = state.network.explorer_base().map(str::to_string);
            if address.is_none() || explorer.is_none() {
                state.history.clear();
            }
            (ticket, address, explorer)
        };
        let Some(address) = address else { return };
        let Some(explorer) = explorer else {
            debug!("no explorer configured, skipping history");
            return;
        };

        match self
            .inner
            .history_source
            .transactions(&explorer, address, self.inner.history_limit)
            .await
        {
            Ok(txs) => {
                let mut state = self.inner.state.lock();
                if !self.inner.generations.history.is_current(ticket) {
                    trace!(%address, "discarding stale history");
                    return;
                }
                state.history = txs;
            }
            Err(err) => warn!(%address, %err, "unable to load history"),
        }
    }

    pub fn history(&self) -> Vec<Transaction> {
        self.inner.state.lock().history.clone()
    }

    // --- tokens ---

    pub fn tokens(&self) -> TokenRegistry {
        self.inner.state.lock().tokens.clone()
    }

    /// Starts tracking the ERC-20 contract at `address`.
    ///
    /// Symbol and decimals are fetched once. An address that is already tracked returns the
    /// existing entry untouched.
    pub async fn add_token(&self, address: &str) -> Result<TrackedToken, WalletError> {
        let Some(client) = self.client() else {
            self.notify("Configure the RPC first");
            return Err(WalletError::rpc_required());
        };
        let Some(token) = parse_address(address) else {
            self.notify("Invalid token address");
            return Err(WalletError::InvalidAddress(address.trim().to_string()));
        };
        if let Some(existing) = self.inner.state.lock().tokens.get(&token) {
            debug!(%token, "token already tracked");
            return Ok(existing.clone());
        }

        let metadata = match client.token_metadata(token).await {
            Ok(metadata) => metadata,
            Err(source) => {
                warn!(%token, %source, "unable to read token metadata");
                self.notify("Could not add the token (is the address correct?)");
                return Err(WalletError::TokenMetadataUnavailable { address: token, source });
            }
        };
        let symbol = metadata.symbol.clone();
        let inserted = {
            let mut state = self.inner.state.lock();
            let (_, inserted) =
                state.tokens.insert(TrackedToken::new(token, metadata.symbol, metadata.decimals));
            inserted
        };
        if inserted {
            debug!(%token, %symbol, decimals = metadata.decimals, "token added");
            self.notify(format!("Token {symbol} added"));
            self.refresh_tokens().await;
        }
        self.tokens()
            .get(&token)
            .cloned()
            .ok_or_else(|| WalletError::InvalidAddress(token.to_string()))
    }

    /// Replaces the transfer form of a tracked token.
    pub fn set_token_form(&self, token: Address, form: TransferForm) -> Result<(), WalletError> {
        let mut state = self.inner.state.lock();
        let tracked = state
            .tokens
            .get_mut(&token)
            .ok_or_else(|| WalletError::InvalidAddress(token.to_string()))?;
        tracked.form = form;
        Ok(())
    }

    // --- transfers ---

    pub fn native_form(&self) -> TransferForm {
        self.inner.state.lock().native_form.clone()
    }

    pub fn set_native_form(&self, form: TransferForm) {
        self.inner.state.lock().native_form = form;
    }

    pub fn transfer_state(&self) -> TransferState {
        self.inner.transfers.state()
    }

    /// Every transfer state transition, in order.
    pub fn subscribe_transfers(&self) -> broadcast::Receiver<TransferState> {
        self.inner.transfers.subscribe()
    }

    /// Whether a transfer is in flight.
    pub fn is_busy(&self) -> bool {
        self.inner.transfers.is_busy()
    }

    /// Whether a transfer has been submitted and is not settled yet.
    pub fn is_processing(&self) -> bool {
        self.inner.transfers.is_processing()
    }

    /// Sends the native transfer described by the native form.
    pub async fn send_native(&self) -> Result<Confirmation, WalletError> {
        self.transfer(TransferTarget::Native).await
    }

    /// Sends the transfer described by the form of the tracked token at `token`.
    pub async fn send_token(&self, token: Address) -> Result<Confirmation, WalletError> {
        self.transfer(TransferTarget::Token(token)).await
    }

    async fn transfer(&self, target: TransferTarget) -> Result<Confirmation, WalletError> {
        let (client, signer) = {
            let state = self.inner.state.lock();
            (state.client.clone(), state.session.as_ref().map(|s| s.signer().clone()))
        };
        let (Some(client), Some(signer)) = (client, signer) else {
            self.notify("Configure RPC and wallet");
            self.inner.notifier.show_outcome(Outcome::failure(
                "Configure the RPC endpoint and your wallet before sending.",
            ));
            return Err(WalletError::rpc_and_wallet_required());
        };
        let Some(guard) = self.inner.transfers.try_begin() else {
            debug!(?target, "transfer already in flight");
            return Err(WalletError::TransferBusy);
        };

        guard.transition(TransferState::Validating);
        let validated = {
            let state = self.inner.state.lock();
            match target {
                TransferTarget::Native => Ok((
                    state.native_form.clone(),
                    Asset::Native,
                    state.network.native_currency.symbol.clone(),
                )),
                TransferTarget::Token(address) => state
                    .tokens
                    .get(&address)
                    .map(|token| {
                        (
                            token.form.clone(),
                            Asset::Token { address, decimals: token.decimals },
                            token.symbol.clone(),
                        )
                    })
                    .ok_or_else(|| WalletError::InvalidAddress(address.to_string())),
            }
        }
        .and_then(|(form, asset, symbol)| Ok((TransferIntent::from_form(&form, asset)?, symbol)));
        let (intent, symbol) = match validated {
            Ok(validated) => validated,
            Err(err) => {
                self.reject_transfer(&err);
                return Err(err);
            }
        };

        guard.set_processing(true);
        guard.transition(TransferState::Submitting);
        debug!(?intent, "submitting transfer");
        let sent = match intent.asset {
            Asset::Native => client.send_native(&signer, intent.recipient, intent.amount).await,
            Asset::Token { address, .. } => {
                client.send_token(&signer, address, intent.recipient, intent.amount).await
            }
        };
        let hash = match sent {
            Ok(hash) => hash,
            Err(err) => return Err(self.fail_transfer(&guard, err, &symbol)),
        };
        self.notify(format!("Sending… TX: {hash}"));

        guard.transition(TransferState::AwaitingConfirmation(hash));
        let confirmation =
            match client.wait_for_confirmation(hash, self.inner.confirmation_timeout).await {
                Ok(confirmation) if confirmation.success => confirmation,
                Ok(_) => {
                    let err = TransportError::new(format!("transaction {hash} reverted"));
                    return Err(self.fail_transfer(&guard, err, &symbol));
                }
                Err(err) => return Err(self.fail_transfer(&guard, err, &symbol)),
            };

        let description = match intent.asset {
            Asset::Native => {
                self.refresh_balance().await;
                self.inner.state.lock().native_form.clear();
                "The transaction was confirmed on the network."
            }
            Asset::Token { address, .. } => {
                self.refresh_token(address).await;
                if let Some(token) = self.inner.state.lock().tokens.get_mut(&address) {
                    token.form.clear();
                }
                "The token transfer was confirmed."
            }
        };
        self.refresh_history().await;

        info!(%hash, block = ?confirmation.block_number, "transfer confirmed");
        self.notify(match intent.asset {
            Asset::Native => "Transaction confirmed",
            Asset::Token { .. } => "Transfer confirmed",
        });
        self.inner.notifier.show_outcome(Outcome::success(description));
        guard.transition(TransferState::Settled(Settlement::Success(hash)));
        Ok(confirmation)
    }

    /// Reports a transfer that failed validation.
    fn reject_transfer(&self, err: &WalletError) {
        debug!(%err, "transfer rejected");
        let (notice, description) = match err {
            WalletError::InvalidRecipient(_) => {
                ("Invalid recipient address", "The recipient address is not valid.")
            }
            WalletError::InvalidAmount(_) => ("Invalid amount", "The amount provided is not valid."),
            _ => ("Token not tracked", "Add the token before sending it."),
        };
        self.notify(notice);
        self.inner.notifier.show_outcome(Outcome::failure(description));
    }

    /// Settles a transfer as failed and returns the error to surface.
    fn fail_transfer(&self, guard: &BusyGuard, err: TransportError, symbol: &str) -> WalletError {
        let message = err
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Error sending {symbol}"));
        error!(%message, "transfer failed");
        self.notify(message.clone());
        self.inner.notifier.show_outcome(Outcome::failure(message.clone()));
        guard.transition(TransferState::Settled(Settlement::Failure(message)));
        WalletError::Transport(err)
    }
}
