//! JSON-RPC access to the chain.

use crate::error::TransportError;
use alloy_network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy_primitives::{Address, TxHash, U256};
use alloy_provider::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::sol;
use async_trait::async_trait;
use scol_config::AddChainParams;
use std::{sync::Arc, time::Duration};
use url::Url;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// ERC-20 metadata read when a token is added.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenMetadata {
    pub symbol: String,
    pub decimals: u8,
}

/// The mined receipt of a submitted transaction, reduced to what the wallet needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Confirmation {
    pub hash: TxHash,
    pub block_number: Option<u64>,
    /// `false` when the transaction was mined but reverted.
    pub success: bool,
    pub gas_used: u64,
    pub effective_gas_price: u128,
}

impl Confirmation {
    /// The fee paid for the transaction.
    pub fn fee(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}

/// The chain operations the wallet depends on.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn native_balance(&self, address: Address) -> Result<U256, TransportError>;

    /// Reads `symbol()` and `decimals()` of an ERC-20 contract.
    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata, TransportError>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, TransportError>;

    /// Signs and broadcasts a native transfer, returning its hash.
    async fn send_native(
        &self,
        signer: &PrivateKeySigner,
        to: Address,
        value: U256,
    ) -> Result<TxHash, TransportError>;

    /// Signs and broadcasts an ERC-20 `transfer(to, amount)`, returning its hash.
    async fn send_token(
        &self,
        signer: &PrivateKeySigner,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<TxHash, TransportError>;

    /// Waits until `hash` is mined. `None` waits indefinitely.
    async fn wait_for_confirmation(
        &self,
        hash: TxHash,
        timeout: Option<Duration>,
    ) -> Result<Confirmation, TransportError>;

    /// Sends a `wallet_addEthereumChain` request.
    async fn add_chain(&self, params: &AddChainParams) -> Result<(), TransportError>;
}

/// Opens a [`ChainClient`] for an RPC endpoint.
pub trait Connector: Send + Sync {
    fn connect(&self, rpc_url: &str) -> Result<Arc<dyn ChainClient>, TransportError>;
}

impl<F> Connector for F
where
    F: Fn(&str) -> Result<Arc<dyn ChainClient>, TransportError> + Send + Sync,
{
    fn connect(&self, rpc_url: &str) -> Result<Arc<dyn ChainClient>, TransportError> {
        self(rpc_url)
    }
}

/// Connects over HTTP with [`RpcClient`].
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    fn connect(&self, rpc_url: &str) -> Result<Arc<dyn ChainClient>, TransportError> {
        Ok(Arc::new(RpcClient::new(rpc_url)?))
    }
}

/// [`ChainClient`] over an HTTP JSON-RPC endpoint.
#[derive(Clone, Debug)]
pub struct RpcClient {
    url: Url,
    provider: DynProvider,
}

impl RpcClient {
    /// Creates a client for `rpc_url`. A bare `localhost:<port>` is treated as `http://`.
    pub fn new(rpc_url: &str) -> Result<Self, TransportError> {
        let url = parse_rpc_url(rpc_url)?;
        let provider = ProviderBuilder::new().connect_http(url.clone()).erased();
        Ok(Self { url, provider })
    }

    fn signing_provider(&self, signer: &PrivateKeySigner) -> DynProvider {
        ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer.clone()))
            .connect_http(self.url.clone())
            .erased()
    }
}

fn parse_rpc_url(rpc_url: &str) -> Result<Url, TransportError> {
    let rpc_url = rpc_url.trim();
    let rpc_url = if rpc_url.starts_with("localhost:") {
        format!("http://{rpc_url}")
    } else {
        rpc_url.to_string()
    };
    Url::parse(&rpc_url).map_err(|err| TransportError::new(format!("invalid RPC URL `{rpc_url}`: {err}")))
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn native_balance(&self, address: Address) -> Result<U256, TransportError> {
        Ok(self.provider.get_balance(address).await?)
    }

    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata, TransportError> {
        let erc20 = IERC20::new(token, &self.provider);
        let (symbol, decimals) = futures::future::try_join(
            async { erc20.symbol().call().await },
            async { erc20.decimals().call().await },
        )
        .await?;
        Ok(TokenMetadata { symbol, decimals })
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, TransportError> {
        Ok(IERC20::new(token, &self.provider).balanceOf(owner).call().await?)
    }

    async fn send_native(
        &self,
        signer: &PrivateKeySigner,
        to: Address,
        value: U256,
    ) -> Result<TxHash, TransportError> {
        let tx = TransactionRequest::default()
            .with_from(signer.address())
            .with_to(to)
            .with_value(value);
        let pending = self.signing_provider(signer).send_transaction(tx).await?;
        Ok(*pending.tx_hash())
    }

    async fn send_token(
        &self,
        signer: &PrivateKeySigner,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<TxHash, TransportError> {
        let provider = self.signing_provider(signer);
        let pending = IERC20::new(token, &provider)
            .transfer(to, amount)
            .from(signer.address())
            .send()
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_confirmation(
        &self,
        hash: TxHash,
        timeout: Option<Duration>,
    ) -> Result<Confirmation, TransportError> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), hash)
            .with_timeout(timeout)
            .get_receipt()
            .await?;
        Ok(Confirmation {
            hash,
            block_number: ReceiptResponse::block_number(&receipt),
            success: ReceiptResponse::status(&receipt),
            gas_used: ReceiptResponse::gas_used(&receipt),
            effective_gas_price: ReceiptResponse::effective_gas_price(&receipt),
        })
    }

    async fn add_chain(&self, params: &AddChainParams) -> Result<(), TransportError> {
        self.provider
            .raw_request::<_, ()>("wallet_addEthereumChain".into(), [params.clone()])
            .await?;
        Ok(())
    }
}
