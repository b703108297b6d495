//! Recent transactions of the active address, as indexed by a Blockscout explorer.

use alloy_primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Number of transactions requested from the explorer.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("explorer responded with status {0}")]
    Status(reqwest::StatusCode),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("malformed explorer response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Source of explorer transactions.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetches the most recent `limit` transactions of `address`, newest first.
    async fn transactions(
        &self,
        explorer: &str,
        address: Address,
        limit: usize,
    ) -> Result<Vec<Transaction>, HistoryError>;
}

#[async_trait]
impl<T: HistorySource + ?Sized> HistorySource for std::sync::Arc<T> {
    async fn transactions(
        &self,
        explorer: &str,
        address: Address,
        limit: usize,
    ) -> Result<Vec<Transaction>, HistoryError> {
        (**self).transactions(explorer, address, limit).await
    }
}

/// An explorer transaction, normalized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub hash: String,
    pub from: Option<String>,
    pub to: Option<String>,
    /// The called method, else the transaction type, else `TX`.
    pub label: String,
    pub block_number: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Link to this transaction on the explorer at `base`.
    pub fn explorer_link(&self, base: &str) -> String {
        format!("{}/tx/{}", base.trim_end_matches('/'), self.hash)
    }
}

/// The `{ "items": [...] }` envelope of `/api/v2/addresses/{address}/transactions`.
#[derive(Debug, Deserialize)]
pub struct ExplorerPage {
    pub items: Vec<ExplorerTx>,
}

/// A transaction as the explorer returns it.
#[derive(Debug, Deserialize)]
pub struct ExplorerTx {
    pub hash: String,
    #[serde(default)]
    pub from: Option<AddressField>,
    #[serde(default)]
    pub to: Option<AddressField>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<TypeField>,
    #[serde(default, alias = "block")]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<TimestampField>,
}

/// An address, either bare or as an address object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AddressField {
    Hash(String),
    Object { hash: Option<String> },
}

impl AddressField {
    pub fn into_hash(self) -> Option<String> {
        match self {
            Self::Hash(hash) => Some(hash),
            Self::Object { hash } => hash,
        }
    }
}

/// Transaction type, e.g. `2` or `"contract_call"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TypeField {
    Number(u64),
    Text(String),
}

/// Epoch seconds, or an RFC 3339 date.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TimestampField {
    Seconds(i64),
    Text(String),
}

impl TimestampField {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Seconds(secs) => DateTime::from_timestamp(*secs, 0),
            Self::Text(text) => match text.parse::<i64>() {
                Ok(secs) => DateTime::from_timestamp(secs, 0),
                Err(_) => DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.with_timezone(&Utc)),
            },
        }
    }
}

impl From<ExplorerTx> for Transaction {
    fn from(tx: ExplorerTx) -> Self {
        let label = tx
            .method
            .filter(|method| !method.is_empty())
            .or_else(|| match tx.kind {
                Some(TypeField::Number(kind)) => Some(kind.to_string()),
                Some(TypeField::Text(kind)) if !kind.is_empty() => Some(kind),
                _ => None,
            })
            .unwrap_or_else(|| "TX".to_string());
        Self {
            hash: tx.hash,
            from: tx.from.and_then(AddressField::into_hash),
            to: tx.to.and_then(AddressField::into_hash),
            label,
            block_number: tx.block_number,
            timestamp: tx.timestamp.as_ref().and_then(TimestampField::to_datetime),
        }
    }
}

/// Parses an explorer page into normalized transactions.
pub fn parse_page(body: &[u8]) -> Result<Vec<Transaction>, HistoryError> {
    let page: ExplorerPage = serde_json::from_slice(body)?;
    Ok(page.items.into_iter().map(Into::into).collect())
}

/// [`HistorySource`] over a Blockscout v2 HTTP API.
#[derive(Clone, Debug, Default)]
pub struct ExplorerClient {
    client: reqwest::Client,
}

impl ExplorerClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// `{base}/api/v2/addresses/{address}/transactions?items_count={limit}`
    pub fn transactions_url(explorer: &str, address: Address, limit: usize) -> String {
        format!(
            "{}/api/v2/addresses/{address}/transactions?items_count={limit}",
            explorer.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl HistorySource for ExplorerClient {
    async fn transactions(
        &self,
        explorer: &str,
        address: Address,
        limit: usize,
    ) -> Result<Vec<Transaction>, HistoryError> {
        let url = Self::transactions_url(explorer, address, limit);
        trace!(%url, "fetching history");
        let res = self.client.get(&url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(HistoryError::Status(status));
        }
        parse_page(&res.bytes().await?)
    }
}
