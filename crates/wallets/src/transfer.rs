//! The outbound transfer state machine.

use crate::{
    error::WalletError,
    utils::{parse_address, parse_amount},
};
use alloy_primitives::{Address, TxHash, U256};
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 32;

/// Where a transfer is in its life cycle.
///
/// `Idle → Validating → Submitting → AwaitingConfirmation → Settled → Idle`, with validation
/// failures going straight back to `Idle`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TransferState {
    #[default]
    Idle,
    Validating,
    Submitting,
    AwaitingConfirmation(TxHash),
    Settled(Settlement),
}

impl TransferState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Settlement {
    Success(TxHash),
    Failure(String),
}

/// The recipient and amount as typed by the user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransferForm {
    pub to: String,
    pub amount: String,
}

impl TransferForm {
    pub fn new(to: impl Into<String>, amount: impl Into<String>) -> Self {
        Self { to: to.into(), amount: amount.into() }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.to.is_empty() && self.amount.is_empty()
    }
}

/// What is being sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Asset {
    /// The chain's native currency, 18 decimals.
    Native,
    /// An ERC-20 token with the decimals recorded when it was added.
    Token { address: Address, decimals: u8 },
}

impl Asset {
    pub fn decimals(&self) -> u8 {
        match self {
            Self::Native => 18,
            Self::Token { decimals, .. } => *decimals,
        }
    }
}

/// A validated transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferIntent {
    pub recipient: Address,
    pub amount: U256,
    pub asset: Asset,
}

impl TransferIntent {
    /// Validates `form` for `asset`: the recipient must be an address and the amount a positive
    /// decimal within the asset's precision.
    pub fn from_form(form: &TransferForm, asset: Asset) -> Result<Self, WalletError> {
        let recipient = parse_address(&form.to)
            .ok_or_else(|| WalletError::InvalidRecipient(form.to.trim().to_string()))?;
        let amount = parse_amount(&form.amount, asset.decimals())?;
        Ok(Self { recipient, amount, asset })
    }
}

/// Busy and processing flags plus the current [`TransferState`].
#[derive(Debug)]
pub(crate) struct TransferTracker {
    busy: AtomicBool,
    processing: AtomicBool,
    state: Mutex<TransferState>,
    tx: broadcast::Sender<TransferState>,
}

impl Default for TransferTracker {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            busy: AtomicBool::new(false),
            processing: AtomicBool::new(false),
            state: Mutex::new(TransferState::Idle),
            tx,
        }
    }
}

impl TransferTracker {
    /// Claims the busy flag. Returns `None` when a transfer is already in flight.
    pub fn try_begin(self: &Arc<Self>) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { tracker: Arc::clone(self) })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub fn state(&self) -> TransferState {
        self.state.lock().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferState> {
        self.tx.subscribe()
    }

    fn transition(&self, state: TransferState) {
        trace!(?state, "transfer state");
        *self.state.lock() = state.clone();
        let _ = self.tx.send(state);
    }
}

/// Held for the duration of one transfer. Dropping it clears both flags and returns the
/// workflow to `Idle`, whichever way the transfer ended.
#[derive(Debug)]
pub(crate) struct BusyGuard {
    tracker: Arc<TransferTracker>,
}

impl BusyGuard {
    pub fn transition(&self, state: TransferState) {
        self.tracker.transition(state);
    }

    pub fn set_processing(&self, processing: bool) {
        self.tracker.processing.store(processing, Ordering::Release);
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.tracker.processing.store(false, Ordering::Release);
        if !self.tracker.state.lock().is_idle() {
            self.tracker.transition(TransferState::Idle);
        }
        self.tracker.busy.store(false, Ordering::Release);
    }
}
