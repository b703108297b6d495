//! User-facing notices and transfer result dialogs.

use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast, time::Instant};

/// Default lifetime of a notice.
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_millis(3500);

const CHANNEL_CAPACITY: usize = 64;

/// A short status message. Only the most recent notice is current.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Monotonic id, increasing with every notice.
    pub id: u64,
    pub message: String,
    pub expires_at: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutcomeStatus {
    Success,
    Failure,
}

/// The result dialog opened when a transfer settles. Stays open until closed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub status: OutcomeStatus,
    pub title: String,
    pub description: String,
}

impl Outcome {
    pub fn success(description: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Success,
            title: "Confirmation successful".to_string(),
            description: description.into(),
        }
    }

    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Failure,
            title: "Confirmation failed".to_string(),
            description: description.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

#[derive(Debug, Default)]
struct NotifierState {
    next_id: u64,
    notice: Option<Notice>,
    outcome: Option<Outcome>,
}

/// Keeps the current notice and the open result dialog.
///
/// Notices expire `ttl` after they were posted; a newer notice replaces the current one and
/// restarts the clock. Every posted notice is also broadcast to subscribers.
#[derive(Clone, Debug)]
pub struct Notifier {
    state: Arc<Mutex<NotifierState>>,
    ttl: Duration,
    tx: broadcast::Sender<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_TTL)
    }
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { state: Default::default(), ttl, tx }
    }

    /// Posts a notice, replacing the current one.
    pub fn notify(&self, message: impl Into<String>) -> Notice {
        let message = message.into();
        debug!(%message, "notice");
        let notice = {
            let mut state = self.state.lock();
            state.next_id += 1;
            let notice =
                Notice { id: state.next_id, message, expires_at: Instant::now() + self.ttl };
            state.notice = Some(notice.clone());
            notice
        };
        // no subscribers is fine
        let _ = self.tx.send(notice.clone());
        notice
    }

    /// Returns the current notice unless it has expired.
    pub fn current(&self) -> Option<Notice> {
        let mut state = self.state.lock();
        if state.notice.as_ref().is_some_and(|notice| notice.expires_at <= Instant::now()) {
            state.notice = None;
        }
        state.notice.clone()
    }

    /// Returns the current notice's message.
    pub fn message(&self) -> Option<String> {
        self.current().map(|notice| notice.message)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    /// Opens the result dialog, replacing any open one.
    pub fn show_outcome(&self, outcome: Outcome) {
        self.state.lock().outcome = Some(outcome);
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.state.lock().outcome.clone()
    }

    /// Closes the result dialog and returns it.
    pub fn close_outcome(&self) -> Option<Outcome> {
        self.state.lock().outcome.take()
    }
}
