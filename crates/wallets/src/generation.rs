use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// A counter identifying the latest request of one refresh stream.
///
/// A refresh takes a [`Ticket`] before it starts; any state change that makes its result
/// obsolete advances the counter, and the result is only applied while the ticket is current.
#[derive(Clone, Debug, Default)]
pub struct Generation(Arc<AtomicU64>);

/// The generation a request was issued in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket(u64);

impl Generation {
    /// Invalidates all outstanding tickets and returns a fresh one.
    pub fn advance(&self) -> Ticket {
        Ticket(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.0.load(Ordering::SeqCst) == ticket.0
    }
}

/// Generation counters of the wallet's refresh streams.
#[derive(Clone, Debug, Default)]
pub(crate) struct Generations {
    pub balance: Generation,
    pub tokens: Generation,
    pub history: Generation,
}

impl Generations {
    /// Invalidates every stream, e.g. when the active address changes.
    pub fn advance_all(&self) {
        self.balance.advance();
        self.tokens.advance();
        self.history.advance();
    }
}
