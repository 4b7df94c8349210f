//! Edit counter used for fast-exit.
//!
//! Every edit takes a ticket from the document's [`EditClock`]. Work started for a ticket is
//! stale as soon as the clock has moved past it: a newer edit exists, so the result would be
//! superseded anyway.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing edit counter shared between a document and its syntax worker.
#[derive(Debug, Clone, Default)]
pub struct EditClock(Arc<AtomicU64>);

/// The clock value an edit was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EditTicket(u64);

impl EditTicket {
    /// Raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }

    pub(crate) fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl EditClock {
    /// A clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock and return the ticket for the new edit.
    pub fn advance(&self) -> EditTicket {
        EditTicket(self.0.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// The ticket of the most recent edit.
    pub fn current(&self) -> EditTicket {
        EditTicket(self.0.load(Ordering::Acquire))
    }

    /// Returns `true` if a newer edit than `ticket` was issued.
    pub fn is_stale(&self, ticket: EditTicket) -> bool {
        self.current() != ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tickets_go_stale_after_advance() {
        let clock = EditClock::new();
        let first = clock.advance();
        assert!(!clock.is_stale(first));

        let shared = clock.clone();
        let second = shared.advance();
        assert!(clock.is_stale(first));
        assert!(!clock.is_stale(second));
        assert!(second > first);
        assert_eq!(clock.current(), second);
    }
}
