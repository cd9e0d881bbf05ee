use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque transaction identifier. Equality-comparable, cheap to copy,
/// monotonically increasing so the deadlock-by-timeout tests can assert
/// ordering between transactions without any other bookkeeping.
#[derive(Eq, Hash, PartialEq, Clone, Copy)]
pub struct TransactionId {
    uuid: u64,
}

impl TransactionId {
    pub fn new() -> Self {
        Self {
            uuid: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Build a specific id. Used by tests that need deterministic,
    /// reproducible transaction identities.
    pub fn from_raw(id: u64) -> Self {
        Self { uuid: id }
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tx_{}", self.uuid)
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
