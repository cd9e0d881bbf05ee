use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{SmallError, SmallResult};
use crate::page_id::PageId;
use crate::permissions::LockMode;
use crate::transaction_id::TransactionId;

/// How long a blocked `acquire` waits before giving up and aborting its
/// transaction. Deadlocks are resolved purely by this timeout — no
/// wait-for graph is built, unlike a full two-phase-locking
/// implementation's cycle detector.
const LOCK_WAIT_TIMEOUT: Duration = Duration::from_millis(500);

struct LockTable {
    /// `pid -> (tid -> mode)`: every lock currently held, by page then
    /// holder.
    holders: HashMap<PageId, HashMap<TransactionId, LockMode>>,
    /// Reverse index of `holders`, kept in sync, so `release_all` does
    /// not need to scan every page a transaction never touched.
    held_by: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockTable {
    fn new() -> Self {
        Self {
            holders: HashMap::new(),
            held_by: HashMap::new(),
        }
    }

    fn holders_of(&self, pid: PageId) -> Option<&HashMap<TransactionId, LockMode>> {
        self.holders.get(&pid)
    }

    /// Returns `true` if `tid` may be granted `mode` on `pid` right
    /// now, given who else holds a lock on it. Implements the decision
    /// table:
    ///   - no holders: always grant.
    ///   - sole holder is `tid` requesting Shared while holding
    ///     anything, or Exclusive while holding Exclusive: grant (no-op).
    ///   - sole holder is `tid` holding Shared, requesting Exclusive:
    ///     grant (in-place upgrade).
    ///   - any other holder present: grant only if every holder is
    ///     `tid` itself (same rules as above) or, for a Shared request,
    ///     every current holder holds Shared and none is a different
    ///     transaction wanting Exclusive — in this simple model a
    ///     Shared request is blocked by ANY Exclusive holder (including
    ///     itself already holding Exclusive is fine) and by any OTHER
    ///     transaction's presence when requesting Exclusive.
    fn can_grant(&self, pid: PageId, tid: TransactionId, mode: LockMode) -> bool {
        let holders = match self.holders_of(pid) {
            None => return true,
            Some(h) if h.is_empty() => return true,
            Some(h) => h,
        };

        if holders.len() == 1 {
            if let Some(&existing) = holders.get(&tid) {
                return match (existing, mode) {
                    (LockMode::Shared, LockMode::Shared) => true,
                    (LockMode::Shared, LockMode::Exclusive) => true,
                    (LockMode::Exclusive, _) => true,
                };
            }
        }

        match mode {
            LockMode::Shared => holders.values().all(|&m| m == LockMode::Shared),
            LockMode::Exclusive => false,
        }
    }

    /// Records that `tid` holds (at least) `mode` on `pid`. Never
    /// weakens an existing entry: a transaction that already holds
    /// `Exclusive` and redundantly re-requests `Shared` (the "exactly
    /// 1 X holder = tid" no-op row of the decision table) must keep
    /// its `Exclusive` grant, or a second transaction's subsequent
    /// `Shared` request would see a lone `Shared` holder and be
    /// granted concurrently.
    fn grant(&mut self, pid: PageId, tid: TransactionId, mode: LockMode) {
        let entry = self.holders.entry(pid).or_default().entry(tid).or_insert(mode);
        *entry = (*entry).max(mode);
        self.held_by.entry(tid).or_default().insert(pid);
    }

    fn holds(&self, pid: PageId, tid: TransactionId) -> Option<LockMode> {
        self.holders.get(&pid).and_then(|h| h.get(&tid)).copied()
    }

    fn release(&mut self, pid: PageId, tid: TransactionId) {
        if let Some(holders) = self.holders.get_mut(&pid) {
            holders.remove(&tid);
            if holders.is_empty() {
                self.holders.remove(&pid);
            }
        }
        if let Some(pages) = self.held_by.get_mut(&tid) {
            pages.remove(&pid);
            if pages.is_empty() {
                self.held_by.remove(&tid);
            }
        }
    }

    fn release_all(&mut self, tid: TransactionId) -> Vec<PageId> {
        let pages: Vec<PageId> = self
            .held_by
            .remove(&tid)
            .map(|s| s.into_iter().collect())
            .unwrap_or_default();
        for &pid in &pages {
            if let Some(holders) = self.holders.get_mut(&pid) {
                holders.remove(&tid);
                if holders.is_empty() {
                    self.holders.remove(&pid);
                }
            }
        }
        pages
    }
}

/// Page-level two-phase lock manager. One [`LockMode`] per
/// `(page, transaction)` pair; a transaction holding `Shared` alone on
/// a page may upgrade in place to `Exclusive`. Conflicting acquires
/// block on a condvar and abort with `TransactionAborted` after
/// [`LOCK_WAIT_TIMEOUT`].
pub struct LockManager {
    table: Mutex<LockTable>,
    released: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(LockTable::new()),
            released: Condvar::new(),
        }
    }

    /// Blocks until `tid` holds at least `mode` on `pid`, or returns
    /// `TransactionAborted` once `LOCK_WAIT_TIMEOUT` has elapsed
    /// without a grant.
    pub fn acquire(&self, tid: TransactionId, pid: PageId, mode: LockMode) -> SmallResult<()> {
        let deadline = Instant::now() + LOCK_WAIT_TIMEOUT;
        let mut table = self.table.lock().unwrap();

        loop {
            if table.can_grant(pid, tid, mode) {
                table.grant(pid, tid, mode);
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                log::warn!(
                    "transaction {:?} timed out after {:?} waiting for {:?} lock on page {:?}",
                    tid,
                    LOCK_WAIT_TIMEOUT,
                    mode,
                    pid
                );
                return Err(SmallError::transaction_aborted(&format!(
                    "timed out waiting for {:?} lock on page {:?}",
                    mode, pid
                )));
            }

            let (guard, timeout_result) = self
                .released
                .wait_timeout(table, deadline - now)
                .unwrap();
            table = guard;
            let _ = timeout_result;
        }
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.table.lock().unwrap().holds(pid, tid).is_some()
    }

    pub fn lock_mode(&self, tid: TransactionId, pid: PageId) -> Option<LockMode> {
        self.table.lock().unwrap().holds(pid, tid)
    }

    /// Releases `tid`'s lock on `pid` and wakes any acquirer blocked
    /// on this page.
    pub fn release(&self, tid: TransactionId, pid: PageId) {
        let mut table = self.table.lock().unwrap();
        table.release(pid, tid);
        drop(table);
        self.released.notify_all();
    }

    /// Releases every lock `tid` holds and returns the set of pages it
    /// had locked, so the caller can decide what to do with each
    /// (flush on commit, revert on abort).
    pub fn release_all(&self, tid: TransactionId) -> Vec<PageId> {
        let mut table = self.table.lock().unwrap();
        let pages = table.release_all(tid);
        drop(table);
        self.released.notify_all();
        pages
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncontended_shared_and_exclusive_grant_immediately() {
        let lm = LockManager::new();
        let tid = TransactionId::new();
        let pid = PageId::new(1, 0);
        lm.acquire(tid, pid, LockMode::Shared).unwrap();
        assert_eq!(lm.lock_mode(tid, pid), Some(LockMode::Shared));
    }

    #[test]
    fn redundant_shared_request_does_not_downgrade_an_exclusive_holder() {
        let lm = LockManager::new();
        let pid = PageId::new(1, 0);
        let a = TransactionId::new();
        let b = TransactionId::new();

        lm.acquire(a, pid, LockMode::Exclusive).unwrap();
        // Same-transaction no-op re-request at a weaker mode.
        lm.acquire(a, pid, LockMode::Shared).unwrap();
        assert_eq!(lm.lock_mode(a, pid), Some(LockMode::Exclusive));

        // A's grant must still be exclusive, so a second transaction's
        // shared request is denied rather than silently admitted.
        let result = lm.acquire(b, pid, LockMode::Shared);
        assert!(matches!(result, Err(SmallError::TransactionAborted { .. })));
    }

    #[test]
    fn shared_lock_upgrades_in_place_when_sole_holder() {
        let lm = LockManager::new();
        let tid = TransactionId::new();
        let pid = PageId::new(1, 0);
        lm.acquire(tid, pid, LockMode::Shared).unwrap();
        lm.acquire(tid, pid, LockMode::Exclusive).unwrap();
        assert_eq!(lm.lock_mode(tid, pid), Some(LockMode::Exclusive));
    }

    #[test]
    fn two_transactions_can_share_a_page() {
        let lm = LockManager::new();
        let pid = PageId::new(1, 0);
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        lm.acquire(t1, pid, LockMode::Shared).unwrap();
        lm.acquire(t2, pid, LockMode::Shared).unwrap();
        assert!(lm.holds_lock(t1, pid));
        assert!(lm.holds_lock(t2, pid));
    }

    #[test]
    fn exclusive_request_times_out_against_other_holder() {
        let lm = LockManager::new();
        let pid = PageId::new(1, 0);
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        lm.acquire(t1, pid, LockMode::Shared).unwrap();
        let result = lm.acquire(t2, pid, LockMode::Exclusive);
        assert!(matches!(result, Err(SmallError::TransactionAborted { .. })));
    }

    #[test]
    fn release_wakes_a_waiting_acquirer() {
        let lm = std::sync::Arc::new(LockManager::new());
        let pid = PageId::new(1, 0);
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        lm.acquire(t1, pid, LockMode::Exclusive).unwrap();

        let lm2 = lm.clone();
        let handle = std::thread::spawn(move || lm2.acquire(t2, pid, LockMode::Shared));

        std::thread::sleep(Duration::from_millis(50));
        lm.release(t1, pid);

        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn release_all_frees_every_page_a_transaction_held() {
        let lm = LockManager::new();
        let tid = TransactionId::new();
        let p1 = PageId::new(1, 0);
        let p2 = PageId::new(1, 1);
        lm.acquire(tid, p1, LockMode::Shared).unwrap();
        lm.acquire(tid, p2, LockMode::Exclusive).unwrap();

        let released = lm.release_all(tid);
        assert_eq!(released.len(), 2);
        assert!(!lm.holds_lock(tid, p1));
        assert!(!lm.holds_lock(tid, p2));
    }
}
