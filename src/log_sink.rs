use std::sync::Mutex;

use crate::page_id::PageId;
use crate::transaction_id::TransactionId;

/// Write-ahead-log contract the buffer pool drives: a dirty page is
/// never written to disk (force policy) before its before/after images
/// have been logged and forced, per spec.md §5.
///
/// This crate doesn't implement a real durable log — that's out of
/// scope — but every code path that matters is written against this
/// trait so the force-before-write ordering is exercised and testable.
pub trait LogSink: Send + Sync {
    /// Record `(tid, pid, before, after)` for a page about to be
    /// flushed. Must be called, and `force`d, before the page's bytes
    /// hit disk.
    fn log_write(&self, tid: TransactionId, pid: PageId, before: &[u8], after: &[u8]);

    /// Record that `tid` committed or aborted.
    fn log_commit(&self, tid: TransactionId);
    fn log_abort(&self, tid: TransactionId);

    /// Force all buffered log records to stable storage.
    fn force(&self);
}

/// The default sink: discards everything. Used whenever a test or
/// caller has no interest in the WAL stream itself.
pub struct NoOpLogSink;

impl LogSink for NoOpLogSink {
    fn log_write(&self, _tid: TransactionId, _pid: PageId, _before: &[u8], _after: &[u8]) {}
    fn log_commit(&self, _tid: TransactionId) {}
    fn log_abort(&self, _tid: TransactionId) {}
    fn force(&self) {}
}

/// One recorded call into a [`LogSink`], kept in order of arrival.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    Write { tid: TransactionId, pid: PageId },
    Commit { tid: TransactionId },
    Abort { tid: TransactionId },
    Force,
}

/// A sink that records every call for later assertion by tests,
/// instead of discarding it. Deliberately a plain `pub` item rather
/// than `#[cfg(test)]`-gated: black-box tests under `tests/` link
/// against the crate compiled without `cfg(test)`, so a test-only item
/// would be invisible to them.
#[derive(Default)]
pub struct RecordingLogSink {
    events: Mutex<Vec<LogEvent>>,
}

impl RecordingLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Convenience check used by the force-before-write invariant
    /// tests: was `pid` logged (and a force seen after it) before the
    /// given index into `events()`?
    pub fn forced_before(&self, write_index: usize) -> bool {
        let events = self.events.lock().unwrap();
        events[..write_index]
            .iter()
            .rev()
            .take_while(|e| !matches!(e, LogEvent::Write { .. }))
            .any(|e| matches!(e, LogEvent::Force))
    }
}

impl LogSink for RecordingLogSink {
    fn log_write(&self, tid: TransactionId, pid: PageId, _before: &[u8], _after: &[u8]) {
        self.events.lock().unwrap().push(LogEvent::Write { tid, pid });
    }

    fn log_commit(&self, tid: TransactionId) {
        self.events.lock().unwrap().push(LogEvent::Commit { tid });
    }

    fn log_abort(&self, tid: TransactionId) {
        self.events.lock().unwrap().push(LogEvent::Abort { tid });
    }

    fn force(&self) {
        self.events.lock().unwrap().push(LogEvent::Force);
    }
}
