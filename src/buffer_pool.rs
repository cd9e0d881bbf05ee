use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{SmallError, SmallResult};
use crate::heap_file::HeapFile;
use crate::lock_manager::LockManager;
use crate::log_sink::LogSink;
use crate::page::HeapPage;
use crate::page_id::PageId;
use crate::permissions::{LockMode, Permission};
use crate::transaction_id::TransactionId;
use crate::tuple::Tuple;

/// Default page size in bytes. Overridable at runtime through
/// [`BufferPool::set_page_size`], which exists purely as a test hook
/// (see spec.md §6) — production code should never call it.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default cache capacity, in pages.
pub const DEFAULT_PAGES: usize = 50;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

struct Node {
    pid: PageId,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Index-based doubly linked list recording recency order. Avoids the
/// reference cycles a pointer-linked list would need in safe Rust;
/// `head` is most-recently-used, `tail` is the next eviction
/// candidate.
struct LruList {
    nodes: Vec<Node>,
    index: HashMap<PageId, usize>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl LruList {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[slot].prev = None;
        self.nodes[slot].next = None;
    }

    fn push_front(&mut self, slot: usize) {
        self.nodes[slot].prev = None;
        self.nodes[slot].next = self.head;
        if let Some(h) = self.head {
            self.nodes[h].prev = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }

    /// Marks `pid` as most-recently-used, inserting it if new.
    fn touch(&mut self, pid: PageId) {
        if let Some(&slot) = self.index.get(&pid) {
            self.unlink(slot);
            self.push_front(slot);
            return;
        }

        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Node {
                    pid,
                    prev: None,
                    next: None,
                };
                slot
            }
            None => {
                self.nodes.push(Node {
                    pid,
                    prev: None,
                    next: None,
                });
                self.nodes.len() - 1
            }
        };
        self.index.insert(pid, slot);
        self.push_front(slot);
    }

    fn remove(&mut self, pid: PageId) {
        if let Some(slot) = self.index.remove(&pid) {
            self.unlink(slot);
            self.free.push(slot);
        }
    }

    fn lru_order(&self) -> Vec<PageId> {
        let mut out = Vec::with_capacity(self.index.len());
        let mut cur = self.tail;
        while let Some(slot) = cur {
            out.push(self.nodes[slot].pid);
            cur = self.nodes[slot].prev;
        }
        out
    }
}

struct Inner {
    pages: HashMap<PageId, Arc<Mutex<HeapPage>>>,
    lru: LruList,
    capacity: usize,
}

/// The shared page cache. Owns the lock manager and drives the
/// force-on-commit, no-steal buffer policy: a dirty page's bytes never
/// reach disk until its owning transaction commits, and a dirty page is
/// never chosen for eviction.
pub struct BufferPool {
    lock_manager: LockManager,
    log_sink: Arc<dyn LogSink>,
    files: Mutex<HashMap<i32, Arc<HeapFile>>>,
    inner: Mutex<Inner>,
}

impl BufferPool {
    pub fn new(log_sink: Arc<dyn LogSink>) -> Self {
        Self::with_capacity(log_sink, DEFAULT_PAGES)
    }

    pub fn with_capacity(log_sink: Arc<dyn LogSink>, capacity: usize) -> Self {
        Self {
            lock_manager: LockManager::new(),
            log_sink,
            files: Mutex::new(HashMap::new()),
            inner: Mutex::new(Inner {
                pages: HashMap::new(),
                lru: LruList::new(),
                capacity,
            }),
        }
    }

    pub fn get_page_size() -> usize {
        PAGE_SIZE.load(Ordering::Relaxed)
    }

    /// Test-only hook: globally override the page size.
    pub fn set_page_size(size: usize) {
        PAGE_SIZE.store(size, Ordering::Relaxed);
    }

    pub fn reset_page_size() {
        PAGE_SIZE.store(DEFAULT_PAGE_SIZE, Ordering::Relaxed);
    }

    /// Registers the file backing `file.table_id()` so `get_page` can
    /// resolve a miss to disk. Callers usually do this through
    /// [`crate::catalog::Catalog::add_table`].
    pub fn register_file(&self, file: Arc<HeapFile>) {
        self.files.lock().unwrap().insert(file.table_id(), file);
    }

    fn file_for(&self, table_id: i32) -> SmallResult<Arc<HeapFile>> {
        self.files
            .lock()
            .unwrap()
            .get(&table_id)
            .cloned()
            .ok_or_else(SmallError::not_found)
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds_lock(tid, pid)
    }

    pub fn lock_mode(&self, tid: TransactionId, pid: PageId) -> Option<LockMode> {
        self.lock_manager.lock_mode(tid, pid)
    }

    /// Returns the cached page for `pid`. The page is materialized and
    /// installed at the MRU end of the cache first — pulling it from
    /// disk on a miss, evicting a clean page first if the cache is
    /// full — and only then does the caller attempt to acquire the
    /// requested lock (blocking up to the lock manager's deadline).
    /// A lock timeout still leaves the page cached for the next caller.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permission,
    ) -> SmallResult<Arc<Mutex<HeapPage>>> {
        let page = {
            let mut inner = self.inner.lock().unwrap();
            match inner.pages.get(&pid).cloned() {
                Some(page) => {
                    inner.lru.touch(pid);
                    page
                }
                None => {
                    drop(inner);

                    let file = self.file_for(pid.table_id)?;
                    let fresh = file.read_page(pid)?;

                    // Re-acquire the monitor and do the capacity
                    // check, eviction, and insert as one critical
                    // section: another thread's miss on a different
                    // page may have filled the cache while `inner` was
                    // unlocked for the disk read above, so the
                    // capacity must be re-validated here, immediately
                    // before inserting, not just once back in the
                    // lookup branch.
                    let mut inner = self.inner.lock().unwrap();
                    match inner.pages.get(&pid).cloned() {
                        Some(existing) => {
                            inner.lru.touch(pid);
                            existing
                        }
                        None => {
                            if inner.pages.len() >= inner.capacity {
                                self.evict_one(&mut inner)?;
                            }
                            log::debug!("page fault: loaded {:?} from disk", pid);
                            let page = Arc::new(Mutex::new(fresh));
                            inner.pages.insert(pid, page.clone());
                            inner.lru.touch(pid);
                            page
                        }
                    }
                }
            }
        };

        self.lock_manager.acquire(tid, pid, perm.to_lock_mode())?;
        Ok(page)
    }

    /// Releases `tid`'s lock on `pid` without touching the cache.
    /// Named for the same reason the teacher names its equivalent
    /// "unsafe": releasing a lock before `transaction_complete` breaks
    /// strict two-phase locking and is only safe when the caller knows
    /// it will not read `pid` again under `tid`.
    pub fn unsafe_release_page(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release(tid, pid);
    }

    /// Evicts the least-recently-used page that is not dirty. No-steal
    /// means a dirty page can never be written out to make room, so if
    /// every cached page is dirty there is nothing safe to evict.
    fn evict_one(&self, inner: &mut Inner) -> SmallResult<()> {
        for pid in inner.lru.lru_order() {
            let is_clean = {
                let page = inner.pages.get(&pid).unwrap();
                !page.lock().unwrap().is_dirty()
            };
            if is_clean {
                log::debug!("evicting clean page {:?} to make room", pid);
                inner.pages.remove(&pid);
                inner.lru.remove(pid);
                return Ok(());
            }
        }
        log::warn!("buffer pool full and every cached page is dirty, aborting");
        Err(SmallError::transaction_aborted(
            "buffer pool is full and every cached page is dirty",
        ))
    }

    /// Number of pages currently cached. Exposed for tests asserting
    /// Testable Property 1 (spec.md §8): the cache never holds more
    /// entries than its configured capacity.
    pub fn cached_page_count(&self) -> usize {
        self.inner.lock().unwrap().pages.len()
    }

    /// Drops `pid` from the cache without flushing it, regardless of
    /// dirty state. Used during abort to shed a page whose before-image
    /// recovery already happened in `transaction_complete`.
    pub fn discard_page(&self, pid: PageId) {
        let mut inner = self.inner.lock().unwrap();
        inner.pages.remove(&pid);
        inner.lru.remove(pid);
    }

    /// Forces the WAL record for `pid`'s current dirty image, writes it
    /// to its heap file, then marks it clean and rebases its
    /// before-image. No-op if `pid` isn't cached or isn't dirty.
    pub fn flush_page(&self, pid: PageId) -> SmallResult<()> {
        let page_arc = {
            let inner = self.inner.lock().unwrap();
            match inner.pages.get(&pid).cloned() {
                Some(p) => p,
                None => return Ok(()),
            }
        };

        let mut page = page_arc.lock().unwrap();
        let tid = match page.dirty_tid() {
            Some(tid) => tid,
            None => return Ok(()),
        };

        let before = page.before_image().to_vec();
        let after = page.get_page_data();
        self.log_sink.log_write(tid, pid, &before, &after);
        self.log_sink.force();

        let file = self.file_for(pid.table_id)?;
        file.write_page(&page)?;
        page.set_before_image();
        page.mark_dirty(false, tid);
        Ok(())
    }

    /// Flushes every dirty cached page. Used by recovery-free callers
    /// that just want everything durable (e.g. orderly shutdown).
    pub fn flush_all_pages(&self) -> SmallResult<()> {
        let pids: Vec<PageId> = {
            let inner = self.inner.lock().unwrap();
            inner.pages.keys().copied().collect()
        };
        for pid in pids {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Ends `tid`: on commit, flushes every page it dirtied (forcing
    /// the log first) and rebases their before-images; on abort,
    /// reverts every page it dirtied back to its before-image in
    /// place. Either way, a commit/abort log record is appended once
    /// the pages are settled, and every lock `tid` held is released
    /// last, so no other transaction can observe a half-finished
    /// cleanup.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) {
        let pids: Vec<PageId> = {
            let inner = self.inner.lock().unwrap();
            inner.pages.keys().copied().collect()
        };

        for pid in pids {
            if !self.lock_manager.holds_lock(tid, pid) {
                continue;
            }

            let page_arc = {
                let inner = self.inner.lock().unwrap();
                inner.pages.get(&pid).cloned()
            };
            let page_arc = match page_arc {
                Some(p) => p,
                None => continue,
            };
            let mut page = page_arc.lock().unwrap();
            if page.dirty_tid() != Some(tid) {
                continue;
            }

            if commit {
                drop(page);
                if let Err(e) = self.flush_page(pid) {
                    e.show_backtrace();
                }
            } else {
                let before = page.before_image().to_vec();
                let tuple_desc = page.tuple_desc().clone();
                let page_size = Self::get_page_size();
                *page = HeapPage::new(pid, tuple_desc, page_size, before);
            }
        }

        if commit {
            self.log_sink.log_commit(tid);
        } else {
            self.log_sink.log_abort(tid);
        }

        self.lock_manager.release_all(tid);
    }

    /// Inserts `tuple` into `table_id`'s heap file, routed through this
    /// pool so the affected page is latched, cached and marked dirty.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: i32,
        tuple: &mut Tuple,
    ) -> SmallResult<()> {
        let file = self.file_for(table_id)?;
        file.insert_tuple(tid, self, tuple)
    }

    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> SmallResult<()> {
        let pid = tuple.record_id().ok_or_else(SmallError::not_found)?.page_id;
        let file = self.file_for(pid.table_id)?;
        file.delete_tuple(tid, self, tuple)
    }
}
