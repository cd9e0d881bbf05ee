use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::buffer_pool::BufferPool;
use crate::error::{SmallError, SmallResult};
use crate::page::HeapPage;
use crate::page_id::PageId;
use crate::permissions::Permission;
use crate::transaction_id::TransactionId;
use crate::tuple::Tuple;
use crate::tuple_desc::TupleDesc;
use crate::utils::stable_hash;

/// A heap file on disk: a flat sequence of fixed-size pages holding one
/// table's tuples, unordered. `table_id` is derived once from the
/// canonicalized file path so it is stable across process restarts
/// (see spec.md §2).
pub struct HeapFile {
    path: PathBuf,
    table_id: i32,
    tuple_desc: Arc<TupleDesc>,
}

impl HeapFile {
    pub fn new<P: AsRef<Path>>(path: P, tuple_desc: Arc<TupleDesc>) -> Self {
        let path = path.as_ref().to_path_buf();
        let table_id = stable_hash(&path);
        Self {
            path,
            table_id,
            tuple_desc,
        }
    }

    pub fn table_id(&self) -> i32 {
        self.table_id
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.tuple_desc
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> SmallResult<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)?)
    }

    /// Number of complete pages currently on disk.
    pub fn num_pages(&self) -> SmallResult<usize> {
        let file = self.open()?;
        let len = file.metadata()?.len() as usize;
        let page_size = BufferPool::get_page_size();
        Ok(len / page_size)
    }

    /// Reads page `pid.page_number` directly from disk, bypassing the
    /// buffer pool. `pid.page_number` must be `< num_pages()`.
    pub fn read_page(&self, pid: PageId) -> SmallResult<HeapPage> {
        let page_size = BufferPool::get_page_size();
        let mut file = self.open()?;
        let offset = (pid.page_number * page_size) as u64;

        if offset + page_size as u64 > file.metadata()?.len() {
            return Err(SmallError::invalid_page(pid.page_number));
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; page_size];
        file.read_exact(&mut buf)?;
        Ok(HeapPage::new(pid, self.tuple_desc.clone(), page_size, buf))
    }

    /// Writes `page` back to its own slot on disk, growing the file
    /// with zero pages if necessary. Caller (the buffer pool) is
    /// responsible for having forced the WAL record first.
    pub fn write_page(&self, page: &HeapPage) -> SmallResult<()> {
        let page_size = BufferPool::get_page_size();
        let mut file = self.open()?;
        let num_pages = (file.metadata()?.len() as usize) / page_size;
        let page_number = page.pid().page_number;
        if page_number > num_pages {
            return Err(SmallError::invalid_page(page_number));
        }

        let offset = (page_number * page_size) as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&page.get_page_data())?;
        file.sync_data()?;
        Ok(())
    }

    /// Appends a new all-empty page and returns its `PageId`.
    pub fn append_empty_page(&self) -> SmallResult<PageId> {
        let page_size = BufferPool::get_page_size();
        let mut file = self.open()?;
        let len = file.metadata()?.len();
        let page_number = (len as usize) / page_size;
        file.seek(SeekFrom::End(0))?;
        file.write_all(&vec![0u8; page_size])?;
        file.sync_data()?;
        Ok(PageId::new(self.table_id, page_number))
    }

    /// Inserts `tuple` into the first page with a free slot, routed
    /// through `pool` so the page is latched, logged and cached like
    /// any other mutation. Appends a fresh page when every existing
    /// page is full.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        pool: &BufferPool,
        tuple: &mut Tuple,
    ) -> SmallResult<()> {
        let num_pages = self.num_pages()?;
        for page_number in 0..num_pages {
            let pid = PageId::new(self.table_id, page_number);
            let page = pool.get_page(tid, pid, Permission::ReadWrite)?;
            let has_space = {
                let guard = page.lock().unwrap();
                guard.get_num_empty_slots() > 0
            };
            if has_space {
                let mut guard = page.lock().unwrap();
                guard.insert_tuple(tuple)?;
                guard.mark_dirty(true, tid);
                return Ok(());
            }
            pool.unsafe_release_page(tid, pid);
        }

        let pid = self.append_empty_page()?;
        let page = pool.get_page(tid, pid, Permission::ReadWrite)?;
        let mut guard = page.lock().unwrap();
        guard.insert_tuple(tuple)?;
        guard.mark_dirty(true, tid);
        Ok(())
    }

    /// Deletes `tuple` (identified by its `record_id`) via the page it
    /// lives on.
    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        pool: &BufferPool,
        tuple: &Tuple,
    ) -> SmallResult<()> {
        let record_id = tuple.record_id().ok_or_else(SmallError::not_found)?;
        let page = pool.get_page(tid, record_id.page_id, Permission::ReadWrite)?;
        let mut guard = page.lock().unwrap();
        guard.delete_tuple(tuple)?;
        guard.mark_dirty(true, tid);
        Ok(())
    }

    /// A restartable iterator over every tuple in the file, reading
    /// pages through `pool` page by page.
    pub fn iterator<'a>(
        &'a self,
        tid: TransactionId,
        pool: &'a BufferPool,
    ) -> SmallResult<HeapFileIterator<'a>> {
        Ok(HeapFileIterator::new(self, tid, pool))
    }
}

/// Lazily pulls pages from the buffer pool one at a time and yields
/// their occupied tuples in slot order, then page order.
pub struct HeapFileIterator<'a> {
    file: &'a HeapFile,
    tid: TransactionId,
    pool: &'a BufferPool,
    next_page: usize,
    num_pages: usize,
    current: Vec<Tuple>,
    current_index: usize,
}

impl<'a> HeapFileIterator<'a> {
    fn new(file: &'a HeapFile, tid: TransactionId, pool: &'a BufferPool) -> Self {
        Self {
            file,
            tid,
            pool,
            next_page: 0,
            num_pages: 0,
            current: Vec::new(),
            current_index: 0,
        }
    }

    /// Restart from the first page, re-reading `num_pages()` fresh.
    pub fn rewind(&mut self) -> SmallResult<()> {
        self.next_page = 0;
        self.num_pages = self.file.num_pages()?;
        self.current = Vec::new();
        self.current_index = 0;
        Ok(())
    }

    fn load_next_page(&mut self) -> SmallResult<bool> {
        while self.next_page < self.num_pages {
            let pid = PageId::new(self.file.table_id, self.next_page);
            self.next_page += 1;
            let page = self
                .pool
                .get_page(self.tid, pid, Permission::ReadOnly)?;
            let guard = page.lock().unwrap();
            self.current = guard.iterator().cloned().collect();
            self.current_index = 0;
            if !self.current.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl<'a> Iterator for HeapFileIterator<'a> {
    type Item = SmallResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_pages == 0 && self.next_page == 0 {
            match self.rewind() {
                Ok(()) => {}
                Err(e) => return Some(Err(e)),
            }
        }

        loop {
            if self.current_index < self.current.len() {
                let tuple = self.current[self.current_index].clone();
                self.current_index += 1;
                return Some(Ok(tuple));
            }
            match self.load_next_page() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
