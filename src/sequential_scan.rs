use crate::buffer_pool::BufferPool;
use crate::error::SmallResult;
use crate::heap_file::{HeapFile, HeapFileIterator};
use crate::predicate::Predicate;
use crate::transaction_id::TransactionId;
use crate::tuple::Tuple;

/// A full scan of `file`, optionally filtered by a single [`Predicate`]
/// applied as each tuple is pulled — the simplest possible access
/// method, standing in for a query executor's leaf operator.
pub struct SequentialScan<'a> {
    inner: HeapFileIterator<'a>,
    predicate: Option<Predicate>,
}

impl<'a> SequentialScan<'a> {
    pub fn new(
        file: &'a HeapFile,
        tid: TransactionId,
        pool: &'a BufferPool,
        predicate: Option<Predicate>,
    ) -> SmallResult<Self> {
        Ok(Self {
            inner: file.iterator(tid, pool)?,
            predicate,
        })
    }

    pub fn rewind(&mut self) -> SmallResult<()> {
        self.inner.rewind()
    }
}

impl<'a> Iterator for SequentialScan<'a> {
    type Item = SmallResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(tuple) => match &self.predicate {
                    Some(p) if !p.matches(&tuple) => continue,
                    _ => return Some(Ok(tuple)),
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
