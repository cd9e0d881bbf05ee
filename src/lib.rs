//! A teaching-grade relational storage core: a page-cache buffer pool,
//! a page-level two-phase lock manager, and heap-file page I/O, in the
//! spirit of MIT 6.830's SimpleDB. There is no query executor, parser,
//! or index here — only the storage layer underneath one.

pub mod buffer_pool;
pub mod catalog;
pub mod database;
pub mod error;
pub mod field;
pub mod heap_file;
pub mod lock_manager;
pub mod log;
pub mod log_sink;
pub mod page;
pub mod page_id;
pub mod permissions;
pub mod predicate;
pub mod sequential_scan;
pub mod transaction_id;
pub mod tuple;
pub mod tuple_desc;
pub mod utils;

pub use buffer_pool::BufferPool;
pub use catalog::Catalog;
pub use database::Database;
pub use error::{SmallError, SmallResult};
pub use field::{Field, FieldType};
pub use heap_file::HeapFile;
pub use lock_manager::LockManager;
pub use log_sink::{LogSink, NoOpLogSink, RecordingLogSink};
pub use page::HeapPage;
pub use page_id::{PageId, RecordId};
pub use permissions::{LockMode, Permission};
pub use predicate::{Op, Predicate};
pub use sequential_scan::SequentialScan;
pub use transaction_id::TransactionId;
pub use tuple::Tuple;
pub use tuple_desc::TupleDesc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple_desc::simple_int_tuple_desc;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    #[test]
    fn end_to_end_insert_commit_and_scan() {
        crate::log::init_log();

        let tmp = NamedTempFile::new().unwrap();
        let desc = Arc::new(simple_int_tuple_desc(2, "col"));
        let file = Arc::new(HeapFile::new(tmp.path(), desc.clone()));

        let db = Database::global();
        db.add_table(file.clone(), "smoke");

        let tid = TransactionId::new();
        let mut t = Tuple::new(desc, vec![Field::Int(1), Field::Int(2)]);
        db.buffer_pool().insert_tuple(tid, file.table_id(), &mut t).unwrap();
        db.buffer_pool().transaction_complete(tid, true);

        let tid2 = TransactionId::new();
        let rows: Vec<Tuple> = SequentialScan::new(&file, tid2, db.buffer_pool(), None)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_field(0), &Field::Int(1));
    }
}
