use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::heap_file::HeapFile;
use crate::log_sink::{LogSink, NoOpLogSink};

/// Process-wide context bundling the catalog and the buffer pool that
/// reads through it, mirroring the single "database instance" a real
/// engine's executors reach for implicitly. Most code should prefer
/// threading an explicit `&BufferPool`/`&Catalog` through; `global()`
/// exists for call sites (and tests) that have no natural place to
/// carry one.
pub struct Database {
    catalog: Catalog,
    buffer_pool: BufferPool,
}

static INSTANCE: OnceCell<Database> = OnceCell::new();

impl Database {
    fn new() -> Self {
        Self {
            catalog: Catalog::new(),
            buffer_pool: BufferPool::new(Arc::new(NoOpLogSink) as Arc<dyn LogSink>),
        }
    }

    pub fn global() -> &'static Database {
        INSTANCE.get_or_init(Database::new)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    /// Registers `file` with both the catalog (by name) and the buffer
    /// pool (by table id), so later `buffer_pool().get_page(...)` calls
    /// for its pages resolve on a cache miss.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str) {
        self.buffer_pool.register_file(file.clone());
        self.catalog.add_table(file, name);
    }
}
