use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::heap_file::HeapFile;

/// In-memory table registry: maps a table's stable id to its heap file
/// and a human-readable name. There is no schema DDL in this crate —
/// callers construct a [`HeapFile`] themselves and register it here.
#[derive(Default)]
pub struct Catalog {
    files: RwLock<HashMap<i32, Arc<HeapFile>>>,
    names: RwLock<HashMap<i32, String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&self, file: Arc<HeapFile>, name: &str) {
        let table_id = file.table_id();
        log::info!("registering table {:?} (id {}) with the catalog", name, table_id);
        self.files.write().unwrap().insert(table_id, file);
        self.names.write().unwrap().insert(table_id, name.to_string());
    }

    pub fn get_database_file(&self, table_id: i32) -> Option<Arc<HeapFile>> {
        self.files.read().unwrap().get(&table_id).cloned()
    }

    pub fn get_table_name(&self, table_id: i32) -> Option<String> {
        self.names.read().unwrap().get(&table_id).cloned()
    }

    pub fn table_id_iterator(&self) -> Vec<i32> {
        self.files.read().unwrap().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple_desc::simple_int_tuple_desc;
    use tempfile::NamedTempFile;

    #[test]
    fn registered_table_is_retrievable_by_id_and_name() {
        let tmp = NamedTempFile::new().unwrap();
        let desc = Arc::new(simple_int_tuple_desc(2, "f"));
        let file = Arc::new(HeapFile::new(tmp.path(), desc));
        let table_id = file.table_id();

        let catalog = Catalog::new();
        catalog.add_table(file, "widgets");

        assert!(catalog.get_database_file(table_id).is_some());
        assert_eq!(catalog.get_table_name(table_id).as_deref(), Some("widgets"));
        assert_eq!(catalog.table_id_iterator(), vec![table_id]);
    }
}
