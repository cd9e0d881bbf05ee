/// Identity of a page: which table it belongs to and its offset within
/// that table's heap file.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub struct PageId {
    pub table_id: i32,
    pub page_number: usize,
}

impl PageId {
    pub fn new(table_id: i32, page_number: usize) -> Self {
        Self {
            table_id,
            page_number,
        }
    }
}

/// Anchor of a materialized tuple: the page it lives on plus its slot.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_number: usize,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_number: usize) -> Self {
        Self {
            page_id,
            slot_number,
        }
    }
}
