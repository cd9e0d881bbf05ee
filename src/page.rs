use std::sync::Arc;

use crate::error::{SmallError, SmallResult};
use crate::page_id::{PageId, RecordId};
use crate::transaction_id::TransactionId;
use crate::tuple::Tuple;
use crate::tuple_desc::TupleDesc;

/// Fixed-size page: a header bitmap (one bit per slot, occupied = 1)
/// followed by `N` fixed-width tuple slots, plus the buffer-pool-local
/// bookkeeping (`dirty_tid`, `before_image`) described in spec.md §3.
///
/// `N = floor((PAGE_SIZE * 8) / (tuple_bits + 1))`; the header bitmap is
/// `ceil(N / 8)` bytes, LSB-first within each byte (bit 0 of byte 0
/// covers slot 0) per the on-disk layout in spec.md §6.
pub struct HeapPage {
    pid: PageId,
    tuple_desc: Arc<TupleDesc>,
    num_slots: usize,
    header: Vec<u8>,
    slots: Vec<Tuple>,
    dirty_tid: Option<TransactionId>,
    before_image: Vec<u8>,
}

impl HeapPage {
    /// Decode a page's bytes. `bytes` must be exactly `page_size` long.
    /// Freshly loaded pages are clean and snapshot `before_image` from
    /// `bytes` immediately, per spec.md §4.1.
    pub fn new(pid: PageId, tuple_desc: Arc<TupleDesc>, page_size: usize, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len(), page_size);

        let tuple_width = tuple_desc.width_bytes();
        let num_slots = Self::num_slots(page_size, tuple_width);
        let header_size = Self::header_size(num_slots);

        let header = bytes[..header_size].to_vec();

        let mut slots = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            let start = header_size + slot * tuple_width;
            let end = start + tuple_width;
            let mut tuple = Tuple::decode(tuple_desc.clone(), &bytes[start..end]);
            if Self::slot_used(&header, slot) {
                tuple.set_record_id(RecordId::new(pid, slot));
            }
            slots.push(tuple);
        }

        Self {
            pid,
            tuple_desc,
            num_slots,
            header,
            slots,
            dirty_tid: None,
            before_image: bytes,
        }
    }

    /// A freshly allocated, all-zero page (every header bit clear).
    pub fn empty(pid: PageId, tuple_desc: Arc<TupleDesc>, page_size: usize) -> Self {
        Self::new(pid, tuple_desc, page_size, vec![0u8; page_size])
    }

    pub fn pid(&self) -> PageId {
        self.pid
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.tuple_desc
    }

    fn num_slots(page_size: usize, tuple_width: usize) -> usize {
        let tuple_bits = tuple_width * 8;
        (page_size * 8) / (tuple_bits + 1)
    }

    fn header_size(num_slots: usize) -> usize {
        (num_slots + 7) / 8
    }

    fn slot_used(header: &[u8], slot: usize) -> bool {
        let byte = header[slot / 8];
        (byte >> (slot % 8)) & 1 != 0
    }

    fn set_slot_used(header: &mut [u8], slot: usize, used: bool) {
        let byte = &mut header[slot / 8];
        let mask = 1u8 << (slot % 8);
        if used {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    fn is_slot_used(&self, slot: usize) -> bool {
        Self::slot_used(&self.header, slot)
    }

    /// Lazy, restartable sequence over occupied slots in slot-number
    /// order. Restart by calling `iterator()` again.
    pub fn iterator(&self) -> impl Iterator<Item = &Tuple> + '_ {
        (0..self.num_slots)
            .filter(move |&slot| self.is_slot_used(slot))
            .map(move |slot| &self.slots[slot])
    }

    pub fn get_num_empty_slots(&self) -> usize {
        (0..self.num_slots)
            .filter(|&slot| !self.is_slot_used(slot))
            .count()
    }

    /// Assigns `t.record_id := (pid, first_zero_slot)` and stores it.
    /// Fails with `NoSpace` when every slot is occupied.
    pub fn insert_tuple(&mut self, t: &mut Tuple) -> SmallResult<()> {
        let slot = (0..self.num_slots)
            .find(|&slot| !self.is_slot_used(slot))
            .ok_or_else(SmallError::no_space)?;

        Self::set_slot_used(&mut self.header, slot, true);
        t.set_record_id(RecordId::new(self.pid, slot));
        self.slots[slot] = t.clone();
        Ok(())
    }

    /// Fails with `NotFound` when `t.record_id` doesn't name a slot on
    /// this page, or the slot is already empty.
    pub fn delete_tuple(&mut self, t: &Tuple) -> SmallResult<()> {
        let record_id = t.record_id().ok_or_else(SmallError::not_found)?;
        if record_id.page_id != self.pid || !self.is_slot_used(record_id.slot_number) {
            return Err(SmallError::not_found());
        }
        Self::set_slot_used(&mut self.header, record_id.slot_number, false);
        Ok(())
    }

    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        self.dirty_tid = if dirty { Some(tid) } else { None };
    }

    pub fn dirty_tid(&self) -> Option<TransactionId> {
        self.dirty_tid
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_tid.is_some()
    }

    /// Re-serializes header + slots into a `page_size` byte array.
    pub fn get_page_data(&self) -> Vec<u8> {
        let mut buf = self.before_image.clone();
        buf.truncate(0);
        buf.resize(self.before_image.len(), 0);

        buf[..self.header.len()].copy_from_slice(&self.header);

        let tuple_width = self.tuple_desc.width_bytes();
        let header_size = self.header.len();
        for (slot, tuple) in self.slots.iter().enumerate() {
            let start = header_size + slot * tuple_width;
            let end = start + tuple_width;
            tuple.encode_into(&mut buf[start..end]);
        }
        buf
    }

    pub fn before_image(&self) -> &[u8] {
        &self.before_image
    }

    /// Called after a commit-flush: the current on-disk image becomes
    /// the new before-image for the next transaction's WAL records.
    pub fn set_before_image(&mut self) {
        self.before_image = self.get_page_data();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::tuple_desc::simple_int_tuple_desc;

    fn desc() -> Arc<TupleDesc> {
        Arc::new(simple_int_tuple_desc(2, "f"))
    }

    #[test]
    fn empty_page_has_no_occupied_slots() {
        let page = HeapPage::empty(PageId::new(0, 0), desc(), 4096);
        assert_eq!(page.iterator().count(), 0);
        assert!(page.get_num_empty_slots() > 0);
    }

    #[test]
    fn insert_then_iterate_round_trips() {
        let mut page = HeapPage::empty(PageId::new(1, 0), desc(), 4096);
        let mut t = Tuple::new(desc(), vec![Field::Int(1), Field::Int(2)]);
        page.insert_tuple(&mut t).unwrap();

        assert_eq!(t.record_id(), Some(RecordId::new(PageId::new(1, 0), 0)));
        let got: Vec<&Tuple> = page.iterator().collect();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].get_field(0), &Field::Int(1));
        assert_eq!(got[0].get_field(1), &Field::Int(2));
    }

    #[test]
    fn insert_fails_when_full() {
        let mut page = HeapPage::empty(PageId::new(1, 0), desc(), 4096);
        let total = page.get_num_empty_slots();
        for i in 0..total {
            let mut t = Tuple::new(desc(), vec![Field::Int(i as i32), Field::Int(0)]);
            page.insert_tuple(&mut t).unwrap();
        }
        let mut overflow = Tuple::new(desc(), vec![Field::Int(0), Field::Int(0)]);
        match page.insert_tuple(&mut overflow) {
            Err(SmallError::NoSpace { .. }) => {}
            other => panic!("expected NoSpace, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn delete_clears_slot_bit_only() {
        let mut page = HeapPage::empty(PageId::new(1, 0), desc(), 4096);
        let mut t = Tuple::new(desc(), vec![Field::Int(7), Field::Int(8)]);
        page.insert_tuple(&mut t).unwrap();
        page.delete_tuple(&t).unwrap();
        assert_eq!(page.iterator().count(), 0);

        match page.delete_tuple(&t) {
            Err(SmallError::NotFound { .. }) => {}
            other => panic!("expected NotFound, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn before_image_is_snapshotted_at_load_and_after_set() {
        let pid = PageId::new(1, 0);
        let mut page = HeapPage::empty(pid, desc(), 4096);
        assert_eq!(page.before_image(), page.get_page_data().as_slice());

        let mut t = Tuple::new(desc(), vec![Field::Int(1), Field::Int(1)]);
        page.insert_tuple(&mut t).unwrap();
        assert_ne!(page.before_image(), page.get_page_data().as_slice());

        page.set_before_image();
        assert_eq!(page.before_image(), page.get_page_data().as_slice());
    }

    #[test]
    fn dirty_flag_tracks_owning_transaction() {
        let mut page = HeapPage::empty(PageId::new(1, 0), desc(), 4096);
        assert!(!page.is_dirty());
        let tid = TransactionId::new();
        page.mark_dirty(true, tid);
        assert_eq!(page.dirty_tid(), Some(tid));
        page.mark_dirty(false, tid);
        assert!(!page.is_dirty());
    }
}
