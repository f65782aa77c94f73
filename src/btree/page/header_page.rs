use bit_vec::BitVec;

use super::{BTreeBasePage, BTreePage, BTreePageID};

/// Tracks which internal/leaf page-numbers in an index file are free for
/// reuse, one bit per page. Chained via its own sibling link when a
/// single header page's slot_count is exhausted (not yet needed at the
/// sizes this engine targets, so chaining is a future extension).
pub struct BTreeHeaderPage {
    base: BTreeBasePage,
    header: BitVec<u32>,
    slot_count: usize,
}

impl BTreeHeaderPage {
    const HEADER_SIZE: usize = 100;

    pub fn new(pid: &BTreePageID) -> BTreeHeaderPage {
        let slot_count = Self::HEADER_SIZE * 8;
        BTreeHeaderPage {
            base: BTreeBasePage::new(pid),
            header: BitVec::from_elem(slot_count, false),
            slot_count,
        }
    }

    pub fn from_bytes(pid: &BTreePageID, bytes: &[u8]) -> Self {
        let mut header = BitVec::from_bytes(&bytes[..Self::HEADER_SIZE]);
        let slot_count = header.len();
        header.truncate(slot_count);
        BTreeHeaderPage { base: BTreeBasePage::new(pid), header, slot_count }
    }

    pub fn mark_slot_status(&mut self, slot_index: usize, used: bool) {
        self.header.set(slot_index, used);
    }

    pub fn get_slots_count(&self) -> usize {
        self.slot_count
    }

    pub fn get_empty_slot(&self) -> Option<usize> {
        (0..self.slot_count).find(|&i| !self.header[i])
    }
}

impl BTreePage for BTreeHeaderPage {
    fn get_pid(&self) -> BTreePageID {
        self.base.get_pid()
    }

    fn get_parent_pid(&self) -> BTreePageID {
        self.base.get_parent_pid()
    }

    fn set_parent_pid(&mut self, pid: &BTreePageID) {
        self.base.set_parent_pid(pid)
    }

    fn get_page_data(&self) -> Vec<u8> {
        let mut bytes = self.header.clone();
        while bytes.len() % 8 != 0 {
            bytes.push(false);
        }
        bytes.to_bytes()
    }
}
