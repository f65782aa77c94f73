use bit_vec::BitVec;

use crate::{
    btree::key::{decode_key, encode_key, Key},
    storage::{Rid, Schema},
};

use super::{BTreeBasePage, BTreePage, BTreePageID, PageCategory, EMPTY_PAGE_ID};

/// Leaf node of a non-clustered index: each slot holds a composite key
/// and the `Rid` of the heap record it points to. Leaves form a doubly
/// linked sibling chain for ascending range scans.
pub struct BTreeLeafPage {
    page: BTreeBasePage,

    slot_count: usize,
    header: BitVec<u32>,

    keys: Vec<Key>,
    rids: Vec<Rid>,

    key_schema: Schema,

    right_sibling_id: u32,
    left_sibling_id: u32,
}

impl std::ops::Deref for BTreeLeafPage {
    type Target = BTreeBasePage;
    fn deref(&self) -> &Self::Target {
        &self.page
    }
}

impl std::ops::DerefMut for BTreeLeafPage {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.page
    }
}

impl BTreeLeafPage {
    const ENTRY_SIZE_EXTRA: usize = 8; // rid: page_no u32 + slot_no u32

    pub fn new(pid: &BTreePageID, bytes: Vec<u8>, key_schema: Schema, page_size: usize) -> Self {
        let key_size = key_schema.record_size();
        let entry_size = key_size + Self::ENTRY_SIZE_EXTRA;
        let slot_count = Self::calculate_slots_count(entry_size, page_size);
        let header_size = Self::calculate_header_size(slot_count);

        let header = if bytes.len() >= header_size {
            BitVec::from_bytes(&bytes[..header_size])
        } else {
            BitVec::from_elem(slot_count, false)
        };

        let sibling_start = header_size;
        let (left_sibling_id, right_sibling_id) = if bytes.len() >= sibling_start + 8 {
            (
                u32::from_le_bytes(bytes[sibling_start..sibling_start + 4].try_into().unwrap()),
                u32::from_le_bytes(bytes[sibling_start + 4..sibling_start + 8].try_into().unwrap()),
            )
        } else {
            (EMPTY_PAGE_ID, EMPTY_PAGE_ID)
        };

        let body_start = sibling_start + 8;
        let mut keys = Vec::with_capacity(slot_count);
        let mut rids = Vec::with_capacity(slot_count);
        for i in 0..slot_count {
            let start = body_start + i * entry_size;
            if start + entry_size <= bytes.len() && header.get(i).unwrap_or(false) {
                keys.push(decode_key(&key_schema, &bytes[start..start + key_size]));
                let page_no = u32::from_le_bytes(bytes[start + key_size..start + key_size + 4].try_into().unwrap());
                let slot_no =
                    u32::from_le_bytes(bytes[start + key_size + 4..start + key_size + 8].try_into().unwrap());
                rids.push(Rid::new(page_no, slot_no));
            } else {
                keys.push(Vec::new());
                rids.push(Rid::new(0, 0));
            }
        }

        Self { page: BTreeBasePage::new(pid), slot_count, header, keys, rids, key_schema, right_sibling_id, left_sibling_id }
    }

    pub fn key_schema(&self) -> &Schema {
        &self.key_schema
    }

    pub fn set_right_pid(&mut self, pid: Option<BTreePageID>) {
        self.right_sibling_id = pid.map(|p| p.page_index).unwrap_or(EMPTY_PAGE_ID);
    }

    pub fn get_right_pid(&self) -> Option<BTreePageID> {
        if self.right_sibling_id == EMPTY_PAGE_ID {
            None
        } else {
            Some(BTreePageID::new(PageCategory::Leaf, self.get_pid().table_id, self.right_sibling_id))
        }
    }

    pub fn set_left_pid(&mut self, pid: Option<BTreePageID>) {
        self.left_sibling_id = pid.map(|p| p.page_index).unwrap_or(EMPTY_PAGE_ID);
    }

    pub fn get_left_pid(&self) -> Option<BTreePageID> {
        if self.left_sibling_id == EMPTY_PAGE_ID {
            None
        } else {
            Some(BTreePageID::new(PageCategory::Leaf, self.get_pid().table_id, self.left_sibling_id))
        }
    }

    pub fn calculate_slots_count(entry_size: usize, page_size: usize) -> usize {
        let bits_per_entry = entry_size * 8 + 1;
        let extra_bits = 3 * 4 * 8; // left sibling, right sibling, parent pointers
        (page_size * 8 - extra_bits) / bits_per_entry
    }

    pub fn calculate_header_size(slot_count: usize) -> usize {
        slot_count / 8 + 1
    }

    pub fn get_slots_count(&self) -> usize {
        self.slot_count
    }

    pub fn should_merge(&self) -> bool {
        if self.get_parent_pid().category == PageCategory::RootPointer {
            return false;
        }
        let max_empty_slots = self.slot_count - self.slot_count / 2;
        self.empty_slots_count() > max_empty_slots
    }

    pub fn empty_slots_count(&self) -> usize {
        (0..self.slot_count).filter(|&i| !self.is_slot_used(i)).count()
    }

    pub fn entries_count(&self) -> usize {
        self.slot_count - self.empty_slots_count()
    }

    /// Inserts `(key, rid)` keeping slots sorted by key. Caller has
    /// already verified there's a free slot.
    pub fn insert_entry(&mut self, key: Key, rid: Rid) {
        let mut first_empty_slot: i32 = 0;
        for i in 0..self.slot_count {
            if !self.is_slot_used(i) {
                first_empty_slot = i as i32;
                break;
            }
        }

        let mut last_less_slot: i32 = -1;
        for i in 0..self.slot_count {
            if self.is_slot_used(i) {
                if self.keys[i] < key {
                    last_less_slot = i as i32;
                } else {
                    break;
                }
            }
        }

        let good_slot = if first_empty_slot < last_less_slot {
            for i in first_empty_slot..last_less_slot {
                self.move_entry((i + 1) as usize, i as usize);
            }
            last_less_slot as usize
        } else {
            for i in (last_less_slot + 1..first_empty_slot).rev() {
                self.move_entry(i as usize, (i + 1) as usize);
            }
            (last_less_slot + 1) as usize
        };

        self.keys[good_slot] = key;
        self.rids[good_slot] = rid;
        self.mark_slot_status(good_slot, true);
    }

    fn move_entry(&mut self, from: usize, to: usize) {
        if !self.is_slot_used(from) {
            return;
        }
        self.keys[to] = self.keys[from].clone();
        self.rids[to] = self.rids[from];
        self.mark_slot_status(to, true);
        self.mark_slot_status(from, false);
    }

    pub fn get_key(&self, slot_index: usize) -> Option<Key> {
        if self.is_slot_used(slot_index) {
            Some(self.keys[slot_index].clone())
        } else {
            None
        }
    }

    pub fn get_rid(&self, slot_index: usize) -> Option<Rid> {
        if self.is_slot_used(slot_index) {
            Some(self.rids[slot_index])
        } else {
            None
        }
    }

    pub fn delete_entry(&mut self, slot_index: usize) {
        self.mark_slot_status(slot_index, false);
    }

    pub fn is_slot_used(&self, slot_index: usize) -> bool {
        self.header[slot_index]
    }

    fn mark_slot_status(&mut self, slot_index: usize, used: bool) {
        self.header.set(slot_index, used);
    }
}

impl BTreePage for BTreeLeafPage {
    fn get_pid(&self) -> BTreePageID {
        self.page.get_pid()
    }

    fn get_parent_pid(&self) -> BTreePageID {
        self.page.get_parent_pid()
    }

    fn set_parent_pid(&mut self, pid: &BTreePageID) {
        self.page.set_parent_pid(pid)
    }

    fn get_page_data(&self) -> Vec<u8> {
        let key_size = self.key_schema.record_size();
        let entry_size = key_size + Self::ENTRY_SIZE_EXTRA;

        let mut header = self.header.clone();
        while header.len() % 8 != 0 {
            header.push(false);
        }
        let mut buf = header.to_bytes();

        buf.extend_from_slice(&self.left_sibling_id.to_le_bytes());
        buf.extend_from_slice(&self.right_sibling_id.to_le_bytes());

        for i in 0..self.slot_count {
            if self.is_slot_used(i) {
                buf.extend_from_slice(&encode_key(&self.key_schema, &self.keys[i]));
                buf.extend_from_slice(&self.rids[i].page_no.to_le_bytes());
                buf.extend_from_slice(&self.rids[i].slot_no.to_le_bytes());
            } else {
                buf.extend_from_slice(&vec![0u8; entry_size]);
            }
        }
        buf
    }
}

pub struct BTreeLeafPageIterator<'page> {
    page: &'page BTreeLeafPage,
    cursor: i32,
    reverse_cursor: i32,
}

impl<'page> BTreeLeafPageIterator<'page> {
    pub fn new(page: &'page BTreeLeafPage) -> Self {
        Self { page, cursor: -1, reverse_cursor: page.slot_count as i32 }
    }
}

/// `(slot_index, key, rid)` for each live entry in slot order.
impl Iterator for BTreeLeafPageIterator<'_> {
    type Item = (usize, Key, Rid);

    fn next(&mut self) -> Option<Self::Item> {
        let page = self.page;
        loop {
            self.cursor += 1;
            let cursor = self.cursor as usize;
            if cursor >= page.slot_count {
                return None;
            }
            if page.is_slot_used(cursor) {
                return Some((cursor, page.keys[cursor].clone(), page.rids[cursor]));
            }
        }
    }
}

impl DoubleEndedIterator for BTreeLeafPageIterator<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let page = self.page;
        loop {
            self.reverse_cursor -= 1;
            if self.reverse_cursor < 0 {
                return None;
            }
            let cursor = self.reverse_cursor as usize;
            if page.is_slot_used(cursor) {
                return Some((cursor, page.keys[cursor].clone(), page.rids[cursor]));
            }
        }
    }
}
