use std::fmt;

use bit_vec::BitVec;
use log::error;

use crate::{
    btree::key::{decode_key, encode_key, Key},
    error::DbError,
    storage::Schema,
};

use super::{BTreeBasePage, BTreePage, BTreePageID, PageCategory};

/// Internal (non-leaf) B+-tree node: `slot_count` key/child slots, slot 0
/// holding only a child pointer (every node with m keys has m+1 children).
/// The left child of the n-th entry is not always slot n-1, but the
/// nearest lower slot marked used — see `move_entry`.
pub struct BTreeInternalPage {
    page: BTreeBasePage,

    keys: Vec<Key>,
    children: Vec<BTreePageID>,

    slot_count: usize,
    header: BitVec<u32>,

    key_schema: Schema,
}

impl std::ops::Deref for BTreeInternalPage {
    type Target = BTreeBasePage;
    fn deref(&self) -> &Self::Target {
        &self.page
    }
}

impl std::ops::DerefMut for BTreeInternalPage {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.page
    }
}

impl BTreeInternalPage {
    pub fn new(pid: &BTreePageID, bytes: Vec<u8>, key_schema: Schema, page_size: usize) -> Self {
        let key_size = key_schema.record_size();
        let slot_count = Self::get_max_entries(key_size, page_size) + 1;
        let header_size = Self::get_header_size(slot_count);

        let mut keys: Vec<Key> = Vec::with_capacity(slot_count);
        let mut children: Vec<BTreePageID> = Vec::with_capacity(slot_count);

        let header = if bytes.len() >= header_size {
            BitVec::from_bytes(&bytes[..header_size])
        } else {
            BitVec::from_elem(slot_count, false)
        };

        let key_body_start = header_size;
        for i in 0..slot_count {
            let start = key_body_start + i * key_size;
            if start + key_size <= bytes.len() && header.get(i).unwrap_or(false) {
                keys.push(decode_key(&key_schema, &bytes[start..start + key_size]));
            } else {
                keys.push(Vec::new());
            }
        }

        let child_body_start = key_body_start + slot_count * key_size;
        for i in 0..slot_count {
            let start = child_body_start + i * 8;
            if start + 8 <= bytes.len() {
                let page_index = u32::from_le_bytes(bytes[start..start + 4].try_into().unwrap());
                let tag = u32::from_le_bytes(bytes[start + 4..start + 8].try_into().unwrap());
                children.push(BTreePageID::new(PageCategory::from_tag(tag), pid.table_id, page_index));
            } else {
                children.push(BTreePageID::new(PageCategory::Leaf, pid.table_id, 0));
            }
        }

        Self { page: BTreeBasePage::new(pid), keys, children, slot_count, header, key_schema }
    }

    pub fn key_schema(&self) -> &Schema {
        &self.key_schema
    }

    pub fn stable(&self) -> bool {
        if self.get_parent_pid().category == PageCategory::RootPointer {
            return true;
        }
        let max_empty_slots = self.slot_count - self.slot_count / 2;
        self.empty_slots_count() <= max_empty_slots
    }

    fn get_header_size(slot_count: usize) -> usize {
        slot_count / 8 + 1
    }

    /// Max entries (keys) a page of `page_size` can hold given `key_size`
    /// bytes per key: key bytes + 8-byte child pointer + 1 header bit,
    /// plus one extra child pointer (m entries need m+1 pointers) and an
    /// extra header bit for slot 0.
    pub fn get_max_entries(key_size: usize, page_size: usize) -> usize {
        let bits_per_entry = key_size * 8 + 8 * 8 + 1;
        let extra_bits = 2 * 8 * 8 + 8;
        (page_size * 8 - extra_bits) / bits_per_entry
    }

    pub fn get_pid_at(&self) -> BTreePageID {
        self.get_pid()
    }

    pub fn empty_slots_count(&self) -> usize {
        (1..self.slot_count).filter(|&i| !self.is_slot_used(i)).count()
    }

    pub fn entries_count(&self) -> usize {
        self.slot_count - self.empty_slots_count() - 1
    }

    pub fn is_slot_used(&self, slot_index: usize) -> bool {
        self.header[slot_index]
    }

    fn mark_slot_status(&mut self, slot_index: usize, used: bool) {
        self.header.set(slot_index, used);
    }

    pub fn delete_key_and_right_child(&mut self, record_id: usize) {
        self.mark_slot_status(record_id, false);
    }

    pub fn delete_key_and_left_child(&mut self, record_id: usize) {
        for i in (0..record_id).rev() {
            if self.is_slot_used(i) {
                self.children[i] = self.children[record_id];
                self.mark_slot_status(record_id, false);
                return;
            }
        }
    }

    pub fn update_entry(&mut self, entry: &Entry) {
        let record_id = entry.get_record_id();
        for i in (0..record_id).rev() {
            if self.is_slot_used(i) {
                self.children[i] = entry.get_left_child();
                break;
            }
        }
        self.children[record_id] = entry.get_right_child();
        self.keys[record_id] = entry.get_key();
    }

    pub fn insert_entry(&mut self, e: &Entry) -> Result<(), DbError> {
        if self.empty_slots_count() == 0 {
            return Err(DbError::corruption("no empty slots on this internal page"));
        }

        if self.entries_count() == 0 {
            self.children[0] = e.get_left_child();
            self.children[1] = e.get_right_child();
            self.keys[1] = e.get_key();
            self.mark_slot_status(0, true);
            self.mark_slot_status(1, true);
            return Ok(());
        }

        let mut empty_slot = 0;
        for i in 0..self.slot_count {
            if !self.is_slot_used(i) {
                empty_slot = i;
                break;
            }
        }

        let mut slot_just_ahead = usize::MAX;
        for i in 0..self.slot_count {
            if !self.is_slot_used(i) {
                continue;
            }
            if self.children[i] == e.get_left_child() {
                slot_just_ahead = i;
                break;
            }
            if self.children[i] == e.get_right_child() {
                slot_just_ahead = i;
                self.children[i] = e.get_left_child();
                break;
            }
        }

        if slot_just_ahead == usize::MAX {
            let msg = format!(
                "no slot found for entry {}, pid: {}, entries: {}",
                e,
                self.get_pid(),
                self.entries_count()
            );
            error!("{}", msg);
            return Err(DbError::corruption(msg));
        }

        let good_slot = if empty_slot < slot_just_ahead {
            for i in empty_slot..slot_just_ahead {
                self.move_entry(i + 1, i);
            }
            slot_just_ahead
        } else {
            for i in (slot_just_ahead + 1..empty_slot).rev() {
                self.move_entry(i, i + 1);
            }
            slot_just_ahead + 1
        };

        self.keys[good_slot] = e.get_key();
        self.children[good_slot] = e.get_right_child();
        self.mark_slot_status(good_slot, true);
        Ok(())
    }

    fn move_entry(&mut self, from: usize, to: usize) {
        if self.is_slot_used(from) && !self.is_slot_used(to) {
            self.keys[to] = self.keys[from].clone();
            self.children[to] = self.children[from];
            self.mark_slot_status(from, false);
            self.mark_slot_status(to, true);
        }
    }

    pub fn get_first_child_pid(&self) -> BTreePageID {
        let mut it = BTreeInternalPageIterator::new(self);
        it.next().unwrap().get_left_child()
    }

    pub fn get_last_child_pid(&self) -> BTreePageID {
        let mut it = BTreeInternalPageIterator::new(self);
        it.next_back().unwrap().get_right_child()
    }

    /// Total number of child pointer slots (one more than the max number
    /// of keys, since m keys always need m+1 children).
    pub fn get_children_capacity(&self) -> usize {
        self.slot_count
    }

    pub fn get_slots_count(&self) -> usize {
        self.slot_count
    }
}

impl BTreePage for BTreeInternalPage {
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
        let mut header = self.header.clone();
        while header.len() % 8 != 0 {
            header.push(false);
        }
        let mut buf = header.to_bytes();

        for i in 0..self.slot_count {
            if self.is_slot_used(i) && !self.keys[i].is_empty() {
                buf.extend_from_slice(&encode_key(&self.key_schema, &self.keys[i]));
            } else {
                buf.extend_from_slice(&vec![0u8; key_size]);
            }
        }
        for i in 0..self.slot_count {
            buf.extend_from_slice(&self.children[i].page_index.to_le_bytes());
            buf.extend_from_slice(&(self.children[i].category.tag()).to_le_bytes());
        }
        buf
    }
}

/// Both the left child of the n-th entry and its separator key, plus
/// which slot it was materialized from (used to splice updates back in).
#[derive(Clone)]
pub struct Entry {
    key: Key,
    left: BTreePageID,
    right: BTreePageID,
    record_id: usize,
}

impl Entry {
    pub fn new(key: Key, left: &BTreePageID, right: &BTreePageID) -> Self {
        Self { key, left: *left, right: *right, record_id: 0 }
    }

    pub fn set_record_id(&mut self, record_id: usize) {
        self.record_id = record_id;
    }

    pub fn get_record_id(&self) -> usize {
        self.record_id
    }

    pub fn get_key(&self) -> Key {
        self.key.clone()
    }

    pub fn set_key(&mut self, key: Key) {
        self.key = key;
    }

    pub fn get_left_child(&self) -> BTreePageID {
        self.left
    }

    pub fn get_right_child(&self) -> BTreePageID {
        self.right
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:?}, {}, {})", self.key, self.left, self.right)
    }
}

pub struct BTreeInternalPageIterator<'page> {
    page: &'page BTreeInternalPage,
    cursor: usize,
    left_child_position: usize,
    reverse_cursor: usize,
    right_child_position: usize,
}

impl<'page> BTreeInternalPageIterator<'page> {
    pub fn new(page: &'page BTreeInternalPage) -> Self {
        let mut right_child_position = page.slot_count;
        loop {
            right_child_position -= 1;
            if page.is_slot_used(right_child_position) {
                break;
            }
            if right_child_position == 0 {
                break;
            }
        }

        Self { page, cursor: 0, left_child_position: 0, reverse_cursor: right_child_position, right_child_position }
    }
}

impl Iterator for BTreeInternalPageIterator<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.cursor += 1;
            let cursor = self.cursor;
            if cursor >= self.page.slot_count {
                return None;
            }
            if !self.page.is_slot_used(cursor) {
                continue;
            }
            let mut e = Entry::new(
                self.page.keys[cursor].clone(),
                &self.page.children[self.left_child_position],
                &self.page.children[cursor],
            );
            e.set_record_id(cursor);
            self.left_child_position = cursor;
            return Some(e);
        }
    }
}

impl DoubleEndedIterator for BTreeInternalPageIterator<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            let left_index = self.reverse_cursor.checked_sub(1)?;
            self.reverse_cursor = left_index;
            if !self.page.is_slot_used(left_index) {
                continue;
            }
            let mut e = Entry::new(
                self.page.keys[self.right_child_position].clone(),
                &self.page.children[left_index],
                &self.page.children[self.right_child_position],
            );
            e.set_record_id(self.right_child_position);
            self.right_child_position = left_index;
            return Some(e);
        }
    }
}
