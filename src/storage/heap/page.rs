use bit_vec::BitVec;

use crate::io::{Decodeable, Encodeable};

pub const NO_PAGE: u32 = u32::MAX;

/// Slotted page layout: header, bitmap of `records_per_page` bits, then
/// that many fixed-size record slots. `bitmap[s] == true` iff slot `s`
/// holds a live record; `record_count` is kept equal to `popcount(bitmap)`
/// after every mutating operation.
pub struct HeapPage {
    pub page_no: u32,
    record_size: usize,
    records_per_page: usize,
    record_count: u32,
    next_free_page: u32,
    page_lsn: u64,
    bitmap: BitVec<u32>,
    slots: Vec<u8>,
}

/// Page 0 of every heap file, in the layout spec.md's "heap file header"
/// names: record-size, records-per-page, bitmap-size, page-count, and the
/// head of the free-page list (`NO_PAGE` when the list is empty). Data
/// pages occupy disk page indices 1..=page_count; `page_count` here, not
/// the file's length, is the authority for how many of them exist.
pub struct HeapFileHeader {
    pub record_size: u32,
    pub records_per_page: u32,
    pub bitmap_size: u32,
    pub page_count: u32,
    pub first_free_page: u32,
}

impl HeapFileHeader {
    pub const ENCODED_SIZE: usize = 4 * 5;

    pub fn new(record_size: u32, records_per_page: u32, bitmap_size: u32) -> Self {
        Self {
            record_size,
            records_per_page,
            bitmap_size,
            page_count: 0,
            first_free_page: NO_PAGE,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut reader = std::io::Cursor::new(bytes);
        let record_size = u32::decode_from(&mut reader);
        let records_per_page = u32::decode_from(&mut reader);
        let bitmap_size = u32::decode_from(&mut reader);
        let page_count = u32::decode_from(&mut reader);
        let first_free_page = u32::decode_from(&mut reader);
        Self { record_size, records_per_page, bitmap_size, page_count, first_free_page }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::ENCODED_SIZE);
        buf.extend_from_slice(&self.record_size.encode());
        buf.extend_from_slice(&self.records_per_page.encode());
        buf.extend_from_slice(&self.bitmap_size.encode());
        buf.extend_from_slice(&self.page_count.encode());
        buf.extend_from_slice(&self.first_free_page.encode());
        buf
    }
}

impl HeapPage {
    pub const HEADER_SIZE: usize = 4 + 4 + 8;

    /// Largest `n` such that `HEADER_SIZE + ceil(n/8) + n*record_size`
    /// fits in `page_size`.
    pub fn capacity_for(record_size: usize, page_size: usize) -> usize {
        let bits_per_entry = record_size * 8 + 1;
        let available_bits = (page_size - Self::HEADER_SIZE) * 8;
        let mut n = available_bits / bits_per_entry;
        while Self::HEADER_SIZE + (n + 7) / 8 + n * record_size > page_size && n > 0 {
            n -= 1;
        }
        n
    }

    pub fn empty(page_no: u32, record_size: usize, records_per_page: usize) -> Self {
        Self {
            page_no,
            record_size,
            records_per_page,
            record_count: 0,
            next_free_page: NO_PAGE,
            page_lsn: 0,
            bitmap: BitVec::from_elem(records_per_page, false),
            slots: vec![0u8; record_size * records_per_page],
        }
    }

    pub fn from_bytes(page_no: u32, record_size: usize, records_per_page: usize, bytes: &[u8]) -> Self {
        let mut reader = std::io::Cursor::new(bytes);
        let record_count = u32::decode_from(&mut reader);
        let next_free_page = u32::decode_from(&mut reader);
        let page_lsn = u64::decode_from(&mut reader);

        let bitmap_bytes = (records_per_page + 7) / 8;
        let mut bitmap_buf = vec![0u8; bitmap_bytes];
        let start = Self::HEADER_SIZE;
        bitmap_buf.copy_from_slice(&bytes[start..start + bitmap_bytes]);
        let mut bitmap = BitVec::from_bytes(&bitmap_buf);
        bitmap.truncate(records_per_page);

        let slots_start = start + bitmap_bytes;
        let slots = bytes[slots_start..slots_start + record_size * records_per_page].to_vec();

        Self {
            page_no,
            record_size,
            records_per_page,
            record_count,
            next_free_page,
            page_lsn,
            bitmap,
            slots,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.record_count.encode());
        buf.extend_from_slice(&self.next_free_page.encode());
        buf.extend_from_slice(&self.page_lsn.encode());
        let mut bitmap = self.bitmap.clone();
        // BitVec::to_bytes rounds the length up to a full byte; pad the
        // logical bit count first so the stored width matches on reload.
        while bitmap.len() % 8 != 0 {
            bitmap.push(false);
        }
        buf.extend_from_slice(&bitmap.to_bytes());
        buf.extend_from_slice(&self.slots);
        buf
    }

    pub fn page_lsn(&self) -> u64 {
        self.page_lsn
    }

    pub fn set_page_lsn(&mut self, lsn: u64) {
        self.page_lsn = lsn;
    }

    pub fn next_free_page(&self) -> u32 {
        self.next_free_page
    }

    pub fn set_next_free_page(&mut self, page_no: u32) {
        self.next_free_page = page_no;
    }

    pub fn record_count(&self) -> u32 {
        self.record_count
    }

    pub fn capacity(&self) -> usize {
        self.records_per_page
    }

    pub fn is_full(&self) -> bool {
        self.record_count as usize >= self.records_per_page
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        self.bitmap[slot]
    }

    pub fn first_free_slot(&self) -> Option<usize> {
        (0..self.records_per_page).find(|&i| !self.bitmap[i])
    }

    /// Smallest set bit strictly after `after` (`None` starts from slot 0),
    /// used by the sequential scan iterator to step within a page.
    pub fn next_set_bit(&self, after: Option<usize>) -> Option<usize> {
        let start = after.map(|s| s + 1).unwrap_or(0);
        (start..self.records_per_page).find(|&i| self.bitmap[i])
    }

    pub fn get_record(&self, slot: usize) -> Option<&[u8]> {
        if !self.is_slot_used(slot) {
            return None;
        }
        let start = slot * self.record_size;
        Some(&self.slots[start..start + self.record_size])
    }

    pub fn set_record(&mut self, slot: usize, bytes: &[u8]) {
        assert_eq!(bytes.len(), self.record_size);
        let start = slot * self.record_size;
        self.slots[start..start + self.record_size].copy_from_slice(bytes);
        if !self.bitmap[slot] {
            self.bitmap.set(slot, true);
            self.record_count += 1;
        }
    }

    pub fn clear_slot(&mut self, slot: usize) {
        if self.bitmap[slot] {
            self.bitmap.set(slot, false);
            self.record_count -= 1;
        }
    }
}
