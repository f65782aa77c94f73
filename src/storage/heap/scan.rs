use crate::{buffer_pool::BufferPool, storage::{Rid, Schema, Tuple}, types::Pod};

use super::page::HeapPage;

/// Sequential scan over every live record in a heap file, oldest page
/// first. Holds the current page pinned for the duration of its slots
/// and unpins before moving to the next one. `page_count` is the number
/// of data pages (page 0 is the file's header, not a data page), so
/// pages are visited `1..=page_count`.
pub struct HeapScan<'a> {
    buffer_pool: &'a mut BufferPool,
    table_id: u32,
    schema: Schema,
    record_size: usize,
    records_per_page: usize,
    page_count: u32,
    cur_page: u32,
    cur_slot: Option<usize>,
    current: Option<Pod<HeapPage>>,
}

impl<'a> HeapScan<'a> {
    pub fn new(
        buffer_pool: &'a mut BufferPool,
        table_id: u32,
        schema: Schema,
        record_size: usize,
        records_per_page: usize,
        page_count: u32,
    ) -> Self {
        Self {
            buffer_pool,
            table_id,
            schema,
            record_size,
            records_per_page,
            page_count,
            cur_page: 1,
            cur_slot: None,
            current: None,
        }
    }
}

impl Iterator for HeapScan<'_> {
    type Item = (Rid, Tuple);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                if self.cur_page > self.page_count {
                    return None;
                }
                match self.buffer_pool.fetch_heap_page(
                    self.table_id,
                    self.cur_page,
                    self.record_size,
                    self.records_per_page,
                ) {
                    Ok(page) => self.current = Some(page),
                    Err(_) => return None,
                }
                self.cur_slot = None;
            }

            let page_pod = self.current.as_ref().unwrap().clone();
            let next_slot = {
                let page = crate::utils::HandyRwLock::rl(&page_pod);
                page.next_set_bit(self.cur_slot)
            };

            match next_slot {
                Some(slot) => {
                    self.cur_slot = Some(slot);
                    let tuple = {
                        let page = crate::utils::HandyRwLock::rl(&page_pod);
                        Tuple::from_bytes(&self.schema, page.get_record(slot).unwrap())
                    };
                    return Some((Rid::new(self.cur_page, slot as u32), tuple));
                }
                None => {
                    self.buffer_pool.unpin_heap_page(self.table_id, self.cur_page, false);
                    self.current = None;
                    self.cur_page += 1;
                }
            }
        }
    }
}
