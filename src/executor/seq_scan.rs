use crate::{
    catalog::TableInfo,
    database::Database,
    predicate::Predicate,
    storage::{heap::page::HeapPage, Rid, Schema, Tuple},
    transaction::{LockKey, LockMode, Transaction},
    types::{DbResult, Pod},
    utils::HandyRwLock,
};

use super::Executor;

/// Full scan over one table's heap file, oldest page first. Unlike
/// `storage::heap::scan::HeapScan` this re-acquires the buffer pool
/// lock on every call instead of holding it for the scan's lifetime,
/// since a join's inner side needs to interleave scans with other
/// buffer pool users.
pub struct SeqScanExec<'a> {
    tx: &'a Transaction,
    table_id: u32,
    schema: Schema,
    record_size: usize,
    records_per_page: usize,
    filter: Option<Predicate>,

    page_count: u32,
    cur_page: u32,
    cur_slot: Option<usize>,
    current: Option<Pod<HeapPage>>,
}

impl<'a> SeqScanExec<'a> {
    pub fn new(tx: &'a Transaction, table: &TableInfo, filter: Option<Predicate>) -> Self {
        Self {
            tx,
            table_id: table.id,
            schema: table.schema.clone(),
            record_size: table.record_size,
            records_per_page: table.records_per_page,
            filter,
            page_count: 0,
            cur_page: 0,
            cur_slot: None,
            current: None,
        }
    }

    /// Like `Executor::next` but keeps the row's `Rid`, for callers
    /// (update/delete) that need to act on the exact record a row came
    /// from rather than just its values.
    pub fn next_row(&mut self) -> DbResult<Option<(Rid, Tuple)>> {
        loop {
            if self.current.is_none() {
                if self.cur_page > self.page_count {
                    return Ok(None);
                }
                let page = Database::mut_buffer_pool().fetch_heap_page(
                    self.table_id,
                    self.cur_page,
                    self.record_size,
                    self.records_per_page,
                )?;
                self.current = Some(page);
                self.cur_slot = None;
            }

            let page_pod = self.current.as_ref().unwrap().clone();
            let next_slot = page_pod.rl().next_set_bit(self.cur_slot);

            match next_slot {
                Some(slot) => {
                    self.cur_slot = Some(slot);
                    let rid = Rid::new(self.cur_page, slot as u32);
                    let tuple = Tuple::from_bytes(&self.schema, page_pod.rl().get_record(slot).unwrap());

                    Database::mut_lock_manager().acquire(self.tx, LockKey::Record(self.table_id, rid), LockMode::S)?;

                    if let Some(filter) = &self.filter {
                        if !filter.matches(&tuple) {
                            continue;
                        }
                    }
                    return Ok(Some((rid, tuple)));
                }
                None => {
                    Database::mut_buffer_pool().unpin_heap_page(self.table_id, self.cur_page, false);
                    self.current = None;
                    self.cur_page += 1;
                }
            }
        }
    }
}

impl Executor for SeqScanExec<'_> {
    fn open(&mut self) -> DbResult<()> {
        Database::mut_lock_manager().acquire(self.tx, LockKey::Table(self.table_id), LockMode::IS)?;
        let header = Database::mut_buffer_pool().fetch_heap_header(self.table_id, self.record_size, self.records_per_page)?;
        self.page_count = header.rl().page_count;
        Database::mut_buffer_pool().unpin_heap_header(self.table_id, false);
        self.cur_page = 1;
        self.cur_slot = None;
        self.current = None;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        Ok(self.next_row()?.map(|(_, tuple)| tuple))
    }

    fn close(&mut self) -> DbResult<()> {
        if self.current.is_some() {
            Database::mut_buffer_pool().unpin_heap_page(self.table_id, self.cur_page, false);
            self.current = None;
        }
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
