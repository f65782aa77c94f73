use crate::{
    buffer_pool::BufferPool,
    error::DbError,
    storage::{
        heap::page::{HeapPage, NO_PAGE},
        Rid, Schema, Tuple,
    },
    transaction::{log_manager::LogManager, Transaction},
    types::DbResult,
    utils::HandyRwLock,
};

/// The on-disk heap for one table: an unordered sequence of fixed-size
/// slotted pages. Record layout and slot count are derived once from
/// the table's schema and the configured page size.
pub struct HeapFile {
    table_id: u32,
    record_size: usize,
    records_per_page: usize,
}

impl HeapFile {
    pub fn new(table_id: u32, record_size: usize, page_size: usize) -> Self {
        let records_per_page = HeapPage::capacity_for(record_size, page_size).max(1);
        Self { table_id, record_size, records_per_page }
    }

    pub fn records_per_page(&self) -> usize {
        self.records_per_page
    }

    /// Number of data pages (page 0 is the file's header, not a data page).
    pub fn page_count(&self, buffer_pool: &mut BufferPool) -> DbResult<u32> {
        let header = buffer_pool.fetch_heap_header(self.table_id, self.record_size, self.records_per_page)?;
        let count = header.rl().page_count;
        buffer_pool.unpin_heap_header(self.table_id, false);
        Ok(count)
    }

    /// Inserts into the head of the free-page list (allocating a new page
    /// if the list is empty), logs the change, and re-links the free list
    /// to match spec.md's "choose the head of the free-page list" / "if
    /// the page becomes full, unlink it" contract.
    pub fn insert(
        &self,
        tx: &Transaction,
        log_manager: &mut LogManager,
        buffer_pool: &mut BufferPool,
        schema: &Schema,
        tuple: &Tuple,
    ) -> DbResult<Rid> {
        let bytes = tuple.to_bytes(schema);

        let header_pod = buffer_pool.fetch_heap_header(self.table_id, self.record_size, self.records_per_page)?;
        let free_head = header_pod.rl().first_free_page;

        let (page_no, page_pod) = if free_head != NO_PAGE {
            let page_pod = buffer_pool.fetch_heap_page(self.table_id, free_head, self.record_size, self.records_per_page)?;
            (free_head, page_pod)
        } else {
            let page_no = header_pod.rl().page_count + 1;
            let page_pod = buffer_pool.new_heap_page(self.table_id, page_no, self.record_size, self.records_per_page)?;
            header_pod.wl().page_count = page_no;
            (page_no, page_pod)
        };

        let slot = page_pod
            .rl()
            .first_free_slot()
            .ok_or_else(|| DbError::corruption(format!("free-list page {} has no free slot", page_no)))?;
        let rid = Rid::new(page_no, slot as u32);
        let lsn = log_manager.log_insert(tx.get_id(), self.table_id, rid, bytes.clone())?;

        let (became_full, next_free_page) = {
            let mut page = page_pod.wl();
            page.set_record(slot, &bytes);
            page.set_page_lsn(lsn as u64);
            (page.is_full(), page.next_free_page())
        };

        if free_head == NO_PAGE {
            // brand new page: link it onto the free list unless it filled on its first insert.
            if !became_full {
                let mut header = header_pod.wl();
                page_pod.wl().set_next_free_page(header.first_free_page);
                header.first_free_page = page_no;
            }
        } else if became_full {
            // was the list head and just filled up: unlink it.
            header_pod.wl().first_free_page = next_free_page;
        }

        buffer_pool.unpin_heap_page(self.table_id, page_no, true);
        buffer_pool.unpin_heap_header(self.table_id, true);

        Ok(rid)
    }

    /// Inserts every tuple in `tuples`, one INSERT log record per row,
    /// as used by the bulk `LOAD` operator. Just a loop over `insert`:
    /// there is no page-fill shortcut worth the complexity at the sizes
    /// this engine targets.
    pub fn bulk_insert(
        &self,
        tx: &Transaction,
        log_manager: &mut LogManager,
        buffer_pool: &mut BufferPool,
        schema: &Schema,
        tuples: &[Tuple],
    ) -> DbResult<Vec<Rid>> {
        tuples.iter().map(|t| self.insert(tx, log_manager, buffer_pool, schema, t)).collect()
    }

    pub fn get(&self, buffer_pool: &mut BufferPool, schema: &Schema, rid: Rid) -> DbResult<Option<Tuple>> {
        let page_pod = buffer_pool.fetch_heap_page(self.table_id, rid.page_no, self.record_size, self.records_per_page)?;
        let tuple = {
            let page = page_pod.rl();
            page.get_record(rid.slot_no as usize).map(|bytes| Tuple::from_bytes(schema, bytes))
        };
        buffer_pool.unpin_heap_page(self.table_id, rid.page_no, false);
        Ok(tuple)
    }

    pub fn delete(
        &self,
        tx: &Transaction,
        log_manager: &mut LogManager,
        buffer_pool: &mut BufferPool,
        rid: Rid,
    ) -> DbResult<()> {
        let page_pod = buffer_pool.fetch_heap_page(self.table_id, rid.page_no, self.record_size, self.records_per_page)?;
        let before = {
            let page = page_pod.rl();
            page.get_record(rid.slot_no as usize)
                .ok_or_else(|| DbError::RecordNotFound(format!("{}", rid)))?
                .to_vec()
        };
        let lsn = log_manager.log_delete(tx.get_id(), self.table_id, rid, before)?;
        let was_full = page_pod.rl().is_full();
        {
            let mut page = page_pod.wl();
            page.clear_slot(rid.slot_no as usize);
            page.set_page_lsn(lsn as u64);
        }
        buffer_pool.unpin_heap_page(self.table_id, rid.page_no, true);

        if was_full {
            // page was off the free list (full pages never are); relink it at the head.
            let header_pod = buffer_pool.fetch_heap_header(self.table_id, self.record_size, self.records_per_page)?;
            let prior_head = header_pod.rl().first_free_page;
            let page_pod = buffer_pool.fetch_heap_page(self.table_id, rid.page_no, self.record_size, self.records_per_page)?;
            page_pod.wl().set_next_free_page(prior_head);
            buffer_pool.unpin_heap_page(self.table_id, rid.page_no, false);
            header_pod.wl().first_free_page = rid.page_no;
            buffer_pool.unpin_heap_header(self.table_id, true);
        }
        Ok(())
    }

    pub fn update(
        &self,
        tx: &Transaction,
        log_manager: &mut LogManager,
        buffer_pool: &mut BufferPool,
        schema: &Schema,
        rid: Rid,
        new_tuple: &Tuple,
    ) -> DbResult<()> {
        let page_pod = buffer_pool.fetch_heap_page(self.table_id, rid.page_no, self.record_size, self.records_per_page)?;
        let before = {
            let page = page_pod.rl();
            page.get_record(rid.slot_no as usize)
                .ok_or_else(|| DbError::RecordNotFound(format!("{}", rid)))?
                .to_vec()
        };
        let after = new_tuple.to_bytes(schema);
        let lsn = log_manager.log_update(tx.get_id(), self.table_id, rid, before, after.clone())?;
        {
            let mut page = page_pod.wl();
            page.set_record(rid.slot_no as usize, &after);
            page.set_page_lsn(lsn as u64);
        }
        buffer_pool.unpin_heap_page(self.table_id, rid.page_no, true);
        Ok(())
    }
}
