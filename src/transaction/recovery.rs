use std::collections::{HashMap, HashSet};

use log::info;

use crate::{
    buffer_pool::BufferPool, catalog::Catalog, error::DbError,
    transaction::log_record::{LogPayload, LogRecordKind, INVALID_LSN},
    types::VoidResult,
};

use super::{log_manager::LogManager, TransactionID};

/// Runs the three explicit ARIES passes over the WAL at startup.
/// Analyze rebuilds the set of transactions that were active when the
/// engine stopped ("losers"); redo replays every logged change in LSN
/// order so the page images reflect everything that was ever durable;
/// undo walks each loser's prev-lsn chain backward, applying the
/// inverse of every operation it logged.
pub struct RecoveryManager;

impl RecoveryManager {
    pub fn recover(log_manager: &mut LogManager, buffer_pool: &mut BufferPool, catalog: &Catalog) -> VoidResult {
        let records = log_manager.read_all()?;
        if records.is_empty() {
            return Ok(());
        }

        let (losers, last_lsn_of, redo_list, max_lsn) = Self::analyze(&records);
        info!("recovery analyze: {} records, {} losers", records.len(), losers.len());

        Self::redo(&redo_list, buffer_pool, catalog)?;
        info!("recovery redo complete");

        Self::undo(&losers, &records, buffer_pool, catalog)?;
        info!("recovery undo complete, {} losers rolled back", losers.len());

        log_manager.set_next_lsn(max_lsn + 1);
        for tx in &losers {
            log_manager.prev_lsn_for(*tx);
        }
        let _ = last_lsn_of;
        Ok(())
    }

    /// Returns (losers, last-lsn-per-tx, records-in-redo-order, max-lsn-seen).
    #[allow(clippy::type_complexity)]
    fn analyze(
        records: &[(super::log_record::LogRecord, u64)],
    ) -> (HashSet<TransactionID>, HashMap<TransactionID, i64>, Vec<super::log_record::LogRecord>, i64) {
        let mut active: HashSet<TransactionID> = HashSet::new();
        let mut last_lsn_of: HashMap<TransactionID, i64> = HashMap::new();
        let mut max_lsn = INVALID_LSN;

        for (record, _) in records {
            let tx = record.txn_id as TransactionID;
            max_lsn = max_lsn.max(record.lsn);
            last_lsn_of.insert(tx, record.lsn);

            match record.kind() {
                LogRecordKind::Begin => {
                    active.insert(tx);
                }
                LogRecordKind::Commit | LogRecordKind::Abort => {
                    active.remove(&tx);
                }
                _ => {}
            }
        }

        let redo_list = records.iter().map(|(r, _)| r.clone()).collect();
        (active, last_lsn_of, redo_list, max_lsn)
    }

    /// Replays every logged change in LSN order, skipping pages whose
    /// durable `page_lsn` is already >= the record's lsn.
    fn redo(
        redo_list: &[super::log_record::LogRecord],
        buffer_pool: &mut BufferPool,
        catalog: &Catalog,
    ) -> VoidResult {
        for record in redo_list {
            match &record.payload {
                LogPayload::Insert { table_id, rid, record: bytes } => {
                    Self::redo_apply(buffer_pool, catalog, *table_id, rid.page_no, rid.slot_no, Some(bytes), record.lsn)?;
                }
                LogPayload::Delete { table_id, rid, .. } => {
                    Self::redo_apply(buffer_pool, catalog, *table_id, rid.page_no, rid.slot_no, None, record.lsn)?;
                }
                LogPayload::Update { table_id, rid, after, .. } => {
                    Self::redo_apply(buffer_pool, catalog, *table_id, rid.page_no, rid.slot_no, Some(after), record.lsn)?;
                }
                LogPayload::CreateTable { .. } => {
                    // catalog state is rebuilt independently at startup, nothing to redo here.
                }
                LogPayload::Begin | LogPayload::Commit | LogPayload::Abort => {}
            }
        }
        Ok(())
    }

    /// Walks each loser transaction's prev-lsn chain backward, undoing
    /// inserts with a delete, deletes with a re-insert of the saved
    /// image, and updates with the before-image.
    fn undo(
        losers: &HashSet<TransactionID>,
        records: &[(super::log_record::LogRecord, u64)],
        buffer_pool: &mut BufferPool,
        catalog: &Catalog,
    ) -> VoidResult {
        if losers.is_empty() {
            return Ok(());
        }

        let mut by_tx: HashMap<TransactionID, Vec<&super::log_record::LogRecord>> = HashMap::new();
        for (record, _) in records {
            let tx = record.txn_id as TransactionID;
            if losers.contains(&tx) {
                by_tx.entry(tx).or_default().push(record);
            }
        }

        for (_, mut chain) in by_tx {
            chain.sort_by_key(|r| std::cmp::Reverse(r.lsn));
            for record in chain {
                match &record.payload {
                    LogPayload::Insert { table_id, rid, .. } => {
                        Self::undo_apply(buffer_pool, catalog, *table_id, rid.page_no, rid.slot_no, None)?;
                    }
                    LogPayload::Delete { table_id, rid, record: bytes } => {
                        Self::undo_apply(buffer_pool, catalog, *table_id, rid.page_no, rid.slot_no, Some(bytes))?;
                    }
                    LogPayload::Update { table_id, rid, before, .. } => {
                        Self::undo_apply(buffer_pool, catalog, *table_id, rid.page_no, rid.slot_no, Some(before))?;
                    }
                    LogPayload::CreateTable { .. } | LogPayload::Begin | LogPayload::Commit | LogPayload::Abort => {}
                }
            }
        }
        Ok(())
    }

    /// Undoes a single still-active transaction's writes, in reverse
    /// order, without a disk scan. Used by `Transaction::abort`; the
    /// startup recovery path instead drives this logic via `undo` above
    /// since it must undo every loser transaction at once.
    pub fn undo_transaction(
        tx: TransactionID,
        log_manager: &LogManager,
        buffer_pool: &mut BufferPool,
        catalog: &Catalog,
    ) -> VoidResult {
        let mut records = log_manager.tx_records(tx);
        records.sort_by_key(|r| std::cmp::Reverse(r.lsn));
        for record in &records {
            match &record.payload {
                LogPayload::Insert { table_id, rid, .. } => {
                    Self::undo_apply(buffer_pool, catalog, *table_id, rid.page_no, rid.slot_no, None)?;
                }
                LogPayload::Delete { table_id, rid, record: bytes } => {
                    Self::undo_apply(buffer_pool, catalog, *table_id, rid.page_no, rid.slot_no, Some(bytes))?;
                }
                LogPayload::Update { table_id, rid, before, .. } => {
                    Self::undo_apply(buffer_pool, catalog, *table_id, rid.page_no, rid.slot_no, Some(before))?;
                }
                LogPayload::CreateTable { .. } | LogPayload::Begin | LogPayload::Commit | LogPayload::Abort => {}
            }
        }
        Ok(())
    }

    /// Applies a compensating action unconditionally: unlike `redo_apply`,
    /// undo must not skip a slot just because the page's `page_lsn` already
    /// matches the record being undone, since the forward action stamped
    /// that exact lsn on the page it is now compensating for.
    fn undo_apply(
        buffer_pool: &mut BufferPool,
        catalog: &Catalog,
        table_id: u32,
        page_no: u32,
        slot_no: u32,
        image: Option<&[u8]>,
    ) -> VoidResult {
        let (record_size, records_per_page) = catalog
            .record_layout(table_id)
            .ok_or_else(|| DbError::corruption(format!("unknown table {} during recovery", table_id)))?;

        let page_pod = buffer_pool.fetch_heap_page(table_id, page_no, record_size, records_per_page)?;
        {
            let mut page = crate::utils::HandyRwLock::wl(&page_pod);
            match image {
                Some(bytes) => page.set_record(slot_no as usize, bytes),
                None => page.clear_slot(slot_no as usize),
            }
        }
        buffer_pool.unpin_heap_page(table_id, page_no, true);
        Ok(())
    }

    fn redo_apply(
        buffer_pool: &mut BufferPool,
        catalog: &Catalog,
        table_id: u32,
        page_no: u32,
        slot_no: u32,
        image: Option<&[u8]>,
        lsn: i64,
    ) -> VoidResult {
        let (record_size, records_per_page) = catalog
            .record_layout(table_id)
            .ok_or_else(|| DbError::corruption(format!("unknown table {} during recovery", table_id)))?;

        let page_pod = buffer_pool.fetch_heap_page(table_id, page_no, record_size, records_per_page)?;
        {
            let mut page = crate::utils::HandyRwLock::wl(&page_pod);
            if (page.page_lsn() as i64) < lsn {
                match image {
                    Some(bytes) => page.set_record(slot_no as usize, bytes),
                    None => page.clear_slot(slot_no as usize),
                }
                page.set_page_lsn(lsn as u64);
            }
        }
        buffer_pool.unpin_heap_page(table_id, page_no, true);
        Ok(())
    }
}
