use crate::{
    btree::table::BTreeTable,
    catalog::TableInfo,
    database::Database,
    storage::{heap::file::HeapFile, Column, Schema, Tuple, Type, Value},
    transaction::{LockKey, LockMode, Transaction},
    types::DbResult,
};

use super::Executor;

/// Bulk-loads already-tokenized rows (the `LOAD <file.csv> INTO t`
/// statement's row source; CSV tokenization itself happens above this
/// layer). Takes the table-level `X` lock up front, same as the
/// original load operator, so per-row locking during the load is
/// unnecessary.
pub struct LoadExec<'a> {
    tx: &'a Transaction,
    info: TableInfo,
    heap: HeapFile,
    rows: Vec<Tuple>,
    schema: Schema,
    done: bool,
}

impl<'a> LoadExec<'a> {
    pub fn new(tx: &'a Transaction, info: TableInfo, rows: Vec<Tuple>) -> Self {
        let heap = HeapFile::new(info.id, info.record_size, Database::config().page_size);
        Self { tx, info, heap, rows, schema: Schema::new(vec![Column::new("affected_rows", Type::BigInt64, false)]), done: false }
    }
}

impl Executor for LoadExec<'_> {
    fn open(&mut self) -> DbResult<()> {
        Database::mut_lock_manager().acquire(self.tx, LockKey::Table(self.info.id), LockMode::X)?;
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let rids = {
            let mut log_manager = Database::mut_log_manager();
            let mut buffer_pool = Database::mut_buffer_pool();
            self.heap.bulk_insert(self.tx, &mut log_manager, &mut buffer_pool, &self.info.schema, &self.rows)?
        };

        let indexes: Vec<BTreeTable> = self
            .info
            .indexes
            .iter()
            .map(|idx| BTreeTable::new(idx.id, idx.key_schema(&self.info.schema)))
            .collect();
        for (tuple, rid) in self.rows.iter().zip(rids.iter()) {
            for (index, idx_info) in indexes.iter().zip(&self.info.indexes) {
                let key = tuple.composite_key(&self.info.schema, &idx_info.key_columns);
                index.insert_entry(self.tx, key, *rid)?;
            }
        }

        Ok(Some(Tuple::new(vec![Value::BigInt64(rids.len() as i64)])))
    }

    fn close(&mut self) -> DbResult<()> {
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
