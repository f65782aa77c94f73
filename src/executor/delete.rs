use crate::{
    btree::table::BTreeTable,
    catalog::TableInfo,
    database::Database,
    storage::{heap::file::HeapFile, Column, Schema, Tuple, Type, Value},
    transaction::{LockKey, LockMode, Transaction},
    types::DbResult,
};

use super::{Executor, RowSource};

/// Deletes every row its child `RowSource` produces. The source has
/// already applied whatever predicate selects the target rows (a full
/// scan or an index probe); this operator just removes what it's
/// handed, from the heap and from every declared index.
pub struct DeleteExec<'a> {
    tx: &'a Transaction,
    info: TableInfo,
    heap: HeapFile,
    source: RowSource<'a>,
    schema: Schema,
    done: bool,
}

impl<'a> DeleteExec<'a> {
    pub fn new(tx: &'a Transaction, info: TableInfo, source: RowSource<'a>) -> Self {
        let heap = HeapFile::new(info.id, info.record_size, Database::config().page_size);
        Self { tx, info, heap, source, schema: Schema::new(vec![Column::new("affected_rows", Type::BigInt64, false)]), done: false }
    }
}

impl Executor for DeleteExec<'_> {
    fn open(&mut self) -> DbResult<()> {
        Database::mut_lock_manager().acquire(self.tx, LockKey::Table(self.info.id), LockMode::IX)?;
        self.source.open()?;
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let indexes: Vec<BTreeTable> = self
            .info
            .indexes
            .iter()
            .map(|idx| BTreeTable::new(idx.id, idx.key_schema(&self.info.schema)))
            .collect();
        let mut deleted = 0i64;

        while let Some((rid, tuple)) = self.source.next_row()? {
            Database::mut_lock_manager().acquire(self.tx, LockKey::Record(self.info.id, rid), LockMode::X)?;

            for (index, idx_info) in indexes.iter().zip(&self.info.indexes) {
                let key = tuple.composite_key(&self.info.schema, &idx_info.key_columns);
                index.delete_entry(self.tx, &key, rid)?;
            }

            let mut log_manager = Database::mut_log_manager();
            let mut buffer_pool = Database::mut_buffer_pool();
            self.heap.delete(self.tx, &mut log_manager, &mut buffer_pool, rid)?;
            deleted += 1;
        }

        Ok(Some(Tuple::new(vec![Value::BigInt64(deleted)])))
    }

    fn close(&mut self) -> DbResult<()> {
        self.source.close()
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
