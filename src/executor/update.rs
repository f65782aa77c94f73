use crate::{
    btree::table::BTreeTable,
    catalog::TableInfo,
    database::Database,
    error::DbError,
    storage::{heap::file::HeapFile, Column, Schema, Tuple, Type, Value},
    transaction::{LockKey, LockMode, Transaction},
    types::DbResult,
};

use super::{Executor, RowSource};

/// One assignment `column <- value` applied to every row the source
/// produces. Re-derives every declared index's key for both the old
/// and new values so a write that touches an indexed column moves that
/// index's entry instead of leaving a stale one behind.
pub struct UpdateExec<'a> {
    tx: &'a Transaction,
    info: TableInfo,
    heap: HeapFile,
    source: RowSource<'a>,
    assignments: Vec<(usize, Value)>,
    schema: Schema,
    done: bool,
}

impl<'a> UpdateExec<'a> {
    pub fn new(tx: &'a Transaction, info: TableInfo, source: RowSource<'a>, assignments: Vec<(usize, Value)>) -> Self {
        let heap = HeapFile::new(info.id, info.record_size, Database::config().page_size);
        Self {
            tx,
            info,
            heap,
            source,
            assignments,
            schema: Schema::new(vec![Column::new("affected_rows", Type::BigInt64, false)]),
            done: false,
        }
    }

    fn apply(&self, tuple: &Tuple) -> Tuple {
        let mut values = tuple.values().to_vec();
        for (field, value) in &self.assignments {
            values[*field] = value.clone();
        }
        Tuple::new(values)
    }
}

impl Executor for UpdateExec<'_> {
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
        let mut updated = 0i64;

        while let Some((rid, tuple)) = self.source.next_row()? {
            Database::mut_lock_manager().acquire(self.tx, LockKey::Record(self.info.id, rid), LockMode::X)?;

            let new_tuple = self.apply(&tuple);

            for (index, idx_info) in indexes.iter().zip(&self.info.indexes) {
                let new_key = new_tuple.composite_key(&self.info.schema, &idx_info.key_columns);
                let old_key = tuple.composite_key(&self.info.schema, &idx_info.key_columns);
                if new_key != old_key && !index.search_equal(self.tx, &new_key)?.is_empty() {
                    return Err(DbError::duplicate_key(format!(
                        "duplicate key {:?} in table {}",
                        new_key, self.info.name
                    )));
                }
            }

            {
                let mut log_manager = Database::mut_log_manager();
                let mut buffer_pool = Database::mut_buffer_pool();
                self.heap.update(self.tx, &mut log_manager, &mut buffer_pool, &self.info.schema, rid, &new_tuple)?;
            }

            for (index, idx_info) in indexes.iter().zip(&self.info.indexes) {
                let new_key = new_tuple.composite_key(&self.info.schema, &idx_info.key_columns);
                let old_key = tuple.composite_key(&self.info.schema, &idx_info.key_columns);
                if new_key != old_key {
                    index.delete_entry(self.tx, &old_key, rid)?;
                    index.insert_entry(self.tx, new_key, rid)?;
                }
            }
            updated += 1;
        }

        Ok(Some(Tuple::new(vec![Value::BigInt64(updated)])))
    }

    fn close(&mut self) -> DbResult<()> {
        self.source.close()
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
