use crate::{
    btree::{key::Key, table::BTreeTable},
    catalog::TableInfo,
    database::Database,
    error::DbError,
    storage::{heap::file::HeapFile, Column, Schema, Tuple, Type, Value},
    transaction::{LockKey, LockMode, Transaction},
    types::DbResult,
};

use super::Executor;

/// Inserts a fixed list of literal rows (the `VALUES` clause). Like
/// the record manager's own mutators, `open` takes the table-level IX
/// lock once up front rather than per row. A one-shot operator: `next`
/// does all the work on its first call and reports rows affected, then
/// reports end-of-stream.
pub struct InsertExec<'a> {
    tx: &'a Transaction,
    info: TableInfo,
    heap: HeapFile,
    rows: Vec<Tuple>,
    schema: Schema,
    done: bool,
}

impl<'a> InsertExec<'a> {
    pub fn new(tx: &'a Transaction, info: TableInfo, rows: Vec<Tuple>) -> Self {
        let heap = HeapFile::new(info.id, info.record_size, Database::config().page_size);
        Self { tx, info, heap, rows, schema: Schema::new(vec![Column::new("affected_rows", Type::BigInt64, false)]), done: false }
    }

    fn key_of(&self, tuple: &Tuple, columns: &[usize]) -> Key {
        tuple.composite_key(&self.info.schema, columns)
    }
}

impl Executor for InsertExec<'_> {
    fn open(&mut self) -> DbResult<()> {
        Database::mut_lock_manager().acquire(self.tx, LockKey::Table(self.info.id), LockMode::IX)?;
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
        let mut inserted = 0i64;

        for tuple in &self.rows {
            if tuple.values().len() != self.info.schema.columns.len() {
                return Err(DbError::InvalidValueCount(format!(
                    "row has {} values, table {} has {} columns",
                    tuple.values().len(),
                    self.info.name,
                    self.info.schema.columns.len()
                )));
            }

            let keys: Vec<Key> = self.info.indexes.iter().map(|idx| self.key_of(tuple, &idx.key_columns)).collect();
            // every declared index is unique: probe each before touching the heap
            for (index, key) in indexes.iter().zip(&keys) {
                if !index.search_equal(self.tx, key)?.is_empty() {
                    return Err(DbError::duplicate_key(format!("duplicate key {:?} in table {}", key, self.info.name)));
                }
            }

            let rid = {
                let mut log_manager = Database::mut_log_manager();
                let mut buffer_pool = Database::mut_buffer_pool();
                self.heap.insert(self.tx, &mut log_manager, &mut buffer_pool, &self.info.schema, tuple)?
            };
            for (index, key) in indexes.iter().zip(keys) {
                index.insert_entry(self.tx, key, rid)?;
            }
            inserted += 1;
        }

        Ok(Some(Tuple::new(vec![Value::BigInt64(inserted)])))
    }

    fn close(&mut self) -> DbResult<()> {
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
