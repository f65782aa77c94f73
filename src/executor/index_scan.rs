use crate::{
    btree::{key::Key, table::{BTreeTable, BTreeTableIterator}},
    catalog::TableInfo,
    database::Database,
    predicate::Predicate,
    storage::{heap::file::HeapFile, Rid, Schema, Tuple, Value},
    transaction::{LockKey, LockMode, Transaction},
    types::DbResult,
};

use super::Executor;

/// `Equal` is the point-lookup fast path: one tree probe for an exact
/// key, then a heap fetch per matching rid. `Range` descends once to
/// `lower` and stops at `upper`, pushing the bound into the tree walk
/// itself rather than filtering a full scan. `ModeOne` is for a
/// composite index when the available equality predicates cover only a
/// non-leading subset of its columns (spec's "mode-one" variant): no
/// single bounded descent can be built, so every leaf entry is visited
/// and `fixed` (key-position, value) pairs are tested against the
/// stored key before a heap fetch. Bounds for both come from the
/// index's own extent rather than a hardcoded min/max of the column's
/// type.
pub enum IndexScanMode {
    Equal(Key),
    Range { lower: Option<Key>, upper: Option<Key> },
    ModeOne { fixed: Vec<(usize, Value)> },
}

pub struct IndexScanExec<'a> {
    tx: &'a Transaction,
    table: &'a BTreeTable,
    heap: HeapFile,
    table_id: u32,
    schema: Schema,
    mode: IndexScanMode,
    filter: Option<Predicate>,

    results: Option<std::vec::IntoIter<Rid>>,
    mode_one_iter: Option<BTreeTableIterator<'a>>,
    mode_one_fixed: Vec<(usize, Value)>,
}

impl<'a> IndexScanExec<'a> {
    pub fn new(tx: &'a Transaction, table: &'a BTreeTable, info: &TableInfo, mode: IndexScanMode, filter: Option<Predicate>) -> Self {
        Self {
            tx,
            table,
            heap: HeapFile::new(info.id, info.record_size, Database::config().page_size),
            table_id: info.id,
            schema: info.schema.clone(),
            mode,
            filter,
            results: None,
            mode_one_iter: None,
            mode_one_fixed: Vec::new(),
        }
    }

    pub fn next_row(&mut self) -> DbResult<Option<(Rid, Tuple)>> {
        loop {
            let rid = match &mut self.mode_one_iter {
                Some(it) => {
                    let fixed = &self.mode_one_fixed;
                    loop {
                        match it.next() {
                            Some((key, rid)) => {
                                if fixed.iter().all(|(pos, v)| key.get(*pos) == Some(v)) {
                                    break Some(rid);
                                }
                            }
                            None => break None,
                        }
                    }
                }
                None => match &mut self.results {
                    Some(it) => it.next(),
                    None => None,
                },
            };
            let rid = match rid {
                Some(rid) => rid,
                None => return Ok(None),
            };

            Database::mut_lock_manager().acquire(self.tx, LockKey::Record(self.table_id, rid), LockMode::S)?;
            let tuple = {
                let mut bp = Database::mut_buffer_pool();
                self.heap.get(&mut bp, &self.schema, rid)?
            };
            let tuple = match tuple {
                Some(t) => t,
                // the index entry outlived the heap row, e.g. raced with a
                // concurrent delete that hasn't cleaned up the index yet
                None => continue,
            };

            if let Some(filter) = &self.filter {
                if !filter.matches(&tuple) {
                    continue;
                }
            }
            return Ok(Some((rid, tuple)));
        }
    }
}

impl Executor for IndexScanExec<'_> {
    fn open(&mut self) -> DbResult<()> {
        Database::mut_lock_manager().acquire(self.tx, LockKey::Table(self.table_id), LockMode::IS)?;
        match &self.mode {
            IndexScanMode::Equal(key) => {
                let rids = self.table.search_equal(self.tx, key)?;
                self.results = Some(rids.into_iter());
            }
            IndexScanMode::Range { lower, upper } => {
                let rids = self.table.search_range(self.tx, lower.as_ref(), upper.as_ref())?;
                self.results = Some(rids.into_iter());
            }
            IndexScanMode::ModeOne { fixed } => {
                self.mode_one_fixed = fixed.clone();
                self.mode_one_iter = Some(self.table.iter(self.tx)?);
            }
        }
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        Ok(self.next_row()?.map(|(_, tuple)| tuple))
    }

    fn close(&mut self) -> DbResult<()> {
        self.results = None;
        self.mode_one_iter = None;
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
