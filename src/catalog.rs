use std::{collections::HashMap, io::Cursor, path::PathBuf};

use log::info;

use crate::{
    config::Config,
    error::DbError,
    io::{Decodeable, Encodeable, SmallFile},
    storage::{heap::page::HeapPage, Schema},
    types::DbResult,
};

/// One declared B+-tree index over a table: which columns form its
/// key, in order, and the id that namespaces its on-disk pages
/// (distinct from the table's own id, so two indexes on the same table
/// don't collide in the same index file).
#[derive(Clone)]
pub struct IndexInfo {
    pub id: u32,
    pub name: String,
    pub key_columns: Vec<usize>,
}

impl IndexInfo {
    pub fn key_schema(&self, table_schema: &Schema) -> Schema {
        Schema::new(self.key_columns.iter().map(|&i| table_schema.columns[i].clone()).collect())
    }
}

/// Everything the engine needs to know about one table: its schema,
/// the list of declared indexes built over it (the first is always the
/// primary-key index created alongside the table), and the derived
/// heap page layout.
#[derive(Clone)]
pub struct TableInfo {
    pub id: u32,
    pub name: String,
    pub schema: Schema,
    pub indexes: Vec<IndexInfo>,
    pub record_size: usize,
    pub records_per_page: usize,
}

impl TableInfo {
    /// The index built over the table's primary-key columns, always
    /// declared first.
    pub fn primary_index(&self) -> &IndexInfo {
        &self.indexes[0]
    }

    pub fn key_columns(&self) -> &[usize] {
        &self.primary_index().key_columns
    }

    pub fn key_schema(&self) -> Schema {
        self.primary_index().key_schema(&self.schema)
    }

    /// The declared index whose leading key column is `field_index`, if
    /// any. A predicate on that column is the one a scan can push into
    /// this index's descent.
    pub fn index_leading_on(&self, field_index: usize) -> Option<&IndexInfo> {
        self.indexes.iter().find(|idx| idx.key_columns.first() == Some(&field_index))
    }

    pub fn index_by_name(&self, name: &str) -> Option<&IndexInfo> {
        self.indexes.iter().find(|idx| idx.name == name)
    }
}

/// The table/schema registry. Persisted to its own small metadata file
/// rather than as a self-hosted system table: the registry itself must
/// be readable before any table, including one holding its own
/// metadata, could be opened.
pub struct Catalog {
    tables: HashMap<u32, TableInfo>,
    by_name: HashMap<String, u32>,
    next_id: u32,
    catalog_path: PathBuf,
    page_size: usize,
}

impl Catalog {
    pub fn new(config: &Config) -> Self {
        let mut catalog = Self {
            tables: HashMap::new(),
            by_name: HashMap::new(),
            next_id: 1,
            catalog_path: config.data_dir.join("catalog.meta"),
            page_size: config.page_size,
        };
        catalog.load();
        catalog
    }

    fn load(&mut self) {
        if !self.catalog_path.exists() {
            return;
        }
        let mut file = SmallFile::new(&self.catalog_path);
        let size = match file.get_size() {
            Ok(s) if s > 0 => s,
            _ => return,
        };
        let bytes = match file.read_exact_at(0, size as usize) {
            Ok(b) => b,
            Err(_) => return,
        };
        let mut cursor = Cursor::new(bytes);
        let count = u32::decode_from(&mut cursor);
        for _ in 0..count {
            let id = u32::decode_from(&mut cursor);
            let name = String::decode_from(&mut cursor);
            let schema = Schema::decode_from(&mut cursor);
            let index_count = u32::decode_from(&mut cursor);
            let indexes: Vec<IndexInfo> = (0..index_count)
                .map(|_| {
                    let index_id = u32::decode_from(&mut cursor);
                    let index_name = String::decode_from(&mut cursor);
                    let key_len = u32::decode_from(&mut cursor);
                    let key_columns = (0..key_len).map(|_| u32::decode_from(&mut cursor) as usize).collect();
                    IndexInfo { id: index_id, name: index_name, key_columns }
                })
                .collect();
            let record_size = schema.record_size();
            let records_per_page = HeapPage::capacity_for(record_size, self.page_size).max(1);

            self.next_id = self.next_id.max(id + 1);
            for idx in &indexes {
                self.next_id = self.next_id.max(idx.id + 1);
            }
            self.by_name.insert(name.clone(), id);
            self.tables.insert(id, TableInfo { id, name, schema, indexes, record_size, records_per_page });
        }
    }

    fn save(&self) -> DbResult<()> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.tables.len() as u32).encode());
        for info in self.tables.values() {
            buf.extend_from_slice(&info.id.encode());
            buf.extend_from_slice(&info.name.encode());
            buf.extend_from_slice(&info.schema.encode());
            buf.extend_from_slice(&(info.indexes.len() as u32).encode());
            for idx in &info.indexes {
                buf.extend_from_slice(&idx.id.encode());
                buf.extend_from_slice(&idx.name.encode());
                buf.extend_from_slice(&(idx.key_columns.len() as u32).encode());
                for &k in &idx.key_columns {
                    buf.extend_from_slice(&(k as u32).encode());
                }
            }
        }
        let file = SmallFile::new(&self.catalog_path);
        file.set_len(0)?;
        let mut file = file;
        file.write_at(0, &buf)?;
        file.flush()
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn create_table(&mut self, name: &str, schema: Schema, key_columns: Vec<usize>) -> DbResult<u32> {
        if self.by_name.contains_key(name) {
            return Err(DbError::duplicate_key(format!("table {} already exists", name)));
        }
        let id = self.alloc_id();
        let record_size = schema.record_size();
        let records_per_page = HeapPage::capacity_for(record_size, self.page_size).max(1);

        let primary_index = IndexInfo { id: self.alloc_id(), name: format!("{}_pkey", name), key_columns };

        self.by_name.insert(name.to_string(), id);
        self.tables.insert(
            id,
            TableInfo { id, name: name.to_string(), schema, indexes: vec![primary_index], record_size, records_per_page },
        );
        self.save()?;
        info!("created table '{}' (id {})", name, id);
        Ok(id)
    }

    pub fn drop_table(&mut self, name: &str) -> DbResult<TableInfo> {
        let id = self.by_name.remove(name).ok_or_else(|| DbError::not_found(format!("table {}", name)))?;
        let info = self.tables.remove(&id).expect("by_name/tables out of sync");
        self.save()?;
        info!("dropped table '{}' (id {})", name, id);
        Ok(info)
    }

    /// Declares a new secondary index over `table_name` and returns its
    /// `IndexInfo`; the caller is responsible for actually populating it
    /// from the table's current rows.
    pub fn create_index(&mut self, table_name: &str, index_name: &str, key_columns: Vec<usize>) -> DbResult<IndexInfo> {
        let id = self.by_name.get(table_name).copied().ok_or_else(|| DbError::not_found(format!("table {}", table_name)))?;
        {
            let info = self.tables.get(&id).expect("by_name/tables out of sync");
            if info.index_by_name(index_name).is_some() {
                return Err(DbError::duplicate_key(format!("index {} already exists", index_name)));
            }
        }
        let index = IndexInfo { id: self.alloc_id(), name: index_name.to_string(), key_columns };
        self.tables.get_mut(&id).expect("by_name/tables out of sync").indexes.push(index.clone());
        self.save()?;
        info!("created index '{}' on table '{}'", index_name, table_name);
        Ok(index)
    }

    pub fn drop_index(&mut self, table_name: &str, index_name: &str) -> DbResult<IndexInfo> {
        let id = self.by_name.get(table_name).copied().ok_or_else(|| DbError::not_found(format!("table {}", table_name)))?;
        let info = self.tables.get_mut(&id).expect("by_name/tables out of sync");
        if info.indexes.len() == 1 && info.indexes[0].name == index_name {
            return Err(DbError::Corruption(format!("cannot drop primary index {} of table {}", index_name, table_name)));
        }
        let pos = info.indexes.iter().position(|idx| idx.name == index_name).ok_or_else(|| DbError::not_found(format!("index {}", index_name)))?;
        let removed = info.indexes.remove(pos);
        self.save()?;
        info!("dropped index '{}' on table '{}'", index_name, table_name);
        Ok(removed)
    }

    /// Drops an index by name alone, without the caller needing to know
    /// which table declares it (bare `DROP INDEX idx` has no `ON table`
    /// clause in this SQL surface).
    pub fn drop_index_by_name(&mut self, index_name: &str) -> DbResult<IndexInfo> {
        let table_name = self
            .tables
            .values()
            .find(|t| t.index_by_name(index_name).is_some())
            .map(|t| t.name.clone())
            .ok_or_else(|| DbError::not_found(format!("index {}", index_name)))?;
        self.drop_index(&table_name, index_name)
    }

    pub fn table(&self, id: u32) -> Option<&TableInfo> {
        self.tables.get(&id)
    }

    pub fn table_by_name(&self, name: &str) -> Option<&TableInfo> {
        self.by_name.get(name).and_then(|id| self.tables.get(id))
    }

    pub fn table_id(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.by_name.keys().cloned().collect()
    }

    pub fn record_layout(&self, table_id: u32) -> Option<(usize, usize)> {
        self.tables.get(&table_id).map(|t| (t.record_size, t.records_per_page))
    }

    pub fn key_schema(&self, table_id: u32) -> Option<Schema> {
        self.tables.get(&table_id).map(|t| t.key_schema())
    }
}
