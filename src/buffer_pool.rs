use std::collections::HashMap;

use log::trace;

use crate::{
    btree::page::{
        BTreeHeaderPage, BTreeInternalPage, BTreeLeafPage, BTreePage, BTreePageID,
        BTreeRootPointerPage, PageCategory,
    },
    disk_manager::DiskManager,
    error::DbError,
    storage::{
        heap::page::{HeapFileHeader, HeapPage},
        Schema,
    },
    transaction::{Permission, Transaction},
    types::{new_pod, Pod},
    utils::HandyRwLock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKey {
    Heap(u32, u32),
    HeapHeader(u32),
    BTree(BTreePageID),
}

struct FrameMeta {
    pin_count: usize,
    dirty: bool,
    /// clock-sweep reference bit; set on every fetch, cleared by the
    /// sweep, matching the "never evict a pinned frame, prefer
    /// non-dirty on ties" policy of the spec.
    referenced: bool,
}

impl FrameMeta {
    fn new() -> Self {
        Self {
            pin_count: 1,
            dirty: false,
            referenced: true,
        }
    }
}

/// Fixed pool of frames fronting the disk manager. Each resident page is
/// additionally kept in a type-specific map (heap pages vs. the four
/// B+-tree page kinds) since their in-memory representations differ;
/// `frames` is the pin-count/eviction bookkeeping shared across all of
/// them, keyed by the same `PageKey` each map uses.
pub struct BufferPool {
    disk: DiskManager,
    capacity: usize,

    frames: HashMap<PageKey, FrameMeta>,

    heap_pages: HashMap<(u32, u32), Pod<HeapPage>>,
    heap_headers: HashMap<u32, Pod<HeapFileHeader>>,
    root_pages: HashMap<BTreePageID, Pod<BTreeRootPointerPage>>,
    internal_pages: HashMap<BTreePageID, Pod<BTreeInternalPage>>,
    leaf_pages: HashMap<BTreePageID, Pod<BTreeLeafPage>>,
    header_pages: HashMap<BTreePageID, Pod<BTreeHeaderPage>>,
}

impl BufferPool {
    pub fn new(disk: DiskManager, capacity: usize) -> Self {
        Self {
            disk,
            capacity,
            frames: HashMap::new(),
            heap_pages: HashMap::new(),
            heap_headers: HashMap::new(),
            root_pages: HashMap::new(),
            internal_pages: HashMap::new(),
            leaf_pages: HashMap::new(),
            header_pages: HashMap::new(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.disk.page_size()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn touch(&mut self, key: PageKey) {
        if let Some(meta) = self.frames.get_mut(&key) {
            meta.pin_count += 1;
            meta.referenced = true;
        } else {
            self.frames.insert(key, FrameMeta::new());
        }
    }

    fn mark_dirty(&mut self, key: PageKey) {
        if let Some(meta) = self.frames.get_mut(&key) {
            meta.dirty = true;
        }
    }

    /// Clock-sweep eviction: walk frames clearing the reference bit,
    /// evict the first unpinned frame found with the bit already clear.
    /// Never evicts a pinned frame; prefers a non-dirty victim on ties
    /// by scanning non-dirty candidates first.
    fn evict_if_needed(&mut self) -> Result<(), DbError> {
        if self.frames.len() < self.capacity {
            return Ok(());
        }

        let non_dirty_victim = self
            .frames
            .iter()
            .find(|(_, m)| m.pin_count == 0 && !m.dirty && !m.referenced)
            .map(|(k, _)| *k);
        let any_victim = non_dirty_victim.or_else(|| {
            self.frames
                .iter()
                .find(|(_, m)| m.pin_count == 0)
                .map(|(k, _)| *k)
        });

        match any_victim {
            Some(key) => self.evict(key),
            None => {
                // give the sweep a second pass before giving up
                let mut found = None;
                for meta in self.frames.values_mut() {
                    meta.referenced = false;
                }
                for (k, m) in self.frames.iter() {
                    if m.pin_count == 0 {
                        found = Some(*k);
                        break;
                    }
                }
                match found {
                    Some(key) => self.evict(key),
                    None => Err(DbError::corruption("buffer pool exhausted: all frames pinned")),
                }
            }
        }
    }

    fn evict(&mut self, key: PageKey) -> Result<(), DbError> {
        trace!("evicting {:?}", key);
        self.flush_key(key)?;
        self.frames.remove(&key);
        match key {
            PageKey::Heap(t, p) => {
                self.heap_pages.remove(&(t, p));
            }
            PageKey::HeapHeader(t) => {
                self.heap_headers.remove(&t);
            }
            PageKey::BTree(pid) => match pid.category {
                PageCategory::RootPointer => {
                    self.root_pages.remove(&pid);
                }
                PageCategory::Internal => {
                    self.internal_pages.remove(&pid);
                }
                PageCategory::Leaf => {
                    self.leaf_pages.remove(&pid);
                }
                PageCategory::Header => {
                    self.header_pages.remove(&pid);
                }
            },
        }
        Ok(())
    }

    fn flush_key(&mut self, key: PageKey) -> Result<(), DbError> {
        let dirty = self.frames.get(&key).map(|m| m.dirty).unwrap_or(false);
        if !dirty {
            return Ok(());
        }

        // WAL invariant: the log record describing this page's change
        // must be durable before the page itself is written back.
        crate::database::Database::mut_log_manager().flush()?;

        match key {
            PageKey::Heap(table_id, page_no) => {
                if let Some(page) = self.heap_pages.get(&(table_id, page_no)) {
                    let bytes = page.rl().to_bytes();
                    let file_key = heap_file_key(table_id);
                    self.disk.write_page(&file_key, page_no, &bytes)?;
                }
            }
            PageKey::HeapHeader(table_id) => {
                if let Some(header) = self.heap_headers.get(&table_id) {
                    let bytes = header.rl().to_bytes();
                    let file_key = heap_file_key(table_id);
                    self.disk.write_page(&file_key, 0, &bytes)?;
                }
            }
            PageKey::BTree(pid) => {
                let file_key = btree_file_key(pid.table_id);
                let bytes = match pid.category {
                    PageCategory::RootPointer => self.root_pages.get(&pid).map(|p| p.rl().get_page_data()),
                    PageCategory::Internal => self.internal_pages.get(&pid).map(|p| p.rl().get_page_data()),
                    PageCategory::Leaf => self.leaf_pages.get(&pid).map(|p| p.rl().get_page_data()),
                    PageCategory::Header => self.header_pages.get(&pid).map(|p| p.rl().get_page_data()),
                };
                if let Some(bytes) = bytes {
                    self.disk.write_page(&file_key, pid.page_index, &bytes)?;
                }
            }
        }
        if let Some(meta) = self.frames.get_mut(&key) {
            meta.dirty = false;
        }
        Ok(())
    }

    pub fn flush(&mut self, key: PageKey) -> Result<(), DbError> {
        self.flush_key(key)
    }

    pub fn flush_all(&mut self) -> Result<(), DbError> {
        let keys: Vec<PageKey> = self.frames.keys().copied().collect();
        for key in keys {
            self.flush_key(key)?;
        }
        Ok(())
    }

    pub fn unpin(&mut self, key: PageKey, dirty: bool) {
        if dirty {
            self.mark_dirty(key);
        }
        if let Some(meta) = self.frames.get_mut(&key) {
            meta.pin_count = meta.pin_count.saturating_sub(1);
        }
    }

    pub fn discard(&mut self, key: PageKey) {
        self.frames.remove(&key);
        match key {
            PageKey::Heap(t, p) => {
                self.heap_pages.remove(&(t, p));
            }
            PageKey::HeapHeader(t) => {
                self.heap_headers.remove(&t);
            }
            PageKey::BTree(pid) => match pid.category {
                PageCategory::RootPointer => {
                    self.root_pages.remove(&pid);
                }
                PageCategory::Internal => {
                    self.internal_pages.remove(&pid);
                }
                PageCategory::Leaf => {
                    self.leaf_pages.remove(&pid);
                }
                PageCategory::Header => {
                    self.header_pages.remove(&pid);
                }
            },
        }
    }

    // --- heap pages ---

    pub fn fetch_heap_page(
        &mut self,
        table_id: u32,
        page_no: u32,
        record_size: usize,
        records_per_page: usize,
    ) -> Result<Pod<HeapPage>, DbError> {
        let key = PageKey::Heap(table_id, page_no);
        if let Some(p) = self.heap_pages.get(&(table_id, page_no)) {
            self.touch(key);
            return Ok(p.clone());
        }

        self.evict_if_needed()?;
        let file_key = heap_file_key(table_id);
        let bytes = self.disk.read_page(&file_key, page_no)?;
        let page = HeapPage::from_bytes(page_no, record_size, records_per_page, &bytes);
        let pod = new_pod(page);
        self.heap_pages.insert((table_id, page_no), pod.clone());
        self.touch(key);
        Ok(pod)
    }

    pub fn new_heap_page(
        &mut self,
        table_id: u32,
        page_no: u32,
        record_size: usize,
        records_per_page: usize,
    ) -> Result<Pod<HeapPage>, DbError> {
        self.evict_if_needed()?;
        let key = PageKey::Heap(table_id, page_no);
        let page = HeapPage::empty(page_no, record_size, records_per_page);
        let pod = new_pod(page);
        self.heap_pages.insert((table_id, page_no), pod.clone());
        self.touch(key);
        self.mark_dirty(key);
        Ok(pod)
    }

    pub fn unpin_heap_page(&mut self, table_id: u32, page_no: u32, dirty: bool) {
        self.unpin(PageKey::Heap(table_id, page_no), dirty);
    }

    /// Fetches (creating on first use) the heap file's page-0 header,
    /// which tracks the file's layout and the free-page list head.
    pub fn fetch_heap_header(
        &mut self,
        table_id: u32,
        record_size: usize,
        records_per_page: usize,
    ) -> Result<Pod<HeapFileHeader>, DbError> {
        let key = PageKey::HeapHeader(table_id);
        if let Some(p) = self.heap_headers.get(&table_id) {
            self.touch(key);
            return Ok(p.clone());
        }

        self.evict_if_needed()?;
        let file_key = heap_file_key(table_id);
        let bitmap_size = ((records_per_page + 7) / 8) as u32;
        let header = match self.disk.read_page(&file_key, 0) {
            Ok(bytes) => HeapFileHeader::from_bytes(&bytes),
            Err(_) => HeapFileHeader::new(record_size as u32, records_per_page as u32, bitmap_size),
        };
        let pod = new_pod(header);
        self.heap_headers.insert(table_id, pod.clone());
        self.touch(key);
        Ok(pod)
    }

    pub fn unpin_heap_header(&mut self, table_id: u32, dirty: bool) {
        self.unpin(PageKey::HeapHeader(table_id), dirty);
    }

    pub fn mark_heap_header_dirty(&mut self, table_id: u32) {
        self.mark_dirty(PageKey::HeapHeader(table_id));
    }

    // --- btree pages ---

    pub fn get_root_pointer_page(
        &mut self,
        _tx: &Transaction,
        pid: &BTreePageID,
    ) -> Result<Pod<BTreeRootPointerPage>, DbError> {
        let key = PageKey::BTree(*pid);
        if let Some(p) = self.root_pages.get(pid) {
            self.touch(key);
            return Ok(p.clone());
        }
        self.evict_if_needed()?;
        let file_key = btree_file_key(pid.table_id);
        let bytes = match self.disk.read_page(&file_key, pid.page_index) {
            Ok(b) => b,
            Err(_) => BTreeRootPointerPage::empty_bytes(self.page_size()),
        };
        let page = BTreeRootPointerPage::new(pid, bytes);
        let pod = new_pod(page);
        self.root_pages.insert(*pid, pod.clone());
        self.touch(key);
        Ok(pod)
    }

    pub fn get_internal_page(
        &mut self,
        _tx: &Transaction,
        perm: Permission,
        pid: &BTreePageID,
        key_schema: &Schema,
    ) -> Result<Pod<BTreeInternalPage>, DbError> {
        let key = PageKey::BTree(*pid);
        if let Some(p) = self.internal_pages.get(pid) {
            self.touch(key);
            if matches!(perm, Permission::ReadWrite) {
                self.mark_dirty(key);
            }
            return Ok(p.clone());
        }
        self.evict_if_needed()?;
        let file_key = btree_file_key(pid.table_id);
        let bytes = self.disk.read_page(&file_key, pid.page_index)?;
        let page = BTreeInternalPage::new(pid, bytes, key_schema.clone(), self.page_size());
        let pod = new_pod(page);
        self.internal_pages.insert(*pid, pod.clone());
        self.touch(key);
        if matches!(perm, Permission::ReadWrite) {
            self.mark_dirty(key);
        }
        Ok(pod)
    }

    pub fn get_leaf_page(
        &mut self,
        _tx: &Transaction,
        perm: Permission,
        pid: &BTreePageID,
        key_schema: &Schema,
    ) -> Result<Pod<BTreeLeafPage>, DbError> {
        let key = PageKey::BTree(*pid);
        if let Some(p) = self.leaf_pages.get(pid) {
            self.touch(key);
            if matches!(perm, Permission::ReadWrite) {
                self.mark_dirty(key);
            }
            return Ok(p.clone());
        }
        self.evict_if_needed()?;
        let file_key = btree_file_key(pid.table_id);
        let bytes = self.disk.read_page(&file_key, pid.page_index)?;
        let page = BTreeLeafPage::new(pid, bytes, key_schema.clone(), self.page_size());
        let pod = new_pod(page);
        self.leaf_pages.insert(*pid, pod.clone());
        self.touch(key);
        if matches!(perm, Permission::ReadWrite) {
            self.mark_dirty(key);
        }
        Ok(pod)
    }

    pub fn get_header_page(
        &mut self,
        _tx: &Transaction,
        pid: &BTreePageID,
    ) -> Result<Pod<BTreeHeaderPage>, DbError> {
        let key = PageKey::BTree(*pid);
        if let Some(p) = self.header_pages.get(pid) {
            self.touch(key);
            return Ok(p.clone());
        }
        self.evict_if_needed()?;
        let file_key = btree_file_key(pid.table_id);
        let page = match self.disk.read_page(&file_key, pid.page_index) {
            Ok(bytes) => BTreeHeaderPage::from_bytes(pid, &bytes),
            Err(_) => BTreeHeaderPage::new(pid),
        };
        let pod = new_pod(page);
        self.header_pages.insert(*pid, pod.clone());
        self.touch(key);
        Ok(pod)
    }

    pub fn allocate_btree_page(&mut self, table_id: u32) -> Result<u32, DbError> {
        let file_key = btree_file_key(table_id);
        self.disk.page_count(&file_key)
    }

    /// Creates and registers a brand-new, empty internal page (used when
    /// a split needs a fresh sibling or root). The page starts dirty
    /// since it has no on-disk image yet.
    pub fn new_internal_page(&mut self, pid: &BTreePageID, key_schema: &Schema) -> Result<Pod<BTreeInternalPage>, DbError> {
        self.evict_if_needed()?;
        let page = BTreeInternalPage::new(pid, Vec::new(), key_schema.clone(), self.page_size());
        let pod = new_pod(page);
        self.internal_pages.insert(*pid, pod.clone());
        let key = PageKey::BTree(*pid);
        self.touch(key);
        self.mark_dirty(key);
        Ok(pod)
    }

    pub fn new_leaf_page(&mut self, pid: &BTreePageID, key_schema: &Schema) -> Result<Pod<BTreeLeafPage>, DbError> {
        self.evict_if_needed()?;
        let page = BTreeLeafPage::new(pid, Vec::new(), key_schema.clone(), self.page_size());
        let pod = new_pod(page);
        self.leaf_pages.insert(*pid, pod.clone());
        let key = PageKey::BTree(*pid);
        self.touch(key);
        self.mark_dirty(key);
        Ok(pod)
    }

    pub fn new_header_page(&mut self, pid: &BTreePageID) -> Result<Pod<BTreeHeaderPage>, DbError> {
        self.evict_if_needed()?;
        let page = BTreeHeaderPage::new(pid);
        let pod = new_pod(page);
        self.header_pages.insert(*pid, pod.clone());
        let key = PageKey::BTree(*pid);
        self.touch(key);
        self.mark_dirty(key);
        Ok(pod)
    }

    pub fn mark_btree_dirty(&mut self, pid: &BTreePageID) {
        self.mark_dirty(PageKey::BTree(*pid));
    }

    /// Evicts every cached page belonging to `table_id`'s heap file and
    /// removes its backing file. Used by `DROP TABLE`; callers must hold
    /// whatever lock makes this safe (the table's X lock).
    pub fn discard_heap_file(&mut self, table_id: u32) -> Result<(), DbError> {
        let keys: Vec<PageKey> = self
            .frames
            .keys()
            .copied()
            .filter(|k| matches!(k, PageKey::Heap(t, _) | PageKey::HeapHeader(t) if *t == table_id))
            .collect();
        for key in keys {
            self.discard(key);
        }
        self.heap_pages.retain(|(t, _), _| *t != table_id);
        self.heap_headers.remove(&table_id);
        self.disk.remove_file(&heap_file_key(table_id))
    }

    /// Evicts every cached page belonging to `index_id`'s B+-tree file
    /// and removes its backing file. Used by `DROP TABLE` (for every
    /// declared index) and `DROP INDEX`.
    pub fn discard_btree_file(&mut self, index_id: u32) -> Result<(), DbError> {
        let keys: Vec<PageKey> = self
            .frames
            .keys()
            .copied()
            .filter(|k| matches!(k, PageKey::BTree(pid) if pid.table_id == index_id))
            .collect();
        for key in keys {
            self.discard(key);
        }
        self.root_pages.retain(|pid, _| pid.table_id != index_id);
        self.internal_pages.retain(|pid, _| pid.table_id != index_id);
        self.leaf_pages.retain(|pid, _| pid.table_id != index_id);
        self.header_pages.retain(|pid, _| pid.table_id != index_id);
        self.disk.remove_file(&btree_file_key(index_id))
    }
}

pub fn heap_file_key(table_id: u32) -> String {
    format!("table_{}.heap", table_id)
}

pub fn btree_file_key(table_id: u32) -> String {
    format!("table_{}.index", table_id)
}
