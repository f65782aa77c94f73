use std::sync::RwLockWriteGuard;

use crate::{
    btree::{
        key::Key,
        page::{
            BTreeInternalPage, BTreeInternalPageIterator, BTreeLeafPage, BTreeLeafPageIterator,
            BTreePage, BTreePageID, BTreeRootPointerPage, Entry, PageCategory,
        },
    },
    buffer_pool::PageKey,
    database::Database,
    error::DbError,
    storage::{Rid, Schema},
    transaction::{Permission, Transaction},
    types::{DbResult, Pod, VoidResult},
    utils::HandyRwLock,
};

/// What the parent of a just-split child needs to do once the child
/// releases its latch: either nothing (the child had room), or splice
/// in the new entry the split produced.
enum Action {
    Release,
    InsertEntry(Entry),
}

enum SearchFor {
    Key(Key),
    LeftMost,
    RightMost,
}

/// A non-clustered secondary index over one table: leaves hold
/// `(key, rid)` pairs pointing at heap records rather than the records
/// themselves, so the same tree shape serves any indexed column set
/// without needing to know the table's full row layout.
pub struct BTreeTable {
    table_id: u32,
    key_schema: Schema,
}

impl BTreeTable {
    pub fn new(table_id: u32, key_schema: Schema) -> Self {
        Self { table_id, key_schema }
    }

    pub fn get_id(&self) -> u32 {
        self.table_id
    }

    pub fn key_schema(&self) -> &Schema {
        &self.key_schema
    }

    fn root_ptr_pid(&self) -> BTreePageID {
        BTreePageID::new(PageCategory::RootPointer, self.table_id, 0)
    }

    pub fn get_root_ptr_page(&self, tx: &Transaction) -> DbResult<Pod<BTreeRootPointerPage>> {
        Database::mut_buffer_pool().get_root_pointer_page(tx, &self.root_ptr_pid())
    }

    /// Pid of the tree's current root, lazily creating the first (empty)
    /// leaf page the first time anything is inserted.
    fn get_root_pid(&self, tx: &Transaction) -> DbResult<BTreePageID> {
        let root_ptr_rc = self.get_root_ptr_page(tx)?;
        let page_count = Database::mut_buffer_pool().allocate_btree_page(self.table_id)?;
        if page_count == 0 {
            let leaf_pid = BTreePageID::new(PageCategory::Leaf, self.table_id, 1);
            Database::mut_buffer_pool().new_leaf_page(&leaf_pid, &self.key_schema)?;
            root_ptr_rc.wl().set_root_pid(&leaf_pid);
            Database::mut_buffer_pool().mark_btree_dirty(&self.root_ptr_pid());
            return Ok(leaf_pid);
        }
        let mut root_pid = root_ptr_rc.rl().get_root_pid();
        root_pid.table_id = self.table_id;
        Ok(root_pid)
    }

    /// Index for a freshly allocated page: reuse a freed slot from the
    /// header's free list if one exists, otherwise grow the file.
    fn next_page_index(&self, tx: &Transaction) -> DbResult<u32> {
        let root_ptr_rc = self.get_root_ptr_page(tx)?;
        let header_pid = root_ptr_rc.rl().get_header_pid();
        if let Some(header_pid) = header_pid {
            let header_rc = Database::mut_buffer_pool().get_header_page(tx, &header_pid)?;
            let slot = header_rc.rl().get_empty_slot();
            if let Some(slot) = slot {
                header_rc.wl().mark_slot_status(slot, true);
                Database::mut_buffer_pool().mark_btree_dirty(&header_pid);
                return Ok(slot as u32);
            }
        }
        Database::mut_buffer_pool().allocate_btree_page(self.table_id)
    }

    fn get_empty_leaf_page(&self, tx: &Transaction) -> DbResult<Pod<BTreeLeafPage>> {
        let index = self.next_page_index(tx)?;
        let pid = BTreePageID::new(PageCategory::Leaf, self.table_id, index);
        Database::mut_buffer_pool().new_leaf_page(&pid, &self.key_schema)
    }

    fn get_empty_internal_page(&self, tx: &Transaction) -> DbResult<Pod<BTreeInternalPage>> {
        let index = self.next_page_index(tx)?;
        let pid = BTreePageID::new(PageCategory::Internal, self.table_id, index);
        Database::mut_buffer_pool().new_internal_page(&pid, &self.key_schema)
    }

    fn get_empty_header_page(&self, tx: &Transaction) -> DbResult<Pod<crate::btree::page::BTreeHeaderPage>> {
        let index = Database::mut_buffer_pool().allocate_btree_page(self.table_id)?;
        let pid = BTreePageID::new(PageCategory::Header, self.table_id, index);
        Database::mut_buffer_pool().new_header_page(&pid)
    }

    fn set_parent(tx: &Transaction, child_pid: &BTreePageID, parent_pid: &BTreePageID, key_schema: &Schema) -> VoidResult {
        match child_pid.category {
            PageCategory::Internal => {
                let rc = Database::mut_buffer_pool().get_internal_page(tx, Permission::ReadWrite, child_pid, key_schema)?;
                rc.wl().set_parent_pid(parent_pid);
                Database::mut_buffer_pool().mark_btree_dirty(child_pid);
                Ok(())
            }
            PageCategory::Leaf => {
                let rc = Database::mut_buffer_pool().get_leaf_page(tx, Permission::ReadWrite, child_pid, key_schema)?;
                rc.wl().set_parent_pid(parent_pid);
                Database::mut_buffer_pool().mark_btree_dirty(child_pid);
                Ok(())
            }
            _ => Err(DbError::corruption("invalid child page category for reparenting")),
        }
    }

    fn free_page(&self, tx: &Transaction, pid: &BTreePageID) -> VoidResult {
        Database::mut_buffer_pool().discard(PageKey::BTree(*pid));

        let root_ptr_rc = self.get_root_ptr_page(tx)?;
        let header_pid = root_ptr_rc.rl().get_header_pid();
        let header_rc = match header_pid {
            Some(header_pid) => Database::mut_buffer_pool().get_header_page(tx, &header_pid)?,
            None => {
                let rc = self.get_empty_header_page(tx)?;
                root_ptr_rc.wl().set_root_pid(&root_ptr_rc.rl().get_root_pid());
                root_ptr_rc.wl().set_header_pid(&rc.rl().get_pid());
                Database::mut_buffer_pool().mark_btree_dirty(&self.root_ptr_pid());
                rc
            }
        };
        header_rc.wl().mark_slot_status(pid.page_index as usize, false);
        Database::mut_buffer_pool().mark_btree_dirty(&header_rc.rl().get_pid());
        Ok(())
    }

    fn entry_between(parent: &BTreeInternalPage, left_pid: &BTreePageID, right_pid: &BTreePageID) -> DbResult<Entry> {
        for e in BTreeInternalPageIterator::new(parent) {
            if &e.get_left_child() == left_pid && &e.get_right_child() == right_pid {
                return Ok(e);
            }
        }
        Err(DbError::corruption("no parent entry links the given siblings"))
    }

    /// Left/right sibling of `pid` among its parent's children, in key
    /// order (not necessarily adjacent slots, since slots get reused).
    fn siblings_of(parent: &BTreeInternalPage, pid: &BTreePageID) -> (Option<BTreePageID>, Option<BTreePageID>) {
        let mut children = Vec::new();
        let mut it = BTreeInternalPageIterator::new(parent).peekable();
        if let Some(first) = it.peek() {
            children.push(first.get_left_child());
        }
        for e in it {
            children.push(e.get_right_child());
        }
        match children.iter().position(|c| c == pid) {
            Some(i) => {
                let left = if i > 0 { Some(children[i - 1]) } else { None };
                let right = children.get(i + 1).copied();
                (left, right)
            }
            None => (None, None),
        }
    }

    /// Rewrites any ancestor separator above `pid` that still equals
    /// `old_key` to `new_key`. Called after `pid`'s own separator in its
    /// immediate parent has already been corrected: a split bubbles a
    /// child subtree's leftmost key upward one level at a time, so a
    /// stale copy of that old value can persist in any number of
    /// enclosing ancestors, not just the immediate parent.
    fn maintain_parent(&self, tx: &Transaction, pid: &BTreePageID, old_key: &Key, new_key: &Key) -> VoidResult {
        if old_key == new_key {
            return Ok(());
        }

        let mut current_pid = *pid;
        loop {
            let parent_pid = {
                let page_rc = Database::mut_buffer_pool().get_internal_page(tx, Permission::ReadOnly, &current_pid, &self.key_schema)?;
                page_rc.rl().get_parent_pid()
            };
            if parent_pid.category != PageCategory::Internal {
                return Ok(());
            }

            let parent_rc = Database::mut_buffer_pool().get_internal_page(tx, Permission::ReadWrite, &parent_pid, &self.key_schema)?;
            let matched = {
                let parent = parent_rc.rl();
                BTreeInternalPageIterator::new(&parent).find(|e| e.get_key() == *old_key)
            };
            if let Some(mut entry) = matched {
                entry.set_key(new_key.clone());
                parent_rc.wl().update_entry(&entry);
                Database::mut_buffer_pool().mark_btree_dirty(&parent_pid);
            }

            current_pid = parent_pid;
        }
    }

    // --- search ---

    fn find_leaf_page(&self, tx: &Transaction, perm: Permission, page_id: BTreePageID, search: &SearchFor) -> DbResult<Pod<BTreeLeafPage>> {
        match page_id.category {
            PageCategory::Leaf => Database::mut_buffer_pool().get_leaf_page(tx, perm, &page_id, &self.key_schema),
            PageCategory::Internal => {
                let page_rc = Database::mut_buffer_pool().get_internal_page(tx, Permission::ReadOnly, &page_id, &self.key_schema)?;
                let child_pid = {
                    let page = page_rc.rl();
                    let mut last_entry = None;
                    let mut found = None;
                    for e in BTreeInternalPageIterator::new(&page) {
                        match search {
                            SearchFor::Key(k) => {
                                if e.get_key() >= *k {
                                    found = Some(e.get_left_child());
                                    break;
                                }
                            }
                            SearchFor::LeftMost => {
                                found = Some(e.get_left_child());
                                break;
                            }
                            SearchFor::RightMost => {
                                found = Some(e.get_right_child());
                            }
                        }
                        last_entry = Some(e);
                    }
                    found.or_else(|| last_entry.map(|e| e.get_right_child()))
                };
                match child_pid {
                    Some(child_pid) => self.find_leaf_page(tx, perm, child_pid, search),
                    None => Err(DbError::corruption("internal page has no children")),
                }
            }
            _ => Err(DbError::corruption("invalid page category for a leaf search")),
        }
    }

    /// All rids stored under an exact key match.
    pub fn search_equal(&self, tx: &Transaction, key: &Key) -> DbResult<Vec<Rid>> {
        let root_pid = self.get_root_pid(tx)?;
        let mut current = Some(self.find_leaf_page(tx, Permission::ReadOnly, root_pid, &SearchFor::Key(key.clone()))?);
        let mut result = Vec::new();

        while let Some(page_rc) = current {
            let page = page_rc.rl();
            let mut stop = false;
            for (_, k, r) in BTreeLeafPageIterator::new(&page) {
                if k == *key {
                    result.push(r);
                } else if k > *key {
                    stop = true;
                    break;
                }
            }
            if stop {
                break;
            }
            current = match page.get_right_pid() {
                Some(pid) => Some(Database::mut_buffer_pool().get_leaf_page(tx, Permission::ReadOnly, &pid, &self.key_schema)?),
                None => None,
            };
        }
        Ok(result)
    }

    pub fn iter<'t>(&'t self, tx: &'t Transaction) -> DbResult<BTreeTableIterator<'t>> {
        BTreeTableIterator::new(tx, self)
    }

    /// Rids for every key in `[lower, upper]` (either bound `None` means
    /// unbounded on that side). Descends once straight to the leaf that
    /// would hold `lower` (or the leftmost leaf, if unbounded below) and
    /// walks the sibling chain until a key exceeds `upper`, instead of
    /// filtering a full scan client-side.
    pub fn search_range(&self, tx: &Transaction, lower: Option<&Key>, upper: Option<&Key>) -> DbResult<Vec<Rid>> {
        let root_pid = self.get_root_pid(tx)?;
        let search_for = match lower {
            Some(k) => SearchFor::Key(k.clone()),
            None => SearchFor::LeftMost,
        };
        let mut current = Some(self.find_leaf_page(tx, Permission::ReadOnly, root_pid, &search_for)?);
        let mut result = Vec::new();

        while let Some(page_rc) = current {
            let page = page_rc.rl();
            let mut stop = false;
            for (_, k, r) in BTreeLeafPageIterator::new(&page) {
                if let Some(lo) = lower {
                    if k < *lo {
                        continue;
                    }
                }
                if let Some(hi) = upper {
                    if k > *hi {
                        stop = true;
                        break;
                    }
                }
                result.push(r);
            }
            if stop {
                break;
            }
            current = match page.get_right_pid() {
                Some(pid) => Some(Database::mut_buffer_pool().get_leaf_page(tx, Permission::ReadOnly, &pid, &self.key_schema)?),
                None => None,
            };
        }
        Ok(result)
    }

    // --- insert ---

    pub fn insert_entry(&self, tx: &Transaction, key: Key, rid: Rid) -> VoidResult {
        let root_pointer_rc = self.get_root_ptr_page(tx)?;
        let mut root_pointer = root_pointer_rc.wl();
        let mut root_pid = root_pointer.get_root_pid();
        root_pid.table_id = self.table_id;

        if Database::mut_buffer_pool().allocate_btree_page(self.table_id)? == 0 {
            let leaf_pid = BTreePageID::new(PageCategory::Leaf, self.table_id, 1);
            Database::mut_buffer_pool().new_leaf_page(&leaf_pid, &self.key_schema)?;
            root_pointer.set_root_pid(&leaf_pid);
            root_pid = leaf_pid;
        }

        let root_ptr_pid = self.root_ptr_pid();
        let root_ptr_callback = |action: &Action| match action {
            Action::Release => {
                Database::mut_buffer_pool().mark_btree_dirty(&root_ptr_pid);
                drop(root_pointer);
            }
            Action::InsertEntry(entry) => {
                let new_root_rc = self.get_empty_internal_page(tx).expect("allocate new root page");
                let mut new_root = new_root_rc.wl();
                new_root.insert_entry(entry).expect("insert entry into fresh root");
                root_pointer.set_root_pid(&new_root.get_pid());
                Database::mut_buffer_pool().mark_btree_dirty(&root_ptr_pid);
                Database::mut_buffer_pool().mark_btree_dirty(&new_root.get_pid());
            }
        };

        match root_pid.category {
            PageCategory::Internal => {
                let page_rc = Database::mut_buffer_pool().get_internal_page(tx, Permission::ReadWrite, &root_pid, &self.key_schema)?;
                let page = page_rc.wl();
                self.insert_to_internal(tx, page, root_ptr_callback, key, rid)
            }
            PageCategory::Leaf => {
                let page_rc = Database::mut_buffer_pool().get_leaf_page(tx, Permission::ReadWrite, &root_pid, &self.key_schema)?;
                let page = page_rc.wl();
                self.insert_to_leaf(tx, page, root_ptr_callback, key, rid)
            }
            _ => Err(DbError::corruption("invalid root page category")),
        }
    }

    fn insert_to_leaf(
        &self,
        tx: &Transaction,
        mut page: RwLockWriteGuard<'_, BTreeLeafPage>,
        parent_callback: impl FnOnce(&Action),
        key: Key,
        rid: Rid,
    ) -> VoidResult {
        if page.empty_slots_count() > 0 {
            parent_callback(&Action::Release);
            page.insert_entry(key, rid);
            Database::mut_buffer_pool().mark_btree_dirty(&page.get_pid());
            return Ok(());
        }

        let new_sibling_rc = self.get_empty_leaf_page(tx)?;
        let mut new_sibling = new_sibling_rc.wl();

        let move_count = page.entries_count() / 2;
        let mut delete_slots = Vec::new();
        let mut it = BTreeLeafPageIterator::new(&page);
        for (slot, k, r) in it.by_ref().rev().take(move_count) {
            delete_slots.push(slot);
            new_sibling.insert_entry(k, r);
        }
        for slot in delete_slots {
            page.delete_entry(slot);
        }

        new_sibling.set_right_pid(page.get_right_pid());
        new_sibling.set_left_pid(Some(page.get_pid()));
        page.set_right_pid(Some(new_sibling.get_pid()));

        let split_key = {
            let mut it = BTreeLeafPageIterator::new(&page);
            it.next_back().map(|(_, k, _)| k).expect("leaf page non-empty after split")
        };

        let entry = Entry::new(split_key.clone(), &page.get_pid(), &new_sibling.get_pid());
        parent_callback(&Action::InsertEntry(entry));

        Database::mut_buffer_pool().mark_btree_dirty(&page.get_pid());
        Database::mut_buffer_pool().mark_btree_dirty(&new_sibling.get_pid());

        if key > split_key {
            new_sibling.insert_entry(key, rid);
        } else {
            page.insert_entry(key, rid);
        }
        Ok(())
    }

    fn insert_to_internal(
        &self,
        tx: &Transaction,
        mut page: RwLockWriteGuard<'_, BTreeInternalPage>,
        parent_callback: impl FnOnce(&Action),
        key: Key,
        rid: Rid,
    ) -> VoidResult {
        if page.empty_slots_count() > 0 {
            parent_callback(&Action::Release);
            Database::mut_buffer_pool().mark_btree_dirty(&page.get_pid());
            return self.insert_to_internal_safe(tx, page, key, rid);
        }

        let sibling_rc = self.get_empty_internal_page(tx)?;
        let mut sibling = sibling_rc.wl();

        let move_count = page.entries_count() / 2;
        let mut delete_indexes = Vec::new();
        let mut it = BTreeInternalPageIterator::new(&page);
        for e in it.by_ref().rev().take(move_count) {
            delete_indexes.push(e.get_record_id());
            sibling.insert_entry(&e)?;
            Self::set_parent(tx, &e.get_right_child(), &sibling.get_pid(), &self.key_schema)?;
        }

        let middle_entry = it.next_back().ok_or_else(|| DbError::corruption("internal split found no middle entry"))?;
        delete_indexes.push(middle_entry.get_record_id());
        for i in delete_indexes {
            page.delete_key_and_right_child(i);
        }
        Self::set_parent(tx, &middle_entry.get_right_child(), &sibling.get_pid(), &self.key_schema)?;

        let split_key = middle_entry.get_key();
        let new_entry = Entry::new(split_key.clone(), &page.get_pid(), &sibling.get_pid());
        parent_callback(&Action::InsertEntry(new_entry));

        Database::mut_buffer_pool().mark_btree_dirty(&page.get_pid());
        Database::mut_buffer_pool().mark_btree_dirty(&sibling.get_pid());

        if key > split_key {
            self.insert_to_internal_safe(tx, sibling, key, rid)
        } else {
            self.insert_to_internal_safe(tx, page, key, rid)
        }
    }

    fn insert_to_internal_safe(&self, tx: &Transaction, mut page: RwLockWriteGuard<'_, BTreeInternalPage>, key: Key, rid: Rid) -> VoidResult {
        if page.empty_slots_count() == 0 {
            return Err(DbError::corruption("insert_to_internal_safe called on a full page"));
        }

        let mut last_entry = None;
        let mut child_pid = None;
        for e in BTreeInternalPageIterator::new(&page) {
            if e.get_key() >= key {
                child_pid = Some(e.get_left_child());
                break;
            }
            last_entry = Some(e);
        }
        let child_pid = match child_pid.or_else(|| last_entry.map(|e| e.get_right_child())) {
            Some(p) => p,
            None => return Err(DbError::corruption("internal page has no entries")),
        };

        let internal_callback = |action: &Action| match action {
            Action::Release => {
                Database::mut_buffer_pool().mark_btree_dirty(&page.get_pid());
                drop(page);
            }
            Action::InsertEntry(entry) => {
                page.insert_entry(entry).expect("insert entry into parent page with room");
                Database::mut_buffer_pool().mark_btree_dirty(&page.get_pid());
            }
        };

        match child_pid.category {
            PageCategory::Internal => {
                let child_rc = Database::mut_buffer_pool().get_internal_page(tx, Permission::ReadWrite, &child_pid, &self.key_schema)?;
                let child = child_rc.wl();
                self.insert_to_internal(tx, child, internal_callback, key, rid)
            }
            PageCategory::Leaf => {
                let child_rc = Database::mut_buffer_pool().get_leaf_page(tx, Permission::ReadWrite, &child_pid, &self.key_schema)?;
                let child = child_rc.wl();
                self.insert_to_leaf(tx, child, internal_callback, key, rid)
            }
            _ => Err(DbError::corruption("invalid child page category")),
        }
    }

    // --- delete ---

    pub fn delete_entry(&self, tx: &Transaction, key: &Key, rid: Rid) -> VoidResult {
        let root_pid = self.get_root_pid(tx)?;
        let leaf_rc = self.find_leaf_page(tx, Permission::ReadWrite, root_pid, &SearchFor::Key(key.clone()))?;

        let slot = {
            let page = leaf_rc.rl();
            BTreeLeafPageIterator::new(&page).find(|(_, k, r)| k == key && *r == rid).map(|(s, _, _)| s)
        };
        let slot = match slot {
            Some(s) => s,
            None => return Err(DbError::not_found(format!("no index entry for key {:?}, rid {:?}", key, rid))),
        };

        let needs_merge = {
            let mut page = leaf_rc.wl();
            page.delete_entry(slot);
            Database::mut_buffer_pool().mark_btree_dirty(&page.get_pid());
            page.should_merge()
        };

        if !needs_merge {
            return Ok(());
        }
        self.handle_erratic_leaf_page(tx, leaf_rc)
    }

    fn handle_erratic_leaf_page(&self, tx: &Transaction, page_rc: Pod<BTreeLeafPage>) -> VoidResult {
        let parent_pid = page_rc.rl().get_parent_pid();
        if parent_pid.category == PageCategory::RootPointer {
            return Ok(());
        }

        let (left_pid, right_pid) = (page_rc.rl().get_left_pid(), page_rc.rl().get_right_pid());
        if let Some(left_pid) = left_pid {
            let left_rc = Database::mut_buffer_pool().get_leaf_page(tx, Permission::ReadWrite, &left_pid, &self.key_schema)?;
            self.balance_two_leaf_pages(tx, left_rc, page_rc)
        } else if let Some(right_pid) = right_pid {
            let right_rc = Database::mut_buffer_pool().get_leaf_page(tx, Permission::ReadWrite, &right_pid, &self.key_schema)?;
            self.balance_two_leaf_pages(tx, page_rc, right_rc)
        } else {
            Err(DbError::corruption("leaf page below minimum occupancy has no sibling"))
        }
    }

    fn balance_two_leaf_pages(&self, tx: &Transaction, left_rc: Pod<BTreeLeafPage>, right_rc: Pod<BTreeLeafPage>) -> VoidResult {
        let parent_pid = left_rc.rl().get_parent_pid();
        let parent_rc = Database::mut_buffer_pool().get_internal_page(tx, Permission::ReadWrite, &parent_pid, &self.key_schema)?;
        let mut entry = Self::entry_between(&parent_rc.rl(), &left_rc.rl().get_pid(), &right_rc.rl().get_pid())?;

        let left_count = left_rc.rl().entries_count();
        let right_count = right_rc.rl().entries_count();
        let capacity = left_rc.rl().get_slots_count();

        if left_count + right_count <= capacity {
            return self.merge_leaf_pages(tx, left_rc, right_rc, parent_rc, &entry);
        }

        let move_count = (left_count + right_count) / 2 - left_count.min(right_count);
        if move_count == 0 {
            return Ok(());
        }

        let mut split_key = entry.get_key();
        {
            let mut left = left_rc.wl();
            let mut right = right_rc.wl();
            if left_count < right_count {
                let mut moved = Vec::new();
                for (slot, k, r) in BTreeLeafPageIterator::new(&right).take(move_count) {
                    left.insert_entry(k.clone(), r);
                    moved.push(slot);
                    split_key = k;
                }
                for slot in moved {
                    right.delete_entry(slot);
                }
            } else {
                let mut moved = Vec::new();
                for (slot, k, r) in BTreeLeafPageIterator::new(&left).rev().take(move_count) {
                    right.insert_entry(k.clone(), r);
                    moved.push(slot);
                    split_key = k;
                }
                for slot in moved {
                    left.delete_entry(slot);
                }
            }
            Database::mut_buffer_pool().mark_btree_dirty(&left.get_pid());
            Database::mut_buffer_pool().mark_btree_dirty(&right.get_pid());
        }

        let old_key = entry.get_key();
        entry.set_key(split_key.clone());
        parent_rc.wl().update_entry(&entry);
        Database::mut_buffer_pool().mark_btree_dirty(&parent_pid);
        self.maintain_parent(tx, &parent_pid, &old_key, &split_key)?;
        Ok(())
    }

    fn merge_leaf_pages(
        &self,
        tx: &Transaction,
        left_rc: Pod<BTreeLeafPage>,
        right_rc: Pod<BTreeLeafPage>,
        parent_rc: Pod<BTreeInternalPage>,
        entry: &Entry,
    ) -> VoidResult {
        {
            let mut left = left_rc.wl();
            let mut right = right_rc.wl();

            let mut moved = Vec::new();
            for (slot, k, r) in BTreeLeafPageIterator::new(&right) {
                left.insert_entry(k, r);
                moved.push(slot);
            }
            for slot in moved {
                right.delete_entry(slot);
            }

            left.set_right_pid(right.get_right_pid());
            if let Some(newer_right_pid) = right.get_right_pid() {
                let newer_rc = Database::mut_buffer_pool().get_leaf_page(tx, Permission::ReadWrite, &newer_right_pid, &self.key_schema)?;
                newer_rc.wl().set_left_pid(Some(left.get_pid()));
                Database::mut_buffer_pool().mark_btree_dirty(&newer_right_pid);
            }
            Database::mut_buffer_pool().mark_btree_dirty(&left.get_pid());
        }

        let right_pid = right_rc.rl().get_pid();
        self.free_page(tx, &right_pid)?;
        self.delete_parent_entry(tx, left_rc, parent_rc, entry)
    }

    fn handle_erratic_internal_page(&self, tx: &Transaction, page_rc: Pod<BTreeInternalPage>) -> VoidResult {
        let parent_pid = page_rc.rl().get_parent_pid();
        if parent_pid.category == PageCategory::RootPointer {
            return Ok(());
        }

        let parent_rc = Database::mut_buffer_pool().get_internal_page(tx, Permission::ReadWrite, &parent_pid, &self.key_schema)?;
        let (left_pid, right_pid) = Self::siblings_of(&parent_rc.rl(), &page_rc.rl().get_pid());

        if let Some(left_pid) = left_pid {
            let left_rc = Database::mut_buffer_pool().get_internal_page(tx, Permission::ReadWrite, &left_pid, &self.key_schema)?;
            self.balance_two_internal_pages(tx, left_rc, page_rc)
        } else if let Some(right_pid) = right_pid {
            let right_rc = Database::mut_buffer_pool().get_internal_page(tx, Permission::ReadWrite, &right_pid, &self.key_schema)?;
            self.balance_two_internal_pages(tx, page_rc, right_rc)
        } else {
            Err(DbError::corruption("internal page below minimum occupancy has no sibling"))
        }
    }

    fn balance_two_internal_pages(&self, tx: &Transaction, left_rc: Pod<BTreeInternalPage>, right_rc: Pod<BTreeInternalPage>) -> VoidResult {
        let parent_pid = left_rc.rl().get_parent_pid();
        let parent_rc = Database::mut_buffer_pool().get_internal_page(tx, Permission::ReadWrite, &parent_pid, &self.key_schema)?;
        let mut entry = Self::entry_between(&parent_rc.rl(), &left_rc.rl().get_pid(), &right_rc.rl().get_pid())?;

        let left_children = left_rc.rl().entries_count() + 1;
        let right_children = right_rc.rl().entries_count() + 1;
        let capacity = left_rc.rl().get_children_capacity();

        if left_children + right_children <= capacity {
            return self.merge_internal_pages(tx, left_rc, right_rc, parent_rc, &entry);
        }

        let move_count = (left_children + right_children) / 2 - left_children.min(right_children);
        if move_count == 0 {
            return Ok(());
        }

        let mut middle_key = entry.get_key();
        {
            let mut left = left_rc.wl();
            let mut right = right_rc.wl();

            if left_children < right_children {
                let mut edge_pid = left.get_last_child_pid();
                let mut moved = Vec::new();
                for e in BTreeInternalPageIterator::new(&right).take(move_count) {
                    moved.push(e.get_record_id());
                    let new_entry = Entry::new(middle_key.clone(), &edge_pid, &e.get_left_child());
                    left.insert_entry(&new_entry)?;
                    Self::set_parent(tx, &e.get_left_child(), &left.get_pid(), &self.key_schema)?;
                    middle_key = e.get_key();
                    edge_pid = e.get_left_child();
                }
                for i in moved {
                    right.delete_key_and_left_child(i);
                }
            } else {
                let mut edge_pid = right.get_first_child_pid();
                let mut moved = Vec::new();
                for e in BTreeInternalPageIterator::new(&left).rev().take(move_count) {
                    moved.push(e.get_record_id());
                    let new_entry = Entry::new(middle_key.clone(), &e.get_right_child(), &edge_pid);
                    right.insert_entry(&new_entry)?;
                    Self::set_parent(tx, &e.get_right_child(), &right.get_pid(), &self.key_schema)?;
                    middle_key = e.get_key();
                    edge_pid = e.get_right_child();
                }
                for i in moved {
                    left.delete_key_and_right_child(i);
                }
            }
            Database::mut_buffer_pool().mark_btree_dirty(&left.get_pid());
            Database::mut_buffer_pool().mark_btree_dirty(&right.get_pid());
        }

        let old_key = entry.get_key();
        entry.set_key(middle_key.clone());
        parent_rc.wl().update_entry(&entry);
        Database::mut_buffer_pool().mark_btree_dirty(&parent_pid);
        self.maintain_parent(tx, &parent_pid, &old_key, &middle_key)?;
        Ok(())
    }

    fn merge_internal_pages(
        &self,
        tx: &Transaction,
        left_rc: Pod<BTreeInternalPage>,
        right_rc: Pod<BTreeInternalPage>,
        parent_rc: Pod<BTreeInternalPage>,
        entry: &Entry,
    ) -> VoidResult {
        {
            let mut left = left_rc.wl();
            let mut right = right_rc.wl();

            let edge_entry = Entry::new(entry.get_key(), &left.get_last_child_pid(), &right.get_first_child_pid());
            Self::set_parent(tx, &right.get_first_child_pid(), &left.get_pid(), &self.key_schema)?;
            left.insert_entry(&edge_entry)?;

            let mut moved = Vec::new();
            for e in BTreeInternalPageIterator::new(&right) {
                left.insert_entry(&e)?;
                Self::set_parent(tx, &e.get_right_child(), &left.get_pid(), &self.key_schema)?;
                moved.push(e.get_record_id());
            }
            for i in moved {
                right.delete_key_and_right_child(i);
            }
            Database::mut_buffer_pool().mark_btree_dirty(&left.get_pid());
        }

        let right_pid = right_rc.rl().get_pid();
        self.free_page(tx, &right_pid)?;
        self.delete_parent_entry(tx, left_rc, parent_rc, entry)
    }

    /// Removes the entry in `parent` that separated `left_rc` from its
    /// now-merged sibling. If that empties the parent, `left_rc` becomes
    /// the new root; otherwise rebalances the parent if it is now itself
    /// below minimum occupancy.
    fn delete_parent_entry<P: BTreePage>(&self, tx: &Transaction, left_rc: Pod<P>, parent_rc: Pod<BTreeInternalPage>, entry: &Entry) -> VoidResult {
        let mut new_root = None;
        let mut erratic = false;
        {
            let mut parent = parent_rc.wl();
            let left = left_rc.rl();
            parent.delete_key_and_right_child(entry.get_record_id());
            Database::mut_buffer_pool().mark_btree_dirty(&parent.get_pid());

            if parent.entries_count() == 0 {
                new_root = Some(left.get_pid());
            } else if !parent.stable() {
                erratic = true;
            }
        }

        if let Some(root_pid) = new_root {
            {
                let root_ptr_rc = self.get_root_ptr_page(tx)?;
                root_ptr_rc.wl().set_root_pid(&root_pid);
            }
            Database::mut_buffer_pool().mark_btree_dirty(&self.root_ptr_pid());
            Self::set_parent(tx, &root_pid, &self.root_ptr_pid(), &self.key_schema)?;
            let parent_pid = parent_rc.rl().get_pid();
            return self.free_page(tx, &parent_pid);
        }

        if erratic {
            self.handle_erratic_internal_page(tx, parent_rc)?;
        }
        Ok(())
    }
}

/// Ascending full scan across every leaf in the tree, following the
/// sibling chain; used by sequential index scans and by tree-wide
/// maintenance (building a fresh index, say).
pub struct BTreeTableIterator<'t> {
    tx: &'t Transaction,
    table: &'t BTreeTable,
    current: Option<Pod<BTreeLeafPage>>,
    cursor: i32,
}

impl<'t> BTreeTableIterator<'t> {
    fn new(tx: &'t Transaction, table: &'t BTreeTable) -> DbResult<Self> {
        let root_pid = table.get_root_pid(tx)?;
        let first = table.find_leaf_page(tx, Permission::ReadOnly, root_pid, &SearchFor::LeftMost)?;
        Ok(Self { tx, table, current: Some(first), cursor: -1 })
    }
}

impl Iterator for BTreeTableIterator<'_> {
    type Item = (Key, Rid);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let page_rc = self.current.clone()?;
            let page = page_rc.rl();
            self.cursor += 1;

            let mut found = None;
            for i in (self.cursor as usize)..page.get_slots_count() {
                if page.is_slot_used(i) {
                    found = Some(i);
                    break;
                }
            }

            if let Some(i) = found {
                self.cursor = i as i32;
                return Some((page.get_key(i).unwrap(), page.get_rid(i).unwrap()));
            }

            let right = page.get_right_pid();
            drop(page);
            Database::mut_buffer_pool().unpin(PageKey::BTree(page_rc.rl().get_pid()), false);
            self.current = match right {
                Some(pid) => Database::mut_buffer_pool().get_leaf_page(self.tx, Permission::ReadOnly, &pid, &self.table.key_schema).ok(),
                None => None,
            };
            self.cursor = -1;
        }
    }
}
