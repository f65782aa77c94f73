use std::convert::TryInto;

use super::{BTreeBasePage, BTreePage, BTreePageID, PageCategory, EMPTY_PAGE_ID};

/// Fixed page 0 of every index file. Indirects to the current root page
/// (which may migrate between leaf and internal as the tree grows or
/// collapses) and to the head of the free-page header chain.
pub struct BTreeRootPointerPage {
    base: BTreeBasePage,
    root_pid: BTreePageID,
    header_page_index: u32,
}

impl std::ops::Deref for BTreeRootPointerPage {
    type Target = BTreeBasePage;
    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl std::ops::DerefMut for BTreeRootPointerPage {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

impl BTreeRootPointerPage {
    pub fn new(pid: &BTreePageID, bytes: Vec<u8>) -> Self {
        let root_page_index = i32::from_le_bytes(bytes[0..4].try_into().unwrap()) as u32;
        let root_category_tag = i32::from_le_bytes(bytes[4..8].try_into().unwrap()) as u32;
        let header_page_index = i32::from_le_bytes(bytes[8..12].try_into().unwrap()) as u32;

        let root_pid = BTreePageID::new(PageCategory::from_tag(root_category_tag), pid.table_id, root_page_index);

        Self { base: BTreeBasePage::new(pid), root_pid, header_page_index }
    }

    pub fn empty_bytes(page_size: usize) -> Vec<u8> {
        let mut buf = vec![0u8; page_size];
        buf[0..4].copy_from_slice(&(EMPTY_PAGE_ID as i32).to_le_bytes());
        buf[4..8].copy_from_slice(&(PageCategory::Leaf.tag() as i32).to_le_bytes());
        buf[8..12].copy_from_slice(&(EMPTY_PAGE_ID as i32).to_le_bytes());
        buf
    }

    pub fn get_root_pid(&self) -> BTreePageID {
        self.root_pid
    }

    pub fn set_root_pid(&mut self, pid: &BTreePageID) {
        self.root_pid = *pid;
    }

    pub fn get_header_pid(&self) -> Option<BTreePageID> {
        if self.header_page_index == EMPTY_PAGE_ID {
            None
        } else {
            Some(BTreePageID::new(PageCategory::Header, self.get_pid().table_id, self.header_page_index))
        }
    }

    pub fn set_header_pid(&mut self, pid: &BTreePageID) {
        self.header_page_index = pid.page_index;
    }
}

impl BTreePage for BTreeRootPointerPage {
    fn get_pid(&self) -> BTreePageID {
        self.base.get_pid()
    }

    fn get_parent_pid(&self) -> BTreePageID {
        self.base.get_parent_pid()
    }

    fn set_parent_pid(&mut self, pid: &BTreePageID) {
        self.base.set_parent_pid(pid)
    }

    fn get_page_data(&self) -> Vec<u8> {
        let mut buf = vec![0u8; 12];
        buf[0..4].copy_from_slice(&(self.root_pid.page_index as i32).to_le_bytes());
        buf[4..8].copy_from_slice(&(self.root_pid.category.tag() as i32).to_le_bytes());
        buf[8..12].copy_from_slice(&(self.header_page_index as i32).to_le_bytes());
        buf
    }
}
