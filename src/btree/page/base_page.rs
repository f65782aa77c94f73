use super::{BTreePage, BTreePageID, PageCategory};

pub struct BTreeBasePage {
    pid: BTreePageID,
    parent_page_index: u32,
}

impl BTreeBasePage {
    pub fn new(pid: &BTreePageID) -> BTreeBasePage {
        BTreeBasePage { pid: *pid, parent_page_index: 0 }
    }
}

impl BTreePage for BTreeBasePage {
    fn get_pid(&self) -> BTreePageID {
        self.pid
    }

    fn get_parent_pid(&self) -> BTreePageID {
        let category = if self.parent_page_index == 0 {
            PageCategory::RootPointer
        } else {
            PageCategory::Internal
        };
        BTreePageID::new(category, self.pid.table_id, self.parent_page_index)
    }

    fn set_parent_pid(&mut self, pid: &BTreePageID) {
        self.parent_page_index = pid.page_index;
    }

    fn get_page_data(&self) -> Vec<u8> {
        Vec::new()
    }
}
