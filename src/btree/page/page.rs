use super::BTreePageID;

pub trait BTreePage {
    fn get_pid(&self) -> BTreePageID;

    fn get_parent_pid(&self) -> BTreePageID;
    fn set_parent_pid(&mut self, pid: &BTreePageID);

    /// Serialize the page body back to a page-sized byte buffer, used
    /// by the buffer pool when flushing a dirty frame.
    fn get_page_data(&self) -> Vec<u8>;
}
