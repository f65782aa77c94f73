use std::{collections::HashMap, path::PathBuf};

use crate::{error::DbError, io::SmallFile};

/// Owns one file handle per table/index and provides fixed-size page
/// read/write by page-number plus append/read of the opaque log stream.
/// This is the leaf of the storage stack: the buffer pool is the only
/// caller above it.
pub struct DiskManager {
    page_size: usize,
    files: HashMap<String, SmallFile>,
    data_dir: PathBuf,
}

impl DiskManager {
    pub fn new(data_dir: PathBuf, page_size: usize) -> Self {
        std::fs::create_dir_all(&data_dir).expect("failed to create data directory");
        Self {
            page_size,
            files: HashMap::new(),
            data_dir,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn file_mut(&mut self, file_key: &str) -> &mut SmallFile {
        if !self.files.contains_key(file_key) {
            let path = self.data_dir.join(file_key);
            self.files.insert(file_key.to_string(), SmallFile::new(path));
        }
        self.files.get_mut(file_key).unwrap()
    }

    pub fn read_page(&mut self, file_key: &str, page_no: u32) -> Result<Vec<u8>, DbError> {
        let page_size = self.page_size;
        let offset = page_no as u64 * page_size as u64;
        self.file_mut(file_key).read_exact_at(offset, page_size)
    }

    pub fn write_page(&mut self, file_key: &str, page_no: u32, bytes: &[u8]) -> Result<(), DbError> {
        let page_size = self.page_size;
        assert!(bytes.len() <= page_size, "page payload exceeds page size");
        let offset = page_no as u64 * page_size as u64;
        let mut padded = bytes.to_vec();
        padded.resize(page_size, 0);
        self.file_mut(file_key).write_at(offset, &padded)
    }

    pub fn page_count(&mut self, file_key: &str) -> Result<u32, DbError> {
        let page_size = self.page_size as u64;
        let size = self.file_mut(file_key).get_size()?;
        Ok((size / page_size) as u32)
    }

    /// Drops a table/index's file entirely: closes the cached handle and
    /// removes the backing file from disk. Missing-file is not an error
    /// here since the caller may be cleaning up after a file that was
    /// never written to (e.g. an index declared but never populated).
    pub fn remove_file(&mut self, file_key: &str) -> Result<(), DbError> {
        self.files.remove(file_key);
        match std::fs::remove_file(self.data_dir.join(file_key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DbError::Io(e.to_string())),
        }
    }
}
