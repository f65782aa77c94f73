use std::path::PathBuf;

/// Process-wide knobs, constructed once and threaded into every subsystem
/// at construction time rather than read from scattered constants. See
/// `Database::new`.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub page_size: usize,
    pub buffer_pool_frames: usize,
    pub lock_wait_timeout_ms: u64,
    pub log_buffer_size: usize,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            page_size: Self::env_usize("STONEBOLT_PAGE_SIZE", 4096),
            buffer_pool_frames: Self::env_usize("STONEBOLT_BUFFER_FRAMES", 256),
            lock_wait_timeout_ms: Self::env_u64("STONEBOLT_LOCK_TIMEOUT_MS", 3_000),
            log_buffer_size: Self::env_usize("STONEBOLT_LOG_BUFFER_BYTES", 64 * 1024),
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("wal.log")
    }

    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.table", table_name))
    }

    pub fn index_path(&self, index_name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.index", index_name))
    }

    fn env_usize(key: &str, default: usize) -> usize {
        std::env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn env_u64(key: &str, default: u64) -> u64 {
        std::env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("data/default_db")
    }
}
