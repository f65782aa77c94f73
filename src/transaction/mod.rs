pub mod lock_manager;
pub mod log_manager;
pub mod log_record;
pub mod recovery;
mod tx;
mod wait_for_graph;

pub use lock_manager::{LockKey, LockManager, LockMode, TransactionStatus};
pub use recovery::RecoveryManager;
pub use tx::{Transaction, TransactionID};

/// Which latch/lock strength a page or row fetch needs. Scans take
/// `ReadOnly`; anything that mutates a page takes `ReadWrite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    pub fn table_lock_mode(&self) -> LockMode {
        match self {
            Permission::ReadOnly => LockMode::IS,
            Permission::ReadWrite => LockMode::IX,
        }
    }

    pub fn record_lock_mode(&self) -> LockMode {
        match self {
            Permission::ReadOnly => LockMode::S,
            Permission::ReadWrite => LockMode::X,
        }
    }
}
