use core::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use log::debug;

use crate::{database::Database, types::VoidResult};

use super::recovery::RecoveryManager;

pub type TransactionID = u32;

static NEXT_TRANSACTION_ID: AtomicU32 = AtomicU32::new(1);

/// A unit of work bounded by strict two-phase locking: every lock it
/// acquires (via the executors it backs) is held until `commit` or
/// `abort`, both of which release everything at once. Holding a
/// `Transaction` does not pin any resource by itself; it is just the
/// id recovery and the lock/log managers key their bookkeeping on.
#[derive(Eq, PartialEq, Clone)]
pub struct Transaction {
    id: TransactionID,
}

impl Transaction {
    pub fn new() -> Self {
        let id = NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed);
        let instance = Self { id };

        Database::mut_log_manager().log_begin(id).expect("log begin failed");
        Database::mut_lock_manager().begin(id);
        debug!("started {}", instance);
        instance
    }

    pub fn get_id(&self) -> TransactionID {
        self.id
    }

    /// Durably records the commit, then releases every lock this
    /// transaction is holding. The WAL invariant (log before page) is
    /// enforced by the buffer pool itself when it eventually evicts or
    /// explicitly flushes the pages this transaction dirtied, so commit
    /// does not need to force them out here.
    pub fn commit(&self) -> VoidResult {
        Database::mut_log_manager().log_commit(self.id)?;
        Database::mut_lock_manager().release_all(self);
        Database::mut_lock_manager().mark_committed(self.id);
        debug!("committed {}", self);
        Ok(())
    }

    /// Undoes every change this transaction logged, in reverse order,
    /// then writes the durable abort marker and releases its locks.
    pub fn abort(&self) -> VoidResult {
        {
            let log_manager = Database::log_manager();
            let mut buffer_pool = Database::mut_buffer_pool();
            let catalog = Database::catalog();
            RecoveryManager::undo_transaction(self.id, &log_manager, &mut buffer_pool, &catalog)?;
        }
        Database::mut_log_manager().log_abort(self.id)?;
        Database::mut_lock_manager().release_all(self);
        Database::mut_lock_manager().mark_aborted(self.id);
        debug!("aborted {}", self);
        Ok(())
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl std::hash::Hash for Transaction {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tx_{}", self.id)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
