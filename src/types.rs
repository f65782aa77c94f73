use std::sync::{Arc, RwLock};

use crate::error::DbError;

/// Shorthand for the shared-ownership, interior-mutability cell almost
/// every subsystem handle is wrapped in.
pub type Pod<T> = Arc<RwLock<T>>;

pub fn new_pod<T>(v: T) -> Pod<T> {
    Arc::new(RwLock::new(v))
}

pub type ResultPod<T> = Result<Pod<T>, DbError>;
pub type DbResult<T> = Result<T, DbError>;
pub type VoidResult = Result<(), DbError>;
