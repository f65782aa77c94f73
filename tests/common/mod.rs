use std::sync::atomic::{AtomicU32, Ordering};

use stonebolt::{config::Config, database::Database, storage::Schema, utils::init_log};

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Boots a fresh `Database` singleton over an empty temp directory,
/// isolated per test so tests can run concurrently without treading on
/// each other's pages or WAL.
pub fn setup() {
    init_log();
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("stonebolt_test_{}_{}", std::process::id(), n));
    let _ = std::fs::remove_dir_all(&dir);
    Database::init(Config::new(dir));
}

pub fn create_table(name: &str, schema: Schema, key_columns: Vec<usize>) -> u32 {
    Database::mut_catalog().create_table(name, schema, key_columns).unwrap()
}
