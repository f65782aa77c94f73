mod common;

use std::{env, time::Duration};

use stonebolt::{
    database::Database,
    error::DbError,
    storage::{Column, Schema, Type},
    transaction::{LockKey, LockMode, Transaction},
};

#[test]
fn conflicting_record_lock_times_out() {
    env::set_var("STONEBOLT_LOCK_TIMEOUT_MS", "200");
    common::setup();
    common::create_table("locked", Schema::new(vec![Column::new("id", Type::Int32, true)]), vec![0]);
    let table_id = Database::catalog().table_by_name("locked").unwrap().id;
    let rid = stonebolt::storage::Rid::new(0, 0);

    let holder = Transaction::new();
    Database::mut_lock_manager().acquire(&holder, LockKey::Record(table_id, rid), LockMode::X).unwrap();

    let waiter = Transaction::new();
    let start = std::time::Instant::now();
    let result = Database::mut_lock_manager().acquire(&waiter, LockKey::Record(table_id, rid), LockMode::S);
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(DbError::LockTimeout(_))));
    assert!(elapsed >= Duration::from_millis(150));

    waiter.abort().unwrap();
    holder.commit().unwrap();
    env::remove_var("STONEBOLT_LOCK_TIMEOUT_MS");
}

#[test]
fn compatible_table_locks_do_not_block() {
    common::setup();
    common::create_table("shared", Schema::new(vec![Column::new("id", Type::Int32, true)]), vec![0]);
    let table_id = Database::catalog().table_by_name("shared").unwrap().id;

    let tx_a = Transaction::new();
    let tx_b = Transaction::new();

    Database::mut_lock_manager().acquire(&tx_a, LockKey::Table(table_id), LockMode::IS).unwrap();
    Database::mut_lock_manager().acquire(&tx_b, LockKey::Table(table_id), LockMode::IS).unwrap();

    tx_a.commit().unwrap();
    tx_b.commit().unwrap();
}
