mod common;

use stonebolt::{
    database::Database,
    executor::{insert::InsertExec, seq_scan::SeqScanExec, Executor},
    storage::{Column, Schema, Tuple, Type, Value},
    transaction::Transaction,
};

fn schema() -> Schema {
    Schema::new(vec![Column::new("id", Type::Int32, true)])
}

fn row_count(info: &stonebolt::catalog::TableInfo) -> usize {
    let tx = Transaction::new();
    let mut scan = SeqScanExec::new(&tx, info, None);
    scan.open().unwrap();
    let mut n = 0;
    while scan.next().unwrap().is_some() {
        n += 1;
    }
    scan.close().unwrap();
    tx.commit().unwrap();
    n
}

/// An aborted transaction's inserts must not be visible afterward: the
/// abort path replays the WAL backward (`RecoveryManager::undo_transaction`)
/// instead of keeping a separate in-memory write set.
#[test]
fn aborted_inserts_are_rolled_back() {
    common::setup();
    common::create_table("events", schema(), vec![0]);
    let info = Database::catalog().table_by_name("events").unwrap().clone();

    let tx = Transaction::new();
    let mut insert = InsertExec::new(&tx, info.clone(), vec![Tuple::new(vec![Value::Int32(1)]), Tuple::new(vec![Value::Int32(2)])]);
    insert.open().unwrap();
    insert.next().unwrap();
    insert.close().unwrap();
    tx.abort().unwrap();

    assert_eq!(row_count(&info), 0);
}

#[test]
fn committed_inserts_survive_a_later_abort() {
    common::setup();
    common::create_table("events", schema(), vec![0]);
    let info = Database::catalog().table_by_name("events").unwrap().clone();

    let tx = Transaction::new();
    let mut insert = InsertExec::new(&tx, info.clone(), vec![Tuple::new(vec![Value::Int32(1)])]);
    insert.open().unwrap();
    insert.next().unwrap();
    insert.close().unwrap();
    tx.commit().unwrap();

    let tx = Transaction::new();
    let mut insert = InsertExec::new(&tx, info.clone(), vec![Tuple::new(vec![Value::Int32(2)])]);
    insert.open().unwrap();
    insert.next().unwrap();
    insert.close().unwrap();
    tx.abort().unwrap();

    assert_eq!(row_count(&info), 1);
}
