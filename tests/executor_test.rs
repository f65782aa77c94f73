mod common;

use stonebolt::{
    executor::{
        delete::DeleteExec,
        index_scan::{IndexScanExec, IndexScanMode},
        insert::InsertExec,
        seq_scan::SeqScanExec,
        update::UpdateExec,
        Executor, RowSource,
    },
    btree::table::BTreeTable,
    database::Database,
    predicate::{Op, Predicate},
    storage::{Column, Schema, Tuple, Type, Value},
    transaction::Transaction,
};

fn schema() -> Schema {
    Schema::new(vec![
        Column::new("id", Type::Int32, true),
        Column::new("name", Type::Char(16), false),
    ])
}

fn rows(n: i32) -> Vec<Tuple> {
    (0..n).map(|i| Tuple::new(vec![Value::Int32(i), Value::Char(format!("row{}", i))])).collect()
}

#[test]
fn insert_then_scan_sees_every_row() {
    common::setup();
    common::create_table("widgets", schema(), vec![0]);
    let info = Database::catalog().table_by_name("widgets").unwrap().clone();

    let tx = Transaction::new();
    let mut insert = InsertExec::new(&tx, info.clone(), rows(20));
    insert.open().unwrap();
    let summary = insert.next().unwrap().unwrap();
    assert_eq!(summary.get(0), &Value::BigInt64(20));
    insert.close().unwrap();
    tx.commit().unwrap();

    let tx = Transaction::new();
    let mut scan = SeqScanExec::new(&tx, &info, None);
    scan.open().unwrap();
    let mut seen = 0;
    while scan.next().unwrap().is_some() {
        seen += 1;
    }
    scan.close().unwrap();
    tx.commit().unwrap();
    assert_eq!(seen, 20);
}

#[test]
fn duplicate_key_insert_is_rejected() {
    common::setup();
    common::create_table("widgets", schema(), vec![0]);
    let info = Database::catalog().table_by_name("widgets").unwrap().clone();

    let tx = Transaction::new();
    let mut insert = InsertExec::new(&tx, info.clone(), rows(1));
    insert.open().unwrap();
    insert.next().unwrap();
    insert.close().unwrap();
    tx.commit().unwrap();

    let tx = Transaction::new();
    let mut insert = InsertExec::new(&tx, info, rows(1));
    insert.open().unwrap();
    let err = insert.next().unwrap_err();
    assert!(matches!(err, stonebolt::error::DbError::DuplicateKey(_)));
    tx.abort().unwrap();
}

#[test]
fn index_scan_finds_exact_match() {
    common::setup();
    common::create_table("widgets", schema(), vec![0]);
    let info = Database::catalog().table_by_name("widgets").unwrap().clone();

    let tx = Transaction::new();
    let mut insert = InsertExec::new(&tx, info.clone(), rows(10));
    insert.open().unwrap();
    insert.next().unwrap();
    insert.close().unwrap();
    tx.commit().unwrap();

    let tx = Transaction::new();
    let key_schema = info.key_schema();
    let table = BTreeTable::new(info.primary_index().id, key_schema);
    let mut scan = IndexScanExec::new(&tx, &table, &info, IndexScanMode::Equal(vec![Value::Int32(5)]), None);
    scan.open().unwrap();
    let tuple = scan.next().unwrap().unwrap();
    assert_eq!(tuple.get(0), &Value::Int32(5));
    assert!(scan.next().unwrap().is_none());
    scan.close().unwrap();
    tx.commit().unwrap();
}

#[test]
fn update_moves_index_entry_when_key_changes() {
    common::setup();
    common::create_table("widgets", schema(), vec![0]);
    let info = Database::catalog().table_by_name("widgets").unwrap().clone();

    let tx = Transaction::new();
    let mut insert = InsertExec::new(&tx, info.clone(), rows(3));
    insert.open().unwrap();
    insert.next().unwrap();
    insert.close().unwrap();
    tx.commit().unwrap();

    let tx = Transaction::new();
    let source = RowSource::Seq(SeqScanExec::new(&tx, &info, Some(Predicate::new(0, Op::Equals, Value::Int32(1)))));
    let mut update = UpdateExec::new(&tx, info.clone(), source, vec![(0, Value::Int32(100))]);
    update.open().unwrap();
    let summary = update.next().unwrap().unwrap();
    assert_eq!(summary.get(0), &Value::BigInt64(1));
    update.close().unwrap();
    tx.commit().unwrap();

    let tx = Transaction::new();
    let key_schema = info.key_schema();
    let table = BTreeTable::new(info.primary_index().id, key_schema);
    let mut scan = IndexScanExec::new(&tx, &table, &info, IndexScanMode::Equal(vec![Value::Int32(100)]), None);
    scan.open().unwrap();
    assert!(scan.next().unwrap().is_some());
    scan.close().unwrap();

    let table = BTreeTable::new(info.primary_index().id, info.key_schema());
    let mut stale = IndexScanExec::new(&tx, &table, &info, IndexScanMode::Equal(vec![Value::Int32(1)]), None);
    stale.open().unwrap();
    assert!(stale.next().unwrap().is_none());
    stale.close().unwrap();
    tx.commit().unwrap();
}

#[test]
fn delete_removes_row_from_heap_and_index() {
    common::setup();
    common::create_table("widgets", schema(), vec![0]);
    let info = Database::catalog().table_by_name("widgets").unwrap().clone();

    let tx = Transaction::new();
    let mut insert = InsertExec::new(&tx, info.clone(), rows(5));
    insert.open().unwrap();
    insert.next().unwrap();
    insert.close().unwrap();
    tx.commit().unwrap();

    let tx = Transaction::new();
    let source = RowSource::Seq(SeqScanExec::new(&tx, &info, Some(Predicate::new(0, Op::Equals, Value::Int32(2)))));
    let mut delete = DeleteExec::new(&tx, info.clone(), source);
    delete.open().unwrap();
    let summary = delete.next().unwrap().unwrap();
    assert_eq!(summary.get(0), &Value::BigInt64(1));
    delete.close().unwrap();
    tx.commit().unwrap();

    let tx = Transaction::new();
    let mut scan = SeqScanExec::new(&tx, &info, None);
    scan.open().unwrap();
    let mut remaining = 0;
    while scan.next().unwrap().is_some() {
        remaining += 1;
    }
    scan.close().unwrap();
    tx.commit().unwrap();
    assert_eq!(remaining, 4);
}

#[test]
fn conjunction_predicate_requires_every_clause() {
    common::setup();
    common::create_table("widgets", schema(), vec![0]);
    let info = Database::catalog().table_by_name("widgets").unwrap().clone();

    let tx = Transaction::new();
    let mut insert = InsertExec::new(&tx, info.clone(), rows(20));
    insert.open().unwrap();
    insert.next().unwrap();
    insert.close().unwrap();
    tx.commit().unwrap();

    let tx = Transaction::new();
    let predicate = Predicate::conjunction(vec![
        stonebolt::predicate::Clause::new(0, Op::GreaterThanOrEq, Value::Int32(5)),
        stonebolt::predicate::Clause::new(0, Op::LessThan, Value::Int32(10)),
    ]);
    let mut scan = SeqScanExec::new(&tx, &info, Some(predicate));
    scan.open().unwrap();
    let mut seen = Vec::new();
    while let Some(tuple) = scan.next().unwrap() {
        seen.push(tuple.get(0).clone());
    }
    scan.close().unwrap();
    tx.commit().unwrap();
    assert_eq!(seen, (5..10).map(Value::Int32).collect::<Vec<_>>());
}

fn two_column_schema() -> Schema {
    Schema::new(vec![
        Column::new("id", Type::Int32, true),
        Column::new("email", Type::Char(16), false),
    ])
}

#[test]
fn secondary_index_tracks_inserts_updates_and_deletes() {
    common::setup();
    common::create_table("accounts", two_column_schema(), vec![0]);
    Database::mut_catalog().create_index("accounts", "accounts_email_idx", vec![1]).unwrap();
    let info = Database::catalog().table_by_name("accounts").unwrap().clone();
    assert_eq!(info.indexes.len(), 2);
    let email_index_info = info.index_by_name("accounts_email_idx").unwrap().clone();

    let make_row = |id: i32, email: &str| Tuple::new(vec![Value::Int32(id), Value::Char(email.to_string())]);

    let tx = Transaction::new();
    let mut insert = InsertExec::new(&tx, info.clone(), vec![make_row(1, "a@x.com"), make_row(2, "b@x.com")]);
    insert.open().unwrap();
    insert.next().unwrap();
    insert.close().unwrap();
    tx.commit().unwrap();

    let email_index = BTreeTable::new(email_index_info.id, email_index_info.key_schema(&info.schema));

    let tx = Transaction::new();
    let hits = email_index.search_equal(&tx, &vec![Value::Char("a@x.com".to_string())]).unwrap();
    assert_eq!(hits.len(), 1);
    tx.commit().unwrap();

    let tx = Transaction::new();
    let source = RowSource::Seq(SeqScanExec::new(&tx, &info, Some(Predicate::new(0, Op::Equals, Value::Int32(1)))));
    let mut update = UpdateExec::new(&tx, info.clone(), source, vec![(1, Value::Char("c@x.com".to_string()))]);
    update.open().unwrap();
    update.next().unwrap();
    update.close().unwrap();
    tx.commit().unwrap();

    let tx = Transaction::new();
    assert!(email_index.search_equal(&tx, &vec![Value::Char("a@x.com".to_string())]).unwrap().is_empty());
    assert_eq!(email_index.search_equal(&tx, &vec![Value::Char("c@x.com".to_string())]).unwrap().len(), 1);
    tx.commit().unwrap();

    let tx = Transaction::new();
    let source = RowSource::Seq(SeqScanExec::new(&tx, &info, Some(Predicate::new(0, Op::Equals, Value::Int32(2)))));
    let mut delete = DeleteExec::new(&tx, info.clone(), source);
    delete.open().unwrap();
    delete.next().unwrap();
    delete.close().unwrap();
    tx.commit().unwrap();

    let tx = Transaction::new();
    assert!(email_index.search_equal(&tx, &vec![Value::Char("b@x.com".to_string())]).unwrap().is_empty());
    tx.commit().unwrap();
}

#[test]
fn mode_one_scan_filters_on_non_leading_composite_column() {
    common::setup();
    common::create_table("accounts", two_column_schema(), vec![0]);
    Database::mut_catalog().create_index("accounts", "accounts_compound_idx", vec![1, 0]).unwrap();
    let info = Database::catalog().table_by_name("accounts").unwrap().clone();
    let compound_info = info.index_by_name("accounts_compound_idx").unwrap().clone();

    let make_row = |id: i32, email: &str| Tuple::new(vec![Value::Int32(id), Value::Char(email.to_string())]);

    let tx = Transaction::new();
    let mut insert = InsertExec::new(
        &tx,
        info.clone(),
        vec![make_row(1, "shared@x.com"), make_row(2, "shared@x.com"), make_row(3, "other@x.com")],
    );
    insert.open().unwrap();
    insert.next().unwrap();
    insert.close().unwrap();
    tx.commit().unwrap();

    // the index is keyed (email, id); filtering on `id` alone — position 1,
    // not the leading column — can't be served by a bounded descent, so
    // this exercises `IndexScanMode::ModeOne`.
    let compound_table = BTreeTable::new(compound_info.id, compound_info.key_schema(&info.schema));
    let tx = Transaction::new();
    let mode = IndexScanMode::ModeOne { fixed: vec![(1, Value::Int32(2))] };
    let mut scan = IndexScanExec::new(&tx, &compound_table, &info, mode, None);
    scan.open().unwrap();
    let tuple = scan.next().unwrap().unwrap();
    assert_eq!(tuple.get(0), &Value::Int32(2));
    assert!(scan.next().unwrap().is_none());
    scan.close().unwrap();
    tx.commit().unwrap();
}
