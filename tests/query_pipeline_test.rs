mod common;

use stonebolt::{
    database::Database,
    executor::{
        aggregate::{AggregateExec, AggregateOp},
        insert::InsertExec,
        join::BlockNestedLoopJoinExec,
        seq_scan::SeqScanExec,
        sort::{SortDirection, SortExec},
        Executor,
    },
    storage::{Column, Schema, Tuple, Type, Value},
    transaction::Transaction,
};

fn orders_schema() -> Schema {
    Schema::new(vec![Column::new("id", Type::Int32, true), Column::new("customer", Type::Int32, false), Column::new("total", Type::Int32, false)])
}

fn customers_schema() -> Schema {
    Schema::new(vec![Column::new("id", Type::Int32, true), Column::new("name", Type::Char(16), false)])
}

fn seed() {
    common::create_table("orders", orders_schema(), vec![0]);
    common::create_table("customers", customers_schema(), vec![0]);

    let orders = Database::catalog().table_by_name("orders").unwrap().clone();
    let customers = Database::catalog().table_by_name("customers").unwrap().clone();

    let tx = Transaction::new();
    let mut insert = InsertExec::new(
        &tx,
        orders,
        vec![
            Tuple::new(vec![Value::Int32(1), Value::Int32(10), Value::Int32(50)]),
            Tuple::new(vec![Value::Int32(2), Value::Int32(10), Value::Int32(30)]),
            Tuple::new(vec![Value::Int32(3), Value::Int32(20), Value::Int32(90)]),
        ],
    );
    insert.open().unwrap();
    insert.next().unwrap();
    insert.close().unwrap();

    let mut insert = InsertExec::new(&tx, customers, vec![Tuple::new(vec![Value::Int32(10), Value::Char("alice".into())]), Tuple::new(vec![Value::Int32(20), Value::Char("bob".into())])]);
    insert.open().unwrap();
    insert.next().unwrap();
    insert.close().unwrap();
    tx.commit().unwrap();
}

#[test]
fn sort_orders_rows_by_total_descending() {
    common::setup();
    seed();

    let orders = Database::catalog().table_by_name("orders").unwrap().clone();
    let tx = Transaction::new();
    let scan = Box::new(SeqScanExec::new(&tx, &orders, None));
    let mut sort = SortExec::new(scan, vec![(2, SortDirection::Desc)], None);
    sort.open().unwrap();

    let mut totals = Vec::new();
    while let Some(tuple) = sort.next().unwrap() {
        totals.push(match tuple.get(2) {
            Value::Int32(v) => *v,
            _ => unreachable!(),
        });
    }
    sort.close().unwrap();
    tx.commit().unwrap();

    assert_eq!(totals, vec![90, 50, 30]);
}

#[test]
fn sum_of_order_totals() {
    common::setup();
    seed();

    let orders = Database::catalog().table_by_name("orders").unwrap().clone();
    let tx = Transaction::new();
    let scan = Box::new(SeqScanExec::new(&tx, &orders, None));
    let mut agg = AggregateExec::new(scan, AggregateOp::Sum, 2);
    agg.open().unwrap();
    let tuple = agg.next().unwrap().unwrap();
    assert_eq!(tuple.get(0), &Value::BigInt64(170));
    agg.close().unwrap();
    tx.commit().unwrap();
}

#[test]
fn join_orders_to_customers_on_customer_id() {
    common::setup();
    seed();

    let orders = Database::catalog().table_by_name("orders").unwrap().clone();
    let customers = Database::catalog().table_by_name("customers").unwrap().clone();

    let tx = Transaction::new();
    let outer = Box::new(SeqScanExec::new(&tx, &orders, None));
    let inner = Box::new(SeqScanExec::new(&tx, &customers, None));
    let mut join = BlockNestedLoopJoinExec::new(outer, inner, Box::new(|o: &Tuple, i: &Tuple| o.get(1) == i.get(0)), 10);
    join.open().unwrap();

    let mut names = Vec::new();
    while let Some(tuple) = join.next().unwrap() {
        let name_field = orders_schema().len() + 1;
        if let Value::Char(name) = tuple.get(name_field) {
            names.push(name.clone());
        }
    }
    join.close().unwrap();
    tx.commit().unwrap();

    names.sort();
    assert_eq!(names, vec!["alice".to_string(), "alice".to_string(), "bob".to_string()]);
}
