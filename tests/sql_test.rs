mod common;

use stonebolt::{sql::session::Session, storage::Value};

#[test]
fn create_insert_select_round_trip() {
    common::setup();
    let mut session = Session::new();

    session.execute("CREATE TABLE accounts (id INT PRIMARY KEY, balance INT)").unwrap();
    let result = session.execute("INSERT INTO accounts VALUES (1, 100)").unwrap();
    assert_eq!(result.rows[0].get(0), &Value::BigInt64(1));

    session.execute("INSERT INTO accounts VALUES (2, 250)").unwrap();

    let result = session.execute("SELECT id, balance FROM accounts WHERE id = 2").unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].get(1), &Value::Int32(250));
}

#[test]
fn update_then_delete_via_sql() {
    common::setup();
    let mut session = Session::new();
    session.execute("CREATE TABLE accounts (id INT PRIMARY KEY, balance INT)").unwrap();
    session.execute("INSERT INTO accounts VALUES (1, 100)").unwrap();

    session.execute("UPDATE accounts SET balance = 500 WHERE id = 1").unwrap();
    let result = session.execute("SELECT id, balance FROM accounts WHERE id = 1").unwrap();
    assert_eq!(result.rows[0].get(1), &Value::Int32(500));

    session.execute("DELETE FROM accounts WHERE id = 1").unwrap();
    let result = session.execute("SELECT id, balance FROM accounts WHERE id = 1").unwrap();
    assert!(result.rows.is_empty());
}

#[test]
fn conjunction_where_clause_narrows_results() {
    common::setup();
    let mut session = Session::new();
    session.execute("CREATE TABLE accounts (id INT PRIMARY KEY, balance INT)").unwrap();
    for i in 0..20 {
        session.execute(&format!("INSERT INTO accounts VALUES ({}, {})", i, i * 10)).unwrap();
    }

    let result = session.execute("SELECT id FROM accounts WHERE id >= 5 AND id < 10").unwrap();
    let mut ids: Vec<i64> = result
        .rows
        .iter()
        .map(|t| match t.get(0) {
            Value::Int32(v) => *v as i64,
            other => panic!("unexpected value: {:?}", other),
        })
        .collect();
    ids.sort();
    assert_eq!(ids, vec![5, 6, 7, 8, 9]);
}

#[test]
fn create_index_then_show_and_describe() {
    common::setup();
    let mut session = Session::new();
    session.execute("CREATE TABLE accounts (id INT PRIMARY KEY, email CHAR(16))").unwrap();
    session.execute("INSERT INTO accounts VALUES (1, 'a@x.com')").unwrap();
    session.execute("CREATE UNIQUE INDEX accounts_email_idx ON accounts (email)").unwrap();

    let tables = session.execute("SHOW TABLES").unwrap();
    assert_eq!(tables.rows.len(), 1);
    assert_eq!(tables.rows[0].get(0), &Value::Char("accounts".to_string()));

    let indexes = session.execute("SHOW INDEX FROM accounts").unwrap();
    assert_eq!(indexes.rows.len(), 2);
    let names: Vec<String> = indexes
        .rows
        .iter()
        .map(|t| match t.get(0) {
            Value::Char(s) => s.clone(),
            other => panic!("unexpected value: {:?}", other),
        })
        .collect();
    assert!(names.contains(&"accounts_pkey".to_string()));
    assert!(names.contains(&"accounts_email_idx".to_string()));

    let described = session.execute("DESC accounts").unwrap();
    assert_eq!(described.rows.len(), 2);

    session.execute("DROP INDEX accounts_email_idx").unwrap();
    let indexes = session.execute("SHOW INDEX FROM accounts").unwrap();
    assert_eq!(indexes.rows.len(), 1);

    session.execute("DROP TABLE accounts").unwrap();
    let tables = session.execute("SHOW TABLES").unwrap();
    assert!(tables.rows.is_empty());
}

#[test]
fn bad_statement_aborts_without_poisoning_later_queries() {
    common::setup();
    let mut session = Session::new();
    session.execute("CREATE TABLE accounts (id INT PRIMARY KEY, balance INT)").unwrap();
    assert!(session.execute("SELECT id FROM missing_table").is_err());

    session.execute("INSERT INTO accounts VALUES (1, 10)").unwrap();
    let result = session.execute("SELECT id FROM accounts").unwrap();
    assert_eq!(result.rows.len(), 1);
}
