use std::fs;

use log::info;
use sqlparser::ast::{
    Assignment, BinaryOperator, ColumnOption, DataType, Expr, FunctionArg, FunctionArgExpr, ObjectName, ObjectType,
    OrderByExpr, Query, SelectItem, SetExpr, Statement, TableFactor, Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::{
    btree::table::BTreeTable,
    catalog::{IndexInfo, TableInfo},
    database::Database,
    error::DbError,
    executor::{
        aggregate::{AggregateExec, AggregateOp},
        delete::DeleteExec,
        index_scan::{IndexScanExec, IndexScanMode},
        insert::InsertExec,
        load::LoadExec,
        seq_scan::SeqScanExec,
        sort::{SortDirection, SortExec},
        update::UpdateExec,
        Executor, RowSource,
    },
    predicate::{Clause, Op, Predicate},
    storage::{Column, Schema, Tuple, Type, Value},
    transaction::{LockKey, LockMode, Transaction},
    types::DbResult,
};

use super::session::QueryResult;

/// Direct AST-to-operator-tree translation: every statement form maps
/// to a small, fixed shape of operators below. There is no cost-based
/// planner here — a WHERE clause becomes a conjunction of pushed-down
/// clauses, at most one of which (the one touching a declared index's
/// key columns) is used to pick the scan strategy; the rest are
/// rechecked per row.
pub fn handle_sql(tx: &Transaction, sql: &str) -> DbResult<QueryResult> {
    info!("query: {}", sql);

    let trimmed = sql.trim();
    if let Some(rest) = strip_prefix_ci(trimmed, "LOAD ") {
        return handle_load(tx, rest);
    }
    if strip_prefix_ci(trimmed, "SHOW TABLES").is_some() {
        return handle_show_tables();
    }
    if let Some(rest) = strip_prefix_ci(trimmed, "SHOW INDEX FROM ").or_else(|| strip_prefix_ci(trimmed, "SHOW INDEXES FROM ")) {
        return handle_show_index(rest);
    }
    if let Some(rest) = strip_prefix_ci(trimmed, "DESC ").or_else(|| strip_prefix_ci(trimmed, "DESCRIBE ")) {
        return handle_describe(rest);
    }

    let dialect = GenericDialect {};
    let ast = Parser::parse_sql(&dialect, sql).map_err(|e| DbError::Corruption(e.to_string()))?;
    let statement = ast.into_iter().next().ok_or_else(|| DbError::Corruption("empty statement".into()))?;

    match statement {
        Statement::CreateTable { name, columns, .. } => handle_create_table(name, columns),
        Statement::CreateIndex { name, table_name, columns, unique, .. } => {
            handle_create_index(tx, name, table_name, columns, unique)
        }
        Statement::Drop { object_type, names, .. } => handle_drop(tx, object_type, names),
        Statement::Insert { table_name, source, .. } => handle_insert(tx, table_name, *source),
        Statement::Query(query) => handle_query(tx, *query),
        Statement::Update { table, assignments, selection, .. } => {
            let name = table_name_of(&table)?;
            handle_update(tx, name, assignments, selection)
        }
        Statement::Delete { from, selection, .. } => {
            let name = table_name_of(from.first().ok_or_else(|| DbError::Corruption("DELETE with no table".into()))?)?;
            handle_delete(tx, name, selection)
        }
        other => Err(DbError::Corruption(format!("unsupported statement: {}", other))),
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(s[prefix.len()..].trim())
    } else {
        None
    }
}

fn table_name_of(twj: &sqlparser::ast::TableWithJoins) -> DbResult<String> {
    match &twj.relation {
        TableFactor::Table { name, .. } => Ok(name.to_string()),
        other => Err(DbError::Corruption(format!("unsupported table reference: {}", other))),
    }
}

fn string_column(name: &str) -> Column {
    Column::new(name, Type::Char(128), false)
}

// --- CREATE TABLE ---

fn sql_type_to_type(dt: &DataType) -> DbResult<Type> {
    match dt {
        DataType::Int(_) | DataType::Integer(_) => Ok(Type::Int32),
        DataType::BigInt(_) => Ok(Type::BigInt64),
        DataType::Float(_) | DataType::Double | DataType::Real => Ok(Type::Float32),
        DataType::Varchar(len) | DataType::Char(len) => {
            let n = len.as_ref().map(|l| l.length as u16).unwrap_or(64);
            Ok(Type::Char(n))
        }
        DataType::Datetime(_) | DataType::Timestamp(_, _) => Ok(Type::DateTime64),
        other => Err(DbError::Corruption(format!("unsupported column type: {}", other))),
    }
}

fn handle_create_table(name: ObjectName, columns: Vec<sqlparser::ast::ColumnDef>) -> DbResult<QueryResult> {
    let table_name = name.to_string();
    let mut schema_columns = Vec::new();
    let mut key_columns = Vec::new();

    for (i, col) in columns.iter().enumerate() {
        let is_key = col.options.iter().any(|o| matches!(o.option, ColumnOption::Unique { is_primary: true }));
        if is_key {
            key_columns.push(i);
        }
        let col_type = sql_type_to_type(&col.data_type)?;
        schema_columns.push(Column::new(&col.name.value, col_type, is_key));
    }

    if key_columns.is_empty() {
        key_columns.push(0);
    }

    let schema = Schema::new(schema_columns);
    Database::mut_catalog().create_table(&table_name, schema, key_columns)?;
    Ok(QueryResult { schema: Schema::default(), rows: Vec::new() })
}

// --- CREATE INDEX / DROP ---

/// Declares the index, then backfills it by scanning the table's
/// current rows and inserting one entry per row. There is no online
/// index build here: the caller already holds whatever lock this
/// statement's transaction acquires below for the duration of the scan.
fn handle_create_index(
    tx: &Transaction,
    name: Option<ObjectName>,
    table_name: ObjectName,
    columns: Vec<OrderByExpr>,
    unique: bool,
) -> DbResult<QueryResult> {
    if !unique {
        // every index this engine stores is a unique B+-tree keyed on
        // its declared columns; a non-unique index would need a
        // tie-breaker (the rid) folded into the key, which isn't
        // implemented, so reject rather than silently enforce uniqueness
        // the statement didn't ask for.
        return Err(DbError::Corruption("only UNIQUE indexes are supported".into()));
    }

    let table = table_name.to_string();
    let info = lookup_table(&table)?;
    let index_name = name.map(|n| n.to_string()).unwrap_or_else(|| format!("{}_{}_idx", table, columns.len()));

    let key_columns = columns
        .iter()
        .map(|o| match &o.expr {
            Expr::Identifier(ident) => info.schema.field_pos(&ident.value).ok_or_else(|| DbError::not_found(ident.value.clone())),
            other => Err(DbError::Corruption(format!("unsupported index column: {}", other))),
        })
        .collect::<DbResult<Vec<usize>>>()?;

    let index = Database::mut_catalog().create_index(&table, &index_name, key_columns.clone())?;
    populate_index(tx, &info, &index)?;

    Ok(QueryResult { schema: Schema::default(), rows: Vec::new() })
}

fn populate_index(tx: &Transaction, info: &TableInfo, index: &IndexInfo) -> DbResult<()> {
    Database::mut_lock_manager().acquire(tx, LockKey::Table(info.id), LockMode::IS)?;
    let btree = BTreeTable::new(index.id, index.key_schema(&info.schema));
    let mut scan = SeqScanExec::new(tx, info, None);
    scan.open()?;
    while let Some((rid, tuple)) = scan.next_row()? {
        let key = tuple.composite_key(&info.schema, &index.key_columns);
        btree.insert_entry(tx, key, rid)?;
    }
    scan.close()
}

fn handle_drop(tx: &Transaction, object_type: ObjectType, names: Vec<ObjectName>) -> DbResult<QueryResult> {
    for name in names {
        let name = name.to_string();
        match object_type {
            ObjectType::Table => {
                let table_id = Database::catalog().table_id(&name).ok_or_else(|| DbError::not_found(format!("table {}", name)))?;
                Database::mut_lock_manager().acquire(tx, LockKey::Table(table_id), LockMode::X)?;
                let info = Database::mut_catalog().drop_table(&name)?;
                Database::mut_buffer_pool().discard_heap_file(info.id)?;
                for idx in &info.indexes {
                    Database::mut_buffer_pool().discard_btree_file(idx.id)?;
                }
            }
            ObjectType::Index => {
                let index = Database::mut_catalog().drop_index_by_name(&name)?;
                Database::mut_buffer_pool().discard_btree_file(index.id)?;
            }
            other => return Err(DbError::Corruption(format!("unsupported DROP target: {:?}", other))),
        }
    }
    Ok(QueryResult { schema: Schema::default(), rows: Vec::new() })
}

// --- SHOW / DESC ---

fn handle_show_tables() -> DbResult<QueryResult> {
    let mut names = Database::catalog().table_names();
    names.sort();
    let rows = names.into_iter().map(|n| Tuple::new(vec![Value::Char(n)])).collect();
    Ok(QueryResult { schema: Schema::new(vec![string_column("table_name")]), rows })
}

fn handle_show_index(rest: &str) -> DbResult<QueryResult> {
    let table_name = rest.trim_end_matches(';').trim();
    let info = lookup_table(table_name)?;
    let rows = info
        .indexes
        .iter()
        .map(|idx| {
            let columns = idx.key_columns.iter().map(|&c| info.schema.columns[c].name.clone()).collect::<Vec<_>>().join(",");
            Tuple::new(vec![Value::Char(idx.name.clone()), Value::Char(columns)])
        })
        .collect();
    Ok(QueryResult { schema: Schema::new(vec![string_column("index_name"), string_column("columns")]), rows })
}

fn handle_describe(rest: &str) -> DbResult<QueryResult> {
    let table_name = rest.trim_end_matches(';').trim();
    let info = lookup_table(table_name)?;
    let rows = info
        .schema
        .columns
        .iter()
        .map(|c| Tuple::new(vec![Value::Char(c.name.clone()), Value::Char(format!("{:?}", c.col_type)), Value::Char(c.indexed.to_string())]))
        .collect();
    Ok(QueryResult { schema: Schema::new(vec![string_column("column"), string_column("type"), string_column("indexed")]), rows })
}

// --- literal -> Value ---

fn sql_value_to_value(v: &SqlValue, col_type: &Type) -> DbResult<Value> {
    match (v, col_type) {
        (SqlValue::Number(n, _), Type::Int32) => {
            n.parse::<i32>().map(Value::Int32).map_err(|e| DbError::TypeOverflow(e.to_string()))
        }
        (SqlValue::Number(n, _), Type::BigInt64) => {
            n.parse::<i64>().map(Value::BigInt64).map_err(|e| DbError::TypeOverflow(e.to_string()))
        }
        (SqlValue::Number(n, _), Type::Float32) => {
            n.parse::<f32>().map(Value::Float32).map_err(|e| DbError::TypeOverflow(e.to_string()))
        }
        (SqlValue::SingleQuotedString(s), Type::Char(_)) => Ok(Value::Char(s.clone())),
        (SqlValue::Null, _) => Ok(Value::Null),
        _ => Err(DbError::IncompatibleType(format!("{:?} is not a {:?}", v, col_type))),
    }
}

fn expr_to_value(expr: &Expr, col_type: &Type) -> DbResult<Value> {
    match expr {
        Expr::Value(v) => sql_value_to_value(v, col_type),
        Expr::UnaryOp { op: sqlparser::ast::UnaryOperator::Minus, expr } => match expr.as_ref() {
            Expr::Value(SqlValue::Number(n, _)) => {
                let negated = format!("-{}", n);
                sql_value_to_value(&SqlValue::Number(negated, false), col_type)
            }
            other => Err(DbError::IncompatibleType(format!("unsupported literal: {}", other))),
        },
        other => Err(DbError::IncompatibleType(format!("unsupported literal: {}", other))),
    }
}

// --- INSERT ---

fn handle_insert(tx: &Transaction, table_name: ObjectName, source: Query) -> DbResult<QueryResult> {
    let name = table_name.to_string();
    let info = lookup_table(&name)?;

    let rows = match *source.body {
        SetExpr::Values(values) => values
            .rows
            .iter()
            .map(|row| {
                let vals: DbResult<Vec<Value>> = row
                    .iter()
                    .zip(info.schema.columns.iter())
                    .map(|(e, c)| expr_to_value(e, &c.col_type))
                    .collect();
                vals.map(Tuple::new)
            })
            .collect::<DbResult<Vec<_>>>()?,
        other => return Err(DbError::Corruption(format!("unsupported INSERT source: {:?}", other))),
    };

    let mut exec = InsertExec::new(tx, info, rows);
    run_to_completion(&mut exec)
}

// --- SELECT ---

fn lookup_table(name: &str) -> DbResult<TableInfo> {
    Database::catalog().table_by_name(name).cloned().ok_or_else(|| DbError::not_found(format!("table {}", name)))
}

/// Flattens an `AND`-chained WHERE clause into a conjunction of atomic
/// `column <op> literal` tests; OR, subqueries, and column-to-column
/// comparisons are out of scope for this planner.
fn selection_to_predicate(selection: &Option<Expr>, info: &TableInfo) -> DbResult<Option<Predicate>> {
    let expr = match selection {
        Some(e) => e,
        None => return Ok(None),
    };
    let mut leaves = Vec::new();
    flatten_and(expr, &mut leaves);
    let clauses = leaves.into_iter().map(|e| expr_to_clause(e, info)).collect::<DbResult<Vec<_>>>()?;
    Ok(Some(Predicate::conjunction(clauses)))
}

fn flatten_and<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match expr {
        Expr::BinaryOp { left, op: BinaryOperator::And, right } => {
            flatten_and(left, out);
            flatten_and(right, out);
        }
        other => out.push(other),
    }
}

fn expr_to_clause(expr: &Expr, info: &TableInfo) -> DbResult<Clause> {
    match expr {
        Expr::BinaryOp { left, op, right } => {
            let (ident_expr, lit_expr, flipped) = match (left.as_ref(), right.as_ref()) {
                (Expr::Identifier(_), _) => (left.as_ref(), right.as_ref(), false),
                (_, Expr::Identifier(_)) => (right.as_ref(), left.as_ref(), true),
                _ => return Err(DbError::Corruption("WHERE clause must compare a column to a literal".into())),
            };
            let field_name = match ident_expr {
                Expr::Identifier(ident) => ident.value.clone(),
                _ => unreachable!(),
            };
            let field_index = info.schema.field_pos(&field_name).ok_or_else(|| DbError::not_found(field_name.clone()))?;
            let col_type = info.schema.columns[field_index].col_type;
            let value = expr_to_value(lit_expr, &col_type)?;
            let op = binary_op_to_op(op, flipped)?;
            Ok(Clause::new(field_index, op, value))
        }
        other => Err(DbError::Corruption(format!("unsupported WHERE clause: {}", other))),
    }
}

fn binary_op_to_op(op: &BinaryOperator, flipped: bool) -> DbResult<Op> {
    let op = match op {
        BinaryOperator::Eq => Op::Equals,
        BinaryOperator::NotEq => Op::NotEquals,
        BinaryOperator::Gt => if flipped { Op::LessThan } else { Op::GreaterThan },
        BinaryOperator::GtEq => if flipped { Op::LessThanOrEq } else { Op::GreaterThanOrEq },
        BinaryOperator::Lt => if flipped { Op::GreaterThan } else { Op::LessThan },
        BinaryOperator::LtEq => if flipped { Op::GreaterThanOrEq } else { Op::LessThanOrEq },
        other => return Err(DbError::Corruption(format!("unsupported operator: {:?}", other))),
    };
    Ok(op)
}

fn aggregate_call(items: &[SelectItem], info: &TableInfo) -> DbResult<Option<(AggregateOp, usize)>> {
    if items.len() != 1 {
        return Ok(None);
    }
    let expr = match &items[0] {
        SelectItem::UnnamedExpr(e) | SelectItem::ExprWithAlias { expr: e, .. } => e,
        _ => return Ok(None),
    };
    let func = match expr {
        Expr::Function(f) => f,
        _ => return Ok(None),
    };
    let op = match func.name.to_string().to_uppercase().as_str() {
        "COUNT" => AggregateOp::Count,
        "SUM" => AggregateOp::Sum,
        "MAX" => AggregateOp::Max,
        "MIN" => AggregateOp::Min,
        _ => return Ok(None),
    };
    let field = match func.args.first() {
        Some(FunctionArg::Unnamed(FunctionArgExpr::Expr(Expr::Identifier(ident)))) => {
            info.schema.field_pos(&ident.value).ok_or_else(|| DbError::not_found(ident.value.clone()))?
        }
        Some(FunctionArg::Unnamed(FunctionArgExpr::Wildcard)) | None => 0,
        other => return Err(DbError::Corruption(format!("unsupported aggregate argument: {:?}", other))),
    };
    Ok(Some((op, field)))
}

fn handle_query(tx: &Transaction, query: Query) -> DbResult<QueryResult> {
    let select = match *query.body {
        SetExpr::Select(s) => *s,
        other => return Err(DbError::Corruption(format!("unsupported query body: {:?}", other))),
    };

    let table_ref = select.from.first().ok_or_else(|| DbError::Corruption("SELECT with no FROM".into()))?;
    let table_name = table_name_of(table_ref)?;
    let info = lookup_table(&table_name)?;
    let predicate = selection_to_predicate(&select.selection, &info)?;

    let scan = build_scan(tx, &info, predicate)?;

    if let Some((op, field)) = aggregate_call(&select.projection, &info)? {
        let mut exec = AggregateExec::new(scan, op, field);
        return run_to_completion(&mut exec);
    }

    let plan = apply_order_and_limit(scan, &query.order_by, &query.limit)?;
    run_to_completion_boxed(plan)
}

/// Picks the declared index (if any) whose leading key column has an
/// equality or range clause in `predicate`, or whose key has an
/// equality clause on a non-leading column (the mode-one case). The
/// full predicate is still handed to the scan as a post-fetch filter,
/// so a clause used to pick the access path is simply rechecked
/// redundantly rather than needing to be excluded.
fn plan_index_access<'i>(info: &'i TableInfo, predicate: &Predicate) -> Option<(&'i IndexInfo, IndexScanMode)> {
    for idx in &info.indexes {
        let leading = *idx.key_columns.first()?;

        if let Some(c) = predicate.clauses.iter().find(|c| c.field_index == leading && c.op == Op::Equals) {
            return Some((idx, IndexScanMode::Equal(vec![c.value.clone()])));
        }

        let lower = predicate
            .clauses
            .iter()
            .find(|c| c.field_index == leading && matches!(c.op, Op::GreaterThan | Op::GreaterThanOrEq))
            .map(|c| vec![c.value.clone()]);
        let upper = predicate
            .clauses
            .iter()
            .find(|c| c.field_index == leading && matches!(c.op, Op::LessThan | Op::LessThanOrEq))
            .map(|c| vec![c.value.clone()]);
        if lower.is_some() || upper.is_some() {
            return Some((idx, IndexScanMode::Range { lower, upper }));
        }

        let fixed: Vec<(usize, Value)> = idx
            .key_columns
            .iter()
            .enumerate()
            .filter_map(|(pos, &field)| {
                predicate.clauses.iter().find(|c| c.field_index == field && c.op == Op::Equals).map(|c| (pos, c.value.clone()))
            })
            .collect();
        if !fixed.is_empty() {
            return Some((idx, IndexScanMode::ModeOne { fixed }));
        }
    }
    None
}

fn build_scan(tx: &Transaction, info: &TableInfo, predicate: Option<Predicate>) -> DbResult<Box<dyn Executor>> {
    if let Some(p) = &predicate {
        if let Some((idx, mode)) = plan_index_access(info, p) {
            let key_schema = idx.key_schema(&info.schema);
            let table = Box::leak(Box::new(BTreeTable::new(idx.id, key_schema)));
            let exec = IndexScanExec::new(tx, table, info, mode, predicate.clone());
            return Ok(Box::new(exec));
        }
    }
    Ok(Box::new(SeqScanExec::new(tx, info, predicate)))
}

fn apply_order_and_limit(
    plan: Box<dyn Executor>,
    order_by: &[OrderByExpr],
    limit: &Option<Expr>,
) -> DbResult<Box<dyn Executor>> {
    if order_by.is_empty() && limit.is_none() {
        return Ok(plan);
    }
    let schema = plan.schema().clone();
    let keys = if order_by.is_empty() {
        vec![(0usize, SortDirection::Asc)]
    } else {
        order_by
            .iter()
            .map(|o| {
                let field = match &o.expr {
                    Expr::Identifier(ident) => schema.field_pos(&ident.value).ok_or_else(|| DbError::not_found(ident.value.clone())),
                    other => Err(DbError::Corruption(format!("unsupported ORDER BY expression: {}", other))),
                }?;
                let dir = if o.asc.unwrap_or(true) { SortDirection::Asc } else { SortDirection::Desc };
                Ok((field, dir))
            })
            .collect::<DbResult<Vec<_>>>()?
    };
    let limit = match limit {
        Some(Expr::Value(SqlValue::Number(n, _))) => Some(n.parse::<usize>().map_err(|e| DbError::TypeOverflow(e.to_string()))?),
        Some(other) => return Err(DbError::Corruption(format!("unsupported LIMIT expression: {}", other))),
        None => None,
    };
    Ok(Box::new(SortExec::new(plan, keys, limit)))
}

// --- UPDATE / DELETE ---

fn handle_update(tx: &Transaction, name: String, assignments: Vec<Assignment>, selection: Option<Expr>) -> DbResult<QueryResult> {
    let info = lookup_table(&name)?;
    let predicate = selection_to_predicate(&selection, &info)?;
    let source = build_row_source(tx, &info, predicate)?;

    let assignments = assignments
        .into_iter()
        .map(|a| {
            let field_name = a.id.last().map(|i| i.value.clone()).ok_or_else(|| DbError::Corruption("empty assignment target".into()))?;
            let field = info.schema.field_pos(&field_name).ok_or_else(|| DbError::not_found(field_name))?;
            let col_type = info.schema.columns[field].col_type;
            let value = expr_to_value(&a.value, &col_type)?;
            Ok((field, value))
        })
        .collect::<DbResult<Vec<_>>>()?;

    let mut exec = UpdateExec::new(tx, info, source, assignments);
    run_to_completion(&mut exec)
}

fn handle_delete(tx: &Transaction, name: String, selection: Option<Expr>) -> DbResult<QueryResult> {
    let info = lookup_table(&name)?;
    let predicate = selection_to_predicate(&selection, &info)?;
    let source = build_row_source(tx, &info, predicate)?;
    let mut exec = DeleteExec::new(tx, info, source);
    run_to_completion(&mut exec)
}

fn build_row_source<'a>(tx: &'a Transaction, info: &TableInfo, predicate: Option<Predicate>) -> DbResult<RowSource<'a>> {
    if let Some(p) = &predicate {
        if let Some((idx, mode)) = plan_index_access(info, p) {
            let key_schema = idx.key_schema(&info.schema);
            let table = Box::leak(Box::new(BTreeTable::new(idx.id, key_schema)));
            let exec = IndexScanExec::new(tx, table, info, mode, predicate.clone());
            return Ok(RowSource::Index(exec));
        }
    }
    Ok(RowSource::Seq(SeqScanExec::new(tx, info, predicate)))
}

// --- LOAD ---

fn handle_load(tx: &Transaction, rest: &str) -> DbResult<QueryResult> {
    let mut parts = rest.splitn(3, char::is_whitespace);
    let path = parts.next().ok_or_else(|| DbError::Corruption("LOAD: missing file path".into()))?;
    let into = parts.find(|s| !s.is_empty()).ok_or_else(|| DbError::Corruption("LOAD: missing INTO clause".into()))?;
    if !into.eq_ignore_ascii_case("into") {
        return Err(DbError::Corruption("LOAD <file> INTO <table> expected".into()));
    }
    let table_name = rest
        .rsplit(char::is_whitespace)
        .next()
        .ok_or_else(|| DbError::Corruption("LOAD: missing table name".into()))?
        .trim_end_matches(';');

    let info = lookup_table(table_name)?;
    let content = fs::read_to_string(path)?;
    let rows = content
        .lines()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split(',').collect();
            let values: DbResult<Vec<Value>> = info
                .schema
                .columns
                .iter()
                .zip(fields.iter())
                .map(|(col, token)| parse_csv_field(token.trim(), &col.col_type))
                .collect();
            values.map(Tuple::new)
        })
        .collect::<DbResult<Vec<_>>>()?;

    let mut exec = LoadExec::new(tx, info, rows);
    run_to_completion(&mut exec)
}

fn parse_csv_field(token: &str, col_type: &Type) -> DbResult<Value> {
    match col_type {
        Type::Int32 => token.parse::<i32>().map(Value::Int32).map_err(|e| DbError::TypeOverflow(e.to_string())),
        Type::BigInt64 => token.parse::<i64>().map(Value::BigInt64).map_err(|e| DbError::TypeOverflow(e.to_string())),
        Type::Float32 => token.parse::<f32>().map(Value::Float32).map_err(|e| DbError::TypeOverflow(e.to_string())),
        Type::Char(_) => Ok(Value::Char(token.to_string())),
        Type::DateTime64 => token.parse::<u64>().map(Value::DateTime64).map_err(|e| DbError::TypeOverflow(e.to_string())),
    }
}

// --- common driver ---

fn run_to_completion_boxed(mut exec: Box<dyn Executor>) -> DbResult<QueryResult> {
    run_to_completion(exec.as_mut())
}

fn run_to_completion(exec: &mut dyn Executor) -> DbResult<QueryResult> {
    exec.open()?;
    let mut rows = Vec::new();
    while let Some(tuple) = exec.next()? {
        rows.push(tuple);
    }
    exec.close()?;
    Ok(QueryResult { schema: exec.schema().clone(), rows })
}
