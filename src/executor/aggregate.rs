use crate::{
    storage::{Column, Schema, Tuple, Type, Value},
    types::DbResult,
};

use super::Executor;

#[derive(Clone, Copy, Debug)]
pub enum AggregateOp {
    Count,
    Sum,
    Max,
    Min,
}

/// Whole-input aggregation, no GROUP BY: one row in, one row out. Runs
/// entirely at `open`, same as `SortExec`, since the result can't be
/// known until every input row has been seen.
pub struct AggregateExec {
    child: Box<dyn Executor>,
    op: AggregateOp,
    field: usize,
    schema: Schema,
    result: Option<Tuple>,
    emitted: bool,
}

impl AggregateExec {
    pub fn new(child: Box<dyn Executor>, op: AggregateOp, field: usize) -> Self {
        let name = match op {
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
            AggregateOp::Max => "max",
            AggregateOp::Min => "min",
        };
        let source_type = child.schema().columns[field].col_type;
        let col_type = match op {
            AggregateOp::Count => Type::BigInt64,
            // `add` always widens Int32/BigInt64 sums to BigInt64 and
            // keeps Float32 sums in Float32, so the declared output
            // type has to track that instead of the source column's.
            AggregateOp::Sum => if source_type == Type::Float32 { Type::Float32 } else { Type::BigInt64 },
            AggregateOp::Max | AggregateOp::Min => source_type,
        };
        let schema = Schema::new(vec![Column::new(name, col_type, false)]);
        Self { child, op, field, schema, result: None, emitted: false }
    }

    fn fold(&self, values: &[Value]) -> Value {
        match self.op {
            AggregateOp::Count => Value::BigInt64(values.len() as i64),
            AggregateOp::Sum => values.iter().fold(Value::BigInt64(0), |acc, v| add(&acc, v)),
            AggregateOp::Max => values.iter().cloned().reduce(|a, b| if b > a { b } else { a }).unwrap_or(Value::Null),
            AggregateOp::Min => values.iter().cloned().reduce(|a, b| if b < a { b } else { a }).unwrap_or(Value::Null),
        }
    }
}

fn add(acc: &Value, v: &Value) -> Value {
    match (acc, v) {
        (Value::BigInt64(a), Value::Int32(b)) => Value::BigInt64(a + *b as i64),
        (Value::BigInt64(a), Value::BigInt64(b)) => Value::BigInt64(a + b),
        (Value::BigInt64(a), Value::Float32(b)) => Value::Float32(*a as f32 + b),
        (Value::Float32(a), Value::Int32(b)) => Value::Float32(a + *b as f32),
        (Value::Float32(a), Value::Float32(b)) => Value::Float32(a + b),
        (Value::Float32(a), Value::BigInt64(b)) => Value::Float32(a + *b as f32),
        _ => acc.clone(),
    }
}

impl Executor for AggregateExec {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        let mut values = Vec::new();
        while let Some(tuple) = self.child.next()? {
            values.push(tuple.get(self.field).clone());
        }
        self.child.close()?;
        self.result = Some(Tuple::new(vec![self.fold(&values)]));
        self.emitted = false;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if self.emitted {
            return Ok(None);
        }
        self.emitted = true;
        Ok(self.result.clone())
    }

    fn close(&mut self) -> DbResult<()> {
        self.result = None;
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
