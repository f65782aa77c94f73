use std::fmt;

use crate::storage::{Tuple, Value};

/// Comparison operators a scan can push down into its own slot-by-slot
/// filtering. There is no general boolean expression tree here: each
/// clause tests exactly one tuple field against one literal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
}

/// One `field op value` test, the atom a `Predicate` conjoins.
#[derive(Clone)]
pub struct Clause {
    pub field_index: usize,
    pub op: Op,
    pub value: Value,
}

impl Clause {
    pub fn new(field_index: usize, op: Op, value: Value) -> Self {
        Self { field_index, op, value }
    }

    pub fn matches(&self, tuple: &Tuple) -> bool {
        let field = tuple.get(self.field_index);
        match self.op {
            Op::Equals => field == &self.value,
            Op::NotEquals => field != &self.value,
            Op::GreaterThan => field > &self.value,
            Op::GreaterThanOrEq => field >= &self.value,
            Op::LessThan => field < &self.value,
            Op::LessThanOrEq => field <= &self.value,
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "field_index: {}, op: {:?}, value: {}", self.field_index, self.op, self.value)
    }
}

/// A conjunction of clauses, all of which a matching tuple must satisfy.
/// Built from a WHERE clause's `AND`-chained comparisons; a single
/// comparison is just a one-clause conjunction.
#[derive(Clone)]
pub struct Predicate {
    pub clauses: Vec<Clause>,
}

impl Predicate {
    pub fn new(field_index: usize, op: Op, value: Value) -> Self {
        Self { clauses: vec![Clause::new(field_index, op, value)] }
    }

    pub fn conjunction(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }

    pub fn matches(&self, tuple: &Tuple) -> bool {
        self.clauses.iter().all(|c| c.matches(tuple))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self.clauses.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(" AND "))
    }
}
