use std::fmt;

use crate::storage::{schema::Schema, value::Value};

/// Record identifier: page-number and slot-number locating a row in a
/// heap file. `NO_PAGE` / `-1` mark the end of a scan.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Rid {
    pub page_no: u32,
    pub slot_no: u32,
}

impl Rid {
    pub fn new(page_no: u32, slot_no: u32) -> Self {
        Self { page_no, slot_no }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.page_no, self.slot_no)
    }
}

/// A row of typed values, decoded against a `Schema`.
#[derive(Debug, Clone)]
pub struct Tuple {
    values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn from_bytes(schema: &Schema, bytes: &[u8]) -> Self {
        let mut values = Vec::with_capacity(schema.len());
        for col in &schema.columns {
            let slice = &bytes[col.offset..col.offset + col.col_type.size()];
            values.push(Value::decode_fixed(&col.col_type, slice));
        }
        Self { values }
    }

    pub fn to_bytes(&self, schema: &Schema) -> Vec<u8> {
        let mut buf = vec![0u8; schema.record_size()];
        for (value, col) in self.values.iter().zip(schema.columns.iter()) {
            let encoded = value.encode_fixed(&col.col_type);
            buf[col.offset..col.offset + col.col_type.size()].copy_from_slice(&encoded);
        }
        buf
    }

    pub fn get(&self, i: usize) -> &Value {
        &self.values[i]
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The composite key for an ordered set of indexed columns: the
    /// byte-concatenation of their raw encodings, compared column-wise.
    pub fn composite_key(&self, schema: &Schema, key_columns: &[usize]) -> Vec<Value> {
        key_columns.iter().map(|&i| self.values[i].clone()).collect()
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}
