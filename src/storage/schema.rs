use std::fmt;

use crate::{
    io::{Decodeable, Encodeable},
    storage::value::Type,
};

/// One declared column: name, type, its offset within the fixed-width
/// record layout, and whether it participates in the table's key index.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub col_type: Type,
    pub offset: usize,
    pub indexed: bool,
}

impl Column {
    pub fn new(name: &str, col_type: Type, indexed: bool) -> Self {
        Self {
            name: name.to_string(),
            col_type,
            offset: 0,
            indexed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(mut columns: Vec<Column>) -> Self {
        let mut offset = 0;
        for c in columns.iter_mut() {
            c.offset = offset;
            offset += c.col_type.size();
        }
        Self { columns }
    }

    pub fn record_size(&self) -> usize {
        self.columns.iter().map(|c| c.col_type.size()).sum()
    }

    pub fn field_pos(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn indexed_columns(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.indexed)
            .map(|(i, _)| i)
            .collect()
    }
}

impl Encodeable for Column {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.name.encode());
        buf.extend_from_slice(&self.col_type.encode());
        buf.extend_from_slice(&self.indexed.encode());
        buf
    }
}

impl Decodeable for Column {
    fn decode_from<R: std::io::Read>(reader: &mut R) -> Self {
        let name = String::decode_from(reader);
        let col_type = Type::decode_from(reader);
        let indexed = bool::decode_from(reader);
        Column::new(&name, col_type, indexed)
    }
}

impl Encodeable for Schema {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.columns.len() as u32).encode());
        for c in &self.columns {
            buf.extend_from_slice(&c.encode());
        }
        buf
    }
}

impl Decodeable for Schema {
    fn decode_from<R: std::io::Read>(reader: &mut R) -> Self {
        let count = u32::decode_from(reader);
        let columns = (0..count).map(|_| Column::decode_from(reader)).collect();
        Schema::new(columns)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        write!(f, "({})", names.join(", "))
    }
}
