use crate::storage::{Schema, Tuple, Value};

/// A composite key: one `Value` per indexed column, in declared order.
/// `Vec<Value>`'s derived `PartialOrd` already compares element-wise,
/// which is exactly the column-wise composite-key comparison the index
/// requires.
pub type Key = Vec<Value>;

pub fn encode_key(key_schema: &Schema, key: &Key) -> Vec<u8> {
    Tuple::new(key.clone()).to_bytes(key_schema)
}

pub fn decode_key(key_schema: &Schema, bytes: &[u8]) -> Key {
    Tuple::from_bytes(key_schema, bytes).values().to_vec()
}
