use std::io::Read;

use crate::{
    io::{read_exact, Decodeable, Encodeable},
    storage::Rid,
};

pub const INVALID_LSN: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRecordKind {
    Begin,
    Commit,
    Abort,
    Insert,
    Delete,
    Update,
    CreateTable,
}

impl LogRecordKind {
    fn tag(&self) -> u32 {
        match self {
            LogRecordKind::Begin => 0,
            LogRecordKind::Commit => 1,
            LogRecordKind::Abort => 2,
            LogRecordKind::Insert => 3,
            LogRecordKind::Delete => 4,
            LogRecordKind::Update => 5,
            LogRecordKind::CreateTable => 6,
        }
    }

    fn from_tag(tag: u32) -> Self {
        match tag {
            0 => LogRecordKind::Begin,
            1 => LogRecordKind::Commit,
            2 => LogRecordKind::Abort,
            3 => LogRecordKind::Insert,
            4 => LogRecordKind::Delete,
            5 => LogRecordKind::Update,
            6 => LogRecordKind::CreateTable,
            _ => panic!("unknown log record kind tag {}", tag),
        }
    }
}

#[derive(Debug, Clone)]
pub enum LogPayload {
    Begin,
    Commit,
    Abort,
    /// table-name, rid, record bytes
    Insert { table_id: u32, rid: Rid, record: Vec<u8> },
    /// table-name, rid, record bytes (the image removed, needed to undo)
    Delete { table_id: u32, rid: Rid, record: Vec<u8> },
    /// table-name, rid, before-image, after-image
    Update { table_id: u32, rid: Rid, before: Vec<u8>, after: Vec<u8> },
    CreateTable { table_id: u32, schema_bytes: Vec<u8> },
}

/// One entry in the append-only WAL stream. Common header: total
/// length, kind, lsn, txn-id, prev-lsn-of-this-txn, then a
/// kind-specific payload.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub lsn: i64,
    pub txn_id: i64,
    pub prev_lsn: i64,
    pub payload: LogPayload,
}

impl LogRecord {
    pub fn kind(&self) -> LogRecordKind {
        match &self.payload {
            LogPayload::Begin => LogRecordKind::Begin,
            LogPayload::Commit => LogRecordKind::Commit,
            LogPayload::Abort => LogRecordKind::Abort,
            LogPayload::Insert { .. } => LogRecordKind::Insert,
            LogPayload::Delete { .. } => LogRecordKind::Delete,
            LogPayload::Update { .. } => LogRecordKind::Update,
            LogPayload::CreateTable { .. } => LogRecordKind::CreateTable,
        }
    }
}

impl Encodeable for LogRecord {
    fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.kind().tag().encode());
        body.extend_from_slice(&self.lsn.encode());
        body.extend_from_slice(&self.txn_id.encode());
        body.extend_from_slice(&self.prev_lsn.encode());

        match &self.payload {
            LogPayload::Begin | LogPayload::Commit | LogPayload::Abort => {}
            LogPayload::Insert { table_id, rid, record } => {
                body.extend_from_slice(&table_id.encode());
                body.extend_from_slice(&rid.page_no.encode());
                body.extend_from_slice(&rid.slot_no.encode());
                body.extend_from_slice(&record.encode());
            }
            LogPayload::Delete { table_id, rid, record } => {
                body.extend_from_slice(&table_id.encode());
                body.extend_from_slice(&rid.page_no.encode());
                body.extend_from_slice(&rid.slot_no.encode());
                body.extend_from_slice(&record.encode());
            }
            LogPayload::Update { table_id, rid, before, after } => {
                body.extend_from_slice(&table_id.encode());
                body.extend_from_slice(&rid.page_no.encode());
                body.extend_from_slice(&rid.slot_no.encode());
                body.extend_from_slice(&before.encode());
                body.extend_from_slice(&after.encode());
            }
            LogPayload::CreateTable { table_id, schema_bytes } => {
                body.extend_from_slice(&table_id.encode());
                body.extend_from_slice(&schema_bytes.encode());
            }
        }

        let mut out = Vec::with_capacity(body.len() + 4);
        out.extend_from_slice(&(body.len() as u32).encode());
        out.extend_from_slice(&body);
        out
    }
}

impl Decodeable for LogRecord {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let _total_len = u32::decode_from(reader);
        let kind = LogRecordKind::from_tag(u32::decode_from(reader));
        let lsn = i64::decode_from(reader);
        let txn_id = i64::decode_from(reader);
        let prev_lsn = i64::decode_from(reader);

        let payload = match kind {
            LogRecordKind::Begin => LogPayload::Begin,
            LogRecordKind::Commit => LogPayload::Commit,
            LogRecordKind::Abort => LogPayload::Abort,
            LogRecordKind::Insert => {
                let table_id = u32::decode_from(reader);
                let rid = Rid::new(u32::decode_from(reader), u32::decode_from(reader));
                let record = Vec::<u8>::decode_from(reader);
                LogPayload::Insert { table_id, rid, record }
            }
            LogRecordKind::Delete => {
                let table_id = u32::decode_from(reader);
                let rid = Rid::new(u32::decode_from(reader), u32::decode_from(reader));
                let record = Vec::<u8>::decode_from(reader);
                LogPayload::Delete { table_id, rid, record }
            }
            LogRecordKind::Update => {
                let table_id = u32::decode_from(reader);
                let rid = Rid::new(u32::decode_from(reader), u32::decode_from(reader));
                let before = Vec::<u8>::decode_from(reader);
                let after = Vec::<u8>::decode_from(reader);
                LogPayload::Update { table_id, rid, before, after }
            }
            LogRecordKind::CreateTable => {
                let table_id = u32::decode_from(reader);
                let schema_bytes = Vec::<u8>::decode_from(reader);
                LogPayload::CreateTable { table_id, schema_bytes }
            }
        };

        LogRecord { lsn, txn_id, prev_lsn, payload }
    }
}

/// Reads one record plus its total-length prefix, returning the number
/// of bytes consumed so the recovery passes can track file offsets.
pub fn decode_with_len<R: Read>(reader: &mut R) -> (LogRecord, usize) {
    let total_len = u32::decode_from(reader) as usize;
    let body = read_exact(reader, total_len);
    let mut cursor = std::io::Cursor::new(&body[..]);
    let kind = LogRecordKind::from_tag(u32::decode_from(&mut cursor));
    let lsn = i64::decode_from(&mut cursor);
    let txn_id = i64::decode_from(&mut cursor);
    let prev_lsn = i64::decode_from(&mut cursor);

    let payload = match kind {
        LogRecordKind::Begin => LogPayload::Begin,
        LogRecordKind::Commit => LogPayload::Commit,
        LogRecordKind::Abort => LogPayload::Abort,
        LogRecordKind::Insert => {
            let table_id = u32::decode_from(&mut cursor);
            let rid = Rid::new(u32::decode_from(&mut cursor), u32::decode_from(&mut cursor));
            let record = Vec::<u8>::decode_from(&mut cursor);
            LogPayload::Insert { table_id, rid, record }
        }
        LogRecordKind::Delete => {
            let table_id = u32::decode_from(&mut cursor);
            let rid = Rid::new(u32::decode_from(&mut cursor), u32::decode_from(&mut cursor));
            let record = Vec::<u8>::decode_from(&mut cursor);
            LogPayload::Delete { table_id, rid, record }
        }
        LogRecordKind::Update => {
            let table_id = u32::decode_from(&mut cursor);
            let rid = Rid::new(u32::decode_from(&mut cursor), u32::decode_from(&mut cursor));
            let before = Vec::<u8>::decode_from(&mut cursor);
            let after = Vec::<u8>::decode_from(&mut cursor);
            LogPayload::Update { table_id, rid, before, after }
        }
        LogRecordKind::CreateTable => {
            let table_id = u32::decode_from(&mut cursor);
            let schema_bytes = Vec::<u8>::decode_from(&mut cursor);
            LogPayload::CreateTable { table_id, schema_bytes }
        }
    };

    (LogRecord { lsn, txn_id, prev_lsn, payload }, total_len + 4)
}
