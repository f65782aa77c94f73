use std::{
    io::{Cursor, SeekFrom},
    sync::atomic::{AtomicI64, Ordering},
};

use log::debug;

use crate::{error::DbError, io::SmallFile, types::VoidResult};

use super::{
    log_record::{decode_with_len, LogPayload, LogRecord, INVALID_LSN},
    TransactionID,
};

/// Append-only write-ahead log. Owns the on-disk log file and the
/// in-memory tail buffer; knows nothing about how to interpret a
/// record's payload during recovery (see `recovery.rs`).
pub struct LogManager {
    file: SmallFile,
    buffer: Vec<u8>,
    buffer_capacity: usize,
    next_lsn: AtomicI64,
    flushed_offset: u64,
    /// lsn of the last record this transaction wrote, for the
    /// per-transaction prev-lsn chain undo walks.
    tx_last_lsn: std::collections::HashMap<TransactionID, i64>,
    /// records written by each still-active transaction, kept around so
    /// an abort can undo them without a disk scan. Cleared on
    /// commit/abort.
    tx_records: std::collections::HashMap<TransactionID, Vec<LogRecord>>,
}

impl LogManager {
    pub fn new(log_path: impl AsRef<std::path::Path>, buffer_capacity: usize) -> Self {
        let mut file = SmallFile::new(log_path);
        let flushed_offset = file.get_size().unwrap_or(0);
        Self {
            file,
            buffer: Vec::with_capacity(buffer_capacity),
            buffer_capacity,
            next_lsn: AtomicI64::new(0),
            flushed_offset,
            tx_last_lsn: std::collections::HashMap::new(),
            tx_records: std::collections::HashMap::new(),
        }
    }

    /// Restores `next_lsn` after analyze has scanned the existing log,
    /// so newly appended records continue the sequence.
    pub fn set_next_lsn(&mut self, next: i64) {
        self.next_lsn.store(next, Ordering::SeqCst);
    }

    pub fn prev_lsn_for(&self, tx: TransactionID) -> i64 {
        self.tx_last_lsn.get(&tx).copied().unwrap_or(INVALID_LSN)
    }

    fn next_lsn(&self) -> i64 {
        self.next_lsn.fetch_add(1, Ordering::SeqCst)
    }

    /// Buffers `payload` as a new record and returns its lsn. Does not
    /// guarantee durability; call `flush` (directly or via `force`)
    /// before acknowledging the operation to the client.
    pub fn append(&mut self, tx: TransactionID, payload: LogPayload) -> DbResultLsn {
        let lsn = self.next_lsn();
        let prev_lsn = self.prev_lsn_for(tx);
        let record = LogRecord { lsn, txn_id: tx as i64, prev_lsn, payload };
        let bytes = crate::io::Encodeable::encode(&record);

        if self.buffer.len() + bytes.len() > self.buffer_capacity {
            self.flush()?;
        }
        self.buffer.extend_from_slice(&bytes);
        self.tx_last_lsn.insert(tx, lsn);
        self.tx_records.entry(tx).or_default().push(record);
        Ok(lsn)
    }

    /// The records this transaction has written so far, in write order.
    /// Used to undo a transaction on abort without a disk scan.
    pub fn tx_records(&self, tx: TransactionID) -> Vec<LogRecord> {
        self.tx_records.get(&tx).cloned().unwrap_or_default()
    }

    fn forget_tx(&mut self, tx: TransactionID) {
        self.tx_records.remove(&tx);
    }

    /// Appends and immediately forces to disk. Used for commit/abort
    /// records, which must be durable before the client is told the
    /// transaction finished.
    pub fn force_append(&mut self, tx: TransactionID, payload: LogPayload) -> DbResultLsn {
        let lsn = self.append(tx, payload)?;
        self.flush()?;
        Ok(lsn)
    }

    /// Writes the buffered tail to disk. The WAL invariant (log record
    /// durable before its page) is enforced by callers that flush the
    /// log before evicting a dirty page, not by this type.
    pub fn flush(&mut self) -> VoidResult {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_bytes(&self.buffer)?;
        self.file.flush()?;
        self.flushed_offset += self.buffer.len() as u64;
        debug!("log manager flushed {} bytes", self.buffer.len());
        self.buffer.clear();
        Ok(())
    }

    pub fn log_begin(&mut self, tx: TransactionID) -> DbResultLsn {
        self.append(tx, LogPayload::Begin)
    }

    pub fn log_commit(&mut self, tx: TransactionID) -> DbResultLsn {
        let lsn = self.force_append(tx, LogPayload::Commit)?;
        self.tx_last_lsn.remove(&tx);
        self.forget_tx(tx);
        Ok(lsn)
    }

    /// Call after the transaction's own operations have already been
    /// undone (see `RecoveryManager::undo_transaction`): this only
    /// appends the durable abort marker and forgets the transaction.
    pub fn log_abort(&mut self, tx: TransactionID) -> DbResultLsn {
        let lsn = self.force_append(tx, LogPayload::Abort)?;
        self.tx_last_lsn.remove(&tx);
        self.forget_tx(tx);
        Ok(lsn)
    }

    pub fn log_insert(&mut self, tx: TransactionID, table_id: u32, rid: crate::storage::Rid, record: Vec<u8>) -> DbResultLsn {
        self.append(tx, LogPayload::Insert { table_id, rid, record })
    }

    pub fn log_delete(&mut self, tx: TransactionID, table_id: u32, rid: crate::storage::Rid, record: Vec<u8>) -> DbResultLsn {
        self.append(tx, LogPayload::Delete { table_id, rid, record })
    }

    pub fn log_update(
        &mut self,
        tx: TransactionID,
        table_id: u32,
        rid: crate::storage::Rid,
        before: Vec<u8>,
        after: Vec<u8>,
    ) -> DbResultLsn {
        self.append(tx, LogPayload::Update { table_id, rid, before, after })
    }

    pub fn log_create_table(&mut self, tx: TransactionID, table_id: u32, schema_bytes: Vec<u8>) -> DbResultLsn {
        self.force_append(tx, LogPayload::CreateTable { table_id, schema_bytes })
    }

    /// Reads every durable record from the start of the file, in
    /// on-disk order, for the analyze pass. Does not touch the
    /// in-memory tail buffer: callers must `flush` first if they want
    /// to see not-yet-durable records, which recovery never does since
    /// recovery only ever runs against a file nobody is appending to.
    pub fn read_all(&mut self) -> Result<Vec<(LogRecord, u64)>, DbError> {
        self.file.seek(SeekFrom::Start(0))?;
        let len = self.file.get_size()?;
        let bytes = self.file.read_exact_at(0, len as usize)?;
        let mut cursor = Cursor::new(bytes);
        let mut out = Vec::new();
        let mut offset = 0u64;
        while offset < len {
            let (record, consumed) = decode_with_len(&mut cursor);
            out.push((record, offset));
            offset += consumed as u64;
        }
        Ok(out)
    }

    /// Truncates the log after a checkpoint has made everything before
    /// `keep_from_offset` irrelevant to future recovery.
    pub fn truncate_before(&mut self, keep_from_offset: u64) -> VoidResult {
        if keep_from_offset == 0 {
            return Ok(());
        }
        let len = self.file.get_size()?;
        let tail = self.file.read_exact_at(keep_from_offset, (len - keep_from_offset) as usize)?;
        self.file.set_len(0)?;
        self.file.write_at(0, &tail)?;
        self.flushed_offset = tail.len() as u64;
        Ok(())
    }
}

type DbResultLsn = Result<i64, DbError>;
