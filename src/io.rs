use std::{
    convert::TryInto,
    fs::{File, OpenOptions},
    io::{Cursor, Read, Seek, SeekFrom, Write},
    mem::size_of,
    path::Path,
};

use bit_vec::BitVec;
use log::debug;

use crate::error::DbError;

pub trait Encodeable {
    fn encode(&self) -> Vec<u8>;
}

pub trait Decodeable {
    fn decode_from<R: Read>(reader: &mut R) -> Self;
}

pub fn read_into<T: Decodeable, R: Read>(reader: &mut R) -> T {
    T::decode_from(reader)
}

pub fn read_exact<R: Read>(reader: &mut R, bytes_count: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; bytes_count];
    reader
        .read_exact(&mut buffer)
        .unwrap_or_else(|_| panic!("io error, expect {} bytes", bytes_count));
    buffer
}

/// A single on-disk file holding either a table's pages or an index's
/// pages, accessed as a flat sequence of fixed-size page slots plus an
/// optional leading header. This is the "disk manager" of the storage
/// stack: every higher layer reaches disk only through this type.
pub struct SmallFile {
    file: File,
}

impl SmallFile {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .open(file_path)
            .expect("failed to open backing file");

        Self { file }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), DbError> {
        self.file.write_all(bytes).map_err(DbError::from)
    }

    pub fn read<T: Decodeable>(&mut self) -> Result<T, DbError> {
        let mut bytes = vec![0u8; size_of::<T>()];
        self.file.read_exact(&mut bytes)?;
        let mut reader = Cursor::new(bytes);
        Ok(T::decode_from(&mut reader))
    }

    pub fn read_exact_at(&mut self, pos: u64, len: usize) -> Result<Vec<u8>, DbError> {
        self.file.seek(SeekFrom::Start(pos))?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn write_at(&mut self, pos: u64, bytes: &[u8]) -> Result<(), DbError> {
        self.file.seek(SeekFrom::Start(pos))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    pub fn get_size(&self) -> Result<u64, DbError> {
        Ok(self.file.metadata()?.len())
    }

    pub fn get_current_position(&mut self) -> Result<u64, DbError> {
        Ok(self.file.seek(SeekFrom::Current(0))?)
    }

    pub fn set_len(&self, len: u64) -> Result<(), DbError> {
        self.file.set_len(len)?;
        Ok(())
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, DbError> {
        Ok(self.file.seek(pos)?)
    }

    pub fn flush(&mut self) -> Result<(), DbError> {
        self.file.flush()?;
        Ok(())
    }

    /// Appends to the current seek position and returns the byte offset
    /// the record was written at, used by the log manager to recover
    /// `(lsn -> offset)` on analyze.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64, DbError> {
        let offset = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(bytes)?;
        debug!("appended {} bytes at offset {}", bytes.len(), offset);
        Ok(offset)
    }
}

pub struct SmallWriter {
    buf: Vec<u8>,
}

impl SmallWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write<T: Encodeable>(&mut self, obj: &T) {
        self.buf.extend_from_slice(obj.encode().as_slice());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    pub fn to_padded_bytes(&self, size: usize) -> Vec<u8> {
        let mut buf = self.buf.clone();
        assert!(
            buf.len() <= size,
            "buffer size is larger than the given size: {} > {}",
            buf.len(),
            size
        );
        buf.resize(size, 0);
        buf
    }
}

impl Default for SmallWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// # Format
/// - 2 bytes: bytes size (range: 0 - 65535)
/// - n bytes: bit vector
impl Encodeable for BitVec {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let payload = self.to_bytes();
        let len = payload.len() as u16;
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&payload);
        buf
    }
}

impl Decodeable for BitVec {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let size = u16::from_le_bytes(read_exact(reader, 2).try_into().unwrap());
        let buf = read_exact(reader, size as usize);
        BitVec::from_bytes(&buf)
    }
}

impl Encodeable for bool {
    fn encode(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

impl Decodeable for bool {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        u8::decode_from(reader) == 1
    }
}

impl Encodeable for String {
    fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        let bytes = self.as_bytes();
        let len = bytes.len() as u16;
        buffer.extend_from_slice(&len.to_le_bytes());
        buffer.extend_from_slice(bytes);
        buffer
    }
}

impl Decodeable for String {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let size = u16::from_le_bytes(read_exact(reader, 2).try_into().unwrap());
        let bytes = read_exact(reader, size as usize);
        String::from_utf8(bytes).expect("invalid utf8 in log stream")
    }
}

/// # Format
/// - 2 bytes: size of the payload
/// - n bytes: payload
impl Encodeable for Vec<u8> {
    fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        let len = self.len() as u16;
        buffer.extend_from_slice(&len.to_le_bytes());
        buffer.extend_from_slice(self);
        buffer
    }
}

impl Decodeable for Vec<u8> {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let size = u16::from_le_bytes(read_exact(reader, 2).try_into().unwrap());
        read_exact(reader, size as usize)
    }
}

macro_rules! impl_serialization {
    (for $($t:ty),+) => {
        $(
            impl Encodeable for $t {
                fn encode(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }

            impl Decodeable for $t {
                fn decode_from<R: Read>(reader: &mut R) -> Self {
                    let bytes = read_exact(reader, size_of::<Self>());
                    Self::from_le_bytes(bytes.try_into().unwrap())
                }
            }
        )*
    }
}

impl_serialization!(for u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, isize, usize, f32, f64);
