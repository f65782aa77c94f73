pub mod aggregate;
pub mod delete;
pub mod index_scan;
pub mod insert;
pub mod join;
pub mod load;
pub mod seq_scan;
pub mod sort;
pub mod update;

use crate::{
    storage::{Rid, Schema, Tuple},
    types::DbResult,
};

use self::{index_scan::IndexScanExec, seq_scan::SeqScanExec};

/// Classic open/next/close iterator protocol every physical operator
/// speaks. `open` takes whatever locks it needs and positions its
/// cursor; `next` pulls rows one at a time; `close` releases anything
/// `open` acquired that isn't already covered by the transaction's
/// locks (which live until commit/abort regardless).
pub trait Executor {
    fn open(&mut self) -> DbResult<()>;
    fn next(&mut self) -> DbResult<Option<Tuple>>;
    fn close(&mut self) -> DbResult<()>;
    fn schema(&self) -> &Schema;

    /// Re-run from the start. Used by the inner side of a block nested
    /// loop join, which rescans once per outer block.
    fn rewind(&mut self) -> DbResult<()> {
        self.close()?;
        self.open()
    }
}

/// Locates target rows for update/delete. Neither variant needs to be
/// a trait object: both `update` and `delete` need the matched row's
/// `Rid` as well as its values, which the generic `Executor` protocol
/// doesn't expose.
pub enum RowSource<'a> {
    Seq(SeqScanExec<'a>),
    Index(IndexScanExec<'a>),
}

impl<'a> RowSource<'a> {
    pub fn open(&mut self) -> DbResult<()> {
        match self {
            RowSource::Seq(e) => e.open(),
            RowSource::Index(e) => e.open(),
        }
    }

    pub fn next_row(&mut self) -> DbResult<Option<(Rid, Tuple)>> {
        match self {
            RowSource::Seq(e) => e.next_row(),
            RowSource::Index(e) => e.next_row(),
        }
    }

    pub fn close(&mut self) -> DbResult<()> {
        match self {
            RowSource::Seq(e) => e.close(),
            RowSource::Index(e) => e.close(),
        }
    }

    pub fn schema(&self) -> &Schema {
        match self {
            RowSource::Seq(e) => e.schema(),
            RowSource::Index(e) => e.schema(),
        }
    }
}
