use std::cmp::Ordering;

use crate::{
    storage::{Schema, Tuple, Value},
    types::DbResult,
};

use super::Executor;

#[derive(Clone, Copy)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Eagerly drains its child into memory at `open`, sorts once, and
/// serves rows from the buffer afterward. There is no external sort:
/// the engine has no spill-to-disk path, so a sort that doesn't fit in
/// memory just doesn't fit.
pub struct SortExec {
    child: Box<dyn Executor>,
    keys: Vec<(usize, SortDirection)>,
    limit: Option<usize>,
    buffer: Vec<Tuple>,
    cursor: usize,
}

impl SortExec {
    pub fn new(child: Box<dyn Executor>, keys: Vec<(usize, SortDirection)>, limit: Option<usize>) -> Self {
        Self { child, keys, limit, buffer: Vec::new(), cursor: 0 }
    }

    fn compare(&self, a: &Tuple, b: &Tuple) -> Ordering {
        for &(field, dir) in &self.keys {
            let cmp = Self::compare_values(a.get(field), b.get(field));
            let cmp = match dir {
                SortDirection::Asc => cmp,
                SortDirection::Desc => cmp.reverse(),
            };
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    }

    fn compare_values(a: &Value, b: &Value) -> Ordering {
        a.partial_cmp(b).unwrap_or(Ordering::Equal)
    }
}

impl Executor for SortExec {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        self.buffer.clear();
        while let Some(tuple) = self.child.next()? {
            self.buffer.push(tuple);
        }
        self.child.close()?;
        self.buffer.sort_by(|a, b| self.compare(a, b));
        if let Some(limit) = self.limit {
            self.buffer.truncate(limit);
        }
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if self.cursor >= self.buffer.len() {
            return Ok(None);
        }
        let tuple = self.buffer[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(tuple))
    }

    fn close(&mut self) -> DbResult<()> {
        self.buffer.clear();
        self.cursor = 0;
        Ok(())
    }

    fn schema(&self) -> &Schema {
        self.child.schema()
    }
}
