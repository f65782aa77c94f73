use crate::{
    storage::{Column, Schema, Tuple, Value},
    types::DbResult,
};

use super::Executor;

/// Block nested loop join: buffers a block of outer rows, rescans the
/// inner child once per block, and for every inner row tests it
/// against each buffered outer row. The block size trades memory for
/// fewer inner rescans; there is no hashing or sort-merge strategy
/// here, matching the absence of a cost-based optimizer to choose one.
pub struct BlockNestedLoopJoinExec {
    outer: Box<dyn Executor>,
    inner: Box<dyn Executor>,
    condition: Box<dyn Fn(&Tuple, &Tuple) -> bool>,
    schema: Schema,
    block_size: usize,

    outer_block: Vec<Tuple>,
    outer_done: bool,
    inner_row: Option<Tuple>,
    match_cursor: usize,
}

impl BlockNestedLoopJoinExec {
    pub fn new(
        outer: Box<dyn Executor>,
        inner: Box<dyn Executor>,
        condition: Box<dyn Fn(&Tuple, &Tuple) -> bool>,
        block_size: usize,
    ) -> Self {
        let mut columns: Vec<Column> = outer.schema().columns.clone();
        columns.extend(inner.schema().columns.iter().cloned());
        Self {
            outer,
            inner,
            condition,
            schema: Schema::new(columns),
            block_size: block_size.max(1),
            outer_block: Vec::new(),
            outer_done: false,
            inner_row: None,
            match_cursor: 0,
        }
    }

    fn fill_block(&mut self) -> DbResult<()> {
        self.outer_block.clear();
        while self.outer_block.len() < self.block_size {
            match self.outer.next()? {
                Some(tuple) => self.outer_block.push(tuple),
                None => {
                    self.outer_done = true;
                    break;
                }
            }
        }
        Ok(())
    }

    fn combine(outer: &Tuple, inner: &Tuple) -> Tuple {
        let mut values: Vec<Value> = outer.values().to_vec();
        values.extend(inner.values().iter().cloned());
        Tuple::new(values)
    }
}

impl Executor for BlockNestedLoopJoinExec {
    fn open(&mut self) -> DbResult<()> {
        self.outer.open()?;
        self.inner.open()?;
        self.outer_done = false;
        self.inner_row = None;
        self.match_cursor = 0;
        self.fill_block()?;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        loop {
            if self.outer_block.is_empty() {
                return Ok(None);
            }

            if self.inner_row.is_none() {
                self.inner_row = self.inner.next()?;
                self.match_cursor = 0;
                if self.inner_row.is_none() {
                    if self.outer_done {
                        return Ok(None);
                    }
                    self.inner.rewind()?;
                    self.fill_block()?;
                    continue;
                }
            }

            let inner = self.inner_row.as_ref().unwrap();
            while self.match_cursor < self.outer_block.len() {
                let outer = &self.outer_block[self.match_cursor];
                self.match_cursor += 1;
                if (self.condition)(outer, inner) {
                    return Ok(Some(Self::combine(outer, inner)));
                }
            }
            self.inner_row = None;
        }
    }

    fn close(&mut self) -> DbResult<()> {
        self.outer.close()?;
        self.inner.close()
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
