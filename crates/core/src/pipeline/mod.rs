//! The pipeline executor: composable streaming stages pulled from a
//! single root.
//!
//! A pipeline is assembled on a stack: producers (cursors) push, stage
//! constructors pop their inputs and push themselves, and `release`
//! hands back the single remaining node as the pipeline root. Execution
//! is demand-driven: every stage exposes `read_next`, records move in
//! blocks of [`BLOCK_SIZE`](crate::BLOCK_SIZE), and the only buffering
//! beyond the block in flight happens in the sorter and merger, which
//! materialize by necessity.

mod merger;
mod sorter;

pub use merger::{Merger, MergerLogicalOperator, MergerOptions, MergerScoreOperator};
pub use sorter::{Sorter, SorterOptions, SorterOrder};

use log::trace;
use tabula_primitives::TableId;
use tabula_types::{DataType, Int, Record};

use crate::db::{Cursor, Db};
use crate::error::{ExprError, PipelineError, Result};
use crate::expr::Expression;
use crate::BLOCK_SIZE;

/// One stage of a pipeline.
trait Stage {
    /// Appends the next block of records and returns how many.
    /// Returning 0 means the stage is drained.
    fn read_next(&mut self, records: &mut Vec<Record>) -> Result<usize>;

    /// Drains the stage.
    fn read_all(&mut self, records: &mut Vec<Record>) -> Result<usize> {
        let mut total = 0;
        loop {
            let count = self.read_next(records)?;
            if count == 0 {
                return Ok(total);
            }
            total += count;
        }
    }
}

struct CursorStage<'db> {
    cursor: Box<dyn Cursor + 'db>,
}

impl Stage for CursorStage<'_> {
    fn read_next(&mut self, records: &mut Vec<Record>) -> Result<usize> {
        let start = records.len();
        records.resize(start + BLOCK_SIZE, Record::fresh(Int::na()));
        let count = self.cursor.read(&mut records[start..])?;
        records.truncate(start + count);
        Ok(count)
    }

    fn read_all(&mut self, records: &mut Vec<Record>) -> Result<usize> {
        self.cursor.read_all(records)
    }
}

struct FilterStage<'db> {
    db: &'db Db,
    child: Box<dyn Stage + 'db>,
    expression: Expression,
    offset: usize,
    limit: usize,
}

impl Stage for FilterStage<'_> {
    fn read_next(&mut self, records: &mut Vec<Record>) -> Result<usize> {
        let start = records.len();
        while self.limit > 0 {
            let count = self.child.read_next(records)?;
            if count == 0 {
                break;
            }
            let block_start = records.len() - count;
            self.expression.filter_from(self.db, records, block_start)?;
            // Offset consumes matches from the front of the stream.
            if self.offset > 0 {
                let kept = records.len() - block_start;
                if self.offset >= kept {
                    self.offset -= kept;
                    records.truncate(block_start);
                } else {
                    records.drain(block_start..block_start + self.offset);
                    self.offset = 0;
                }
            }
            // Limit caps the total output.
            let kept = records.len() - block_start;
            if kept > self.limit {
                records.truncate(block_start + self.limit);
            }
            self.limit -= records.len() - block_start;
            if records.len() - start >= BLOCK_SIZE {
                break;
            }
        }
        Ok(records.len() - start)
    }
}

struct AdjusterStage<'db> {
    db: &'db Db,
    child: Box<dyn Stage + 'db>,
    expression: Expression,
}

impl Stage for AdjusterStage<'_> {
    fn read_next(&mut self, records: &mut Vec<Record>) -> Result<usize> {
        let start = records.len();
        let count = self.child.read_next(records)?;
        self.expression.adjust(self.db, &mut records[start..])?;
        Ok(count)
    }
}

struct SorterStage<'db> {
    db: &'db Db,
    child: Box<dyn Stage + 'db>,
    sorter: Sorter,
    done: bool,
}

impl Stage for SorterStage<'_> {
    fn read_next(&mut self, records: &mut Vec<Record>) -> Result<usize> {
        if self.done {
            return Ok(0);
        }
        self.done = true;
        let mut block = Vec::new();
        if self.child.read_next(&mut block)? == 0 {
            return Ok(0);
        }
        self.sorter.reset(block);
        loop {
            self.sorter.progress()?;
            let mut block = Vec::new();
            if self.child.read_next(&mut block)? == 0 {
                break;
            }
            self.sorter.extend(block);
        }
        let sorted = self.sorter.finish(self.db)?;
        let count = sorted.len();
        records.extend(sorted);
        Ok(count)
    }
}

struct MergerStage<'db> {
    left: Box<dyn Stage + 'db>,
    right: Box<dyn Stage + 'db>,
    merger: Merger,
    done: bool,
}

impl Stage for MergerStage<'_> {
    fn read_next(&mut self, records: &mut Vec<Record>) -> Result<usize> {
        if self.done {
            return Ok(0);
        }
        self.done = true;
        let mut left = Vec::new();
        let mut right = Vec::new();
        self.left.read_all(&mut left)?;
        self.right.read_all(&mut right)?;
        if left.is_empty() && right.is_empty() {
            return Ok(0);
        }
        let merged = self.merger.merge(left, right)?;
        let count = merged.len();
        records.extend(merged);
        Ok(count)
    }
}

/// A released pipeline: one pull-mode reader.
pub struct Pipeline<'db> {
    table: TableId,
    root: Box<dyn Stage + 'db>,
}

impl std::fmt::Debug for Pipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("table", &self.table).finish()
    }
}

impl Pipeline<'_> {
    /// The table the pipeline was built against.
    pub fn table(&self) -> TableId {
        self.table
    }

    /// Reads everything through the pipeline. A failing stage aborts
    /// the whole read; there is no partial commit.
    pub fn flush(&mut self, records: &mut Vec<Record>) -> Result<usize> {
        self.root.read_all(records)
    }
}

/// Assembles pipelines on a node stack.
pub struct PipelineBuilder<'db> {
    db: &'db Db,
    table: TableId,
    stack: Vec<Box<dyn Stage + 'db>>,
}

impl<'db> PipelineBuilder<'db> {
    pub fn new(db: &'db Db, table: TableId) -> Result<Self> {
        db.table(table)?;
        Ok(PipelineBuilder {
            db,
            table,
            stack: Vec::new(),
        })
    }

    pub fn table(&self) -> TableId {
        self.table
    }

    /// Pushes a producer.
    pub fn push_cursor(&mut self, cursor: impl Cursor + 'db) {
        self.stack.push(Box::new(CursorStage {
            cursor: Box::new(cursor),
        }));
    }

    /// Pops one node and pushes a filter over it. The expression must be
    /// Bool-typed; `offset`/`limit` are pushed down into the stage.
    pub fn push_filter(
        &mut self,
        expression: Expression,
        offset: usize,
        limit: usize,
    ) -> Result<()> {
        if expression.data_type() != DataType::Bool {
            return Err(ExprError::ResultType {
                expected: DataType::Bool,
                found: expression.data_type(),
            }
            .into());
        }
        let child = self.pop_one()?;
        self.stack.push(Box::new(FilterStage {
            db: self.db,
            child,
            expression,
            offset,
            limit,
        }));
        Ok(())
    }

    /// Pops one node and pushes a score adjuster. Float-typed
    /// expressions only.
    pub fn push_adjuster(&mut self, expression: Expression) -> Result<()> {
        if expression.data_type() != DataType::Float {
            return Err(ExprError::ResultType {
                expected: DataType::Float,
                found: expression.data_type(),
            }
            .into());
        }
        let child = self.pop_one()?;
        self.stack.push(Box::new(AdjusterStage {
            db: self.db,
            child,
            expression,
        }));
        Ok(())
    }

    /// Pops one node and pushes a sort stage.
    pub fn push_sorter(&mut self, sorter: Sorter) -> Result<()> {
        let child = self.pop_one()?;
        self.stack.push(Box::new(SorterStage {
            db: self.db,
            child,
            sorter,
            done: false,
        }));
        Ok(())
    }

    /// Pops two nodes and pushes a merge stage. The top of the stack
    /// becomes the second (right) input, the node beneath it the first.
    pub fn push_merger(&mut self, options: MergerOptions) -> Result<()> {
        if self.stack.len() < 2 {
            return Err(PipelineError::MissingInputs {
                required: 2,
                found: self.stack.len(),
            }
            .into());
        }
        let right = self.stack.pop().expect("length checked");
        let left = self.stack.pop().expect("length checked");
        self.stack.push(Box::new(MergerStage {
            left,
            right,
            merger: Merger::new(options),
            done: false,
        }));
        Ok(())
    }

    /// Drops every node.
    pub fn clear(&mut self) {
        self.stack.clear();
    }

    /// Completes the pipeline; the stack must hold exactly one node.
    pub fn release(&mut self) -> Result<Pipeline<'db>> {
        if self.stack.len() != 1 {
            return Err(PipelineError::UnbalancedStack(self.stack.len()).into());
        }
        let root = self.stack.pop().expect("length checked");
        trace!("released pipeline over table {}", self.table);
        Ok(Pipeline {
            table: self.table,
            root,
        })
    }

    fn pop_one(&mut self) -> Result<Box<dyn Stage + 'db>> {
        self.stack.pop().ok_or_else(|| {
            PipelineError::MissingInputs {
                required: 1,
                found: 0,
            }
            .into()
        })
    }
}
