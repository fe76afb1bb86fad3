use tabula_types::{Int, Record};

use crate::db::Table;
use crate::error::Result;
use crate::BLOCK_SIZE;

/// Iteration direction of cursors and sort keys.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum OrderType {
    /// The natural order (ascending in most cases).
    #[default]
    Regular,
    /// The reverse order.
    Reverse,
}

/// Options shared by every cursor constructor.
#[derive(Clone, Debug)]
pub struct CursorOptions {
    /// The first `offset` records are skipped.
    pub offset: usize,
    /// At most `limit` records are read.
    pub limit: usize,
    pub order: OrderType,
}

impl Default for CursorOptions {
    fn default() -> Self {
        CursorOptions {
            offset: 0,
            limit: usize::MAX,
            order: OrderType::Regular,
        }
    }
}

/// A lazy, finite, non-restartable producer of records.
///
/// `read` fills the given slice with up to its length records and returns
/// the number filled; a short count means the next call returns 0.
/// Scores start at 0.
pub trait Cursor {
    fn read(&mut self, records: &mut [Record]) -> Result<usize>;

    /// Reads the rest of the stream in [`BLOCK_SIZE`] blocks.
    ///
    /// The block size is a latency/throughput tradeoff only; it never
    /// affects the produced records.
    fn read_all(&mut self, records: &mut Vec<Record>) -> Result<usize> {
        let mut total = 0;
        loop {
            let start = records.len();
            records.resize(start + BLOCK_SIZE, Record::fresh(Int::na()));
            let count = self.read(&mut records[start..])?;
            records.truncate(start + count);
            total += count;
            if count < BLOCK_SIZE {
                return Ok(total);
            }
        }
    }
}

impl Cursor for Box<dyn Cursor + '_> {
    fn read(&mut self, records: &mut [Record]) -> Result<usize> {
        (**self).read(records)
    }

    fn read_all(&mut self, records: &mut Vec<Record>) -> Result<usize> {
        (**self).read_all(records)
    }
}

/// The table scan cursor: walks the row bitmap in row-id order.
pub struct RowCursor<'a> {
    table: &'a Table,
    /// The next candidate position, counted in scan direction.
    next: i64,
    /// Remaining records to skip before producing.
    offset: usize,
    /// Remaining records to produce.
    limit: usize,
    order: OrderType,
}

impl<'a> RowCursor<'a> {
    pub(crate) fn new(table: &'a Table, options: CursorOptions) -> Self {
        let next = match options.order {
            OrderType::Regular => 0,
            // One past the top live row; -1 means exhausted from the start.
            OrderType::Reverse => table.max_row_id().to_option().unwrap_or(-1),
        };
        RowCursor {
            table,
            next,
            offset: options.offset,
            limit: options.limit,
            order: options.order,
        }
    }

    fn next_live_row(&mut self) -> Option<i64> {
        match self.order {
            OrderType::Regular => {
                let top = self.table.max_row_id().to_option()?;
                while self.next <= top {
                    let row = self.next;
                    self.next += 1;
                    if self.table.test_row(Int::new(row)) {
                        return Some(row);
                    }
                }
                None
            }
            OrderType::Reverse => {
                while self.next >= 0 {
                    let row = self.next;
                    self.next -= 1;
                    if self.table.test_row(Int::new(row)) {
                        return Some(row);
                    }
                }
                None
            }
        }
    }
}

impl Cursor for RowCursor<'_> {
    fn read(&mut self, records: &mut [Record]) -> Result<usize> {
        let mut count = 0;
        while count < records.len() && self.limit > 0 {
            let Some(row) = self.next_live_row() else {
                break;
            };
            if self.offset > 0 {
                self.offset -= 1;
                continue;
            }
            records[count] = Record::fresh(Int::new(row));
            count += 1;
            self.limit -= 1;
        }
        Ok(count)
    }
}

/// A cursor over a prepared row-id iterator, used by index searches.
pub(crate) struct IterCursor<'a> {
    iter: Box<dyn Iterator<Item = i64> + 'a>,
}

impl<'a> IterCursor<'a> {
    pub(crate) fn new(iter: impl Iterator<Item = i64> + 'a, options: &CursorOptions) -> Self {
        IterCursor {
            iter: Box::new(iter.skip(options.offset).take(options.limit)),
        }
    }
}

impl Cursor for IterCursor<'_> {
    fn read(&mut self, records: &mut [Record]) -> Result<usize> {
        let mut count = 0;
        while count < records.len() {
            let Some(row) = self.iter.next() else {
                break;
            };
            records[count] = Record::fresh(Int::new(row));
            count += 1;
        }
        Ok(count)
    }
}
