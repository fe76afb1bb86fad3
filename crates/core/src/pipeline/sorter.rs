use std::cmp::Ordering;

use tabula_types::Record;

use crate::db::{Db, OrderType};
use crate::error::{PipelineError, Result};
use crate::expr::{Block, Expression};

/// One sort key: an expression and a direction.
pub struct SorterOrder {
    pub expression: Expression,
    pub order: OrderType,
}

impl SorterOrder {
    pub fn new(expression: Expression, order: OrderType) -> Self {
        SorterOrder { expression, order }
    }
}

#[derive(Clone, Debug)]
pub struct SorterOptions {
    /// The first `offset` records of the sorted output are dropped.
    pub offset: usize,
    /// At most `limit` records are produced.
    pub limit: usize,
}

impl Default for SorterOptions {
    fn default() -> Self {
        SorterOptions {
            offset: 0,
            limit: usize::MAX,
        }
    }
}

/// A stable multi-key sorter over records.
///
/// Keys apply in sequence; later keys break ties of earlier ones. N/A
/// sorts after every valid value in regular order and before them in
/// reverse order, for every key type. Records equal under all keys keep
/// their input order.
pub struct Sorter {
    orders: Vec<SorterOrder>,
    offset: usize,
    limit: usize,
    buffer: Vec<Record>,
}

impl Sorter {
    pub fn new(orders: Vec<SorterOrder>, options: SorterOptions) -> Result<Self> {
        if orders.is_empty() {
            return Err(PipelineError::NoKeys.into());
        }
        for order in &orders {
            let data_type = order.expression.data_type();
            if data_type.is_vector() {
                return Err(PipelineError::UnsortableKey(data_type).into());
            }
        }
        Ok(Sorter {
            orders,
            offset: options.offset,
            limit: options.limit,
            buffer: Vec::new(),
        })
    }

    /// Starts over with a new record set.
    pub fn reset(&mut self, records: Vec<Record>) {
        self.buffer = records;
    }

    /// Adds more records to the set being sorted.
    pub fn extend(&mut self, records: Vec<Record>) {
        self.buffer.extend(records);
    }

    /// Incremental-work hook between feeds; sorting happens in
    /// [`Sorter::finish`].
    pub fn progress(&mut self) -> Result<()> {
        Ok(())
    }

    /// Sorts the accumulated records and returns the configured window.
    pub fn finish(&mut self, db: &Db) -> Result<Vec<Record>> {
        let records = std::mem::take(&mut self.buffer);
        let keys: Vec<(Block, OrderType)> = self
            .orders
            .iter()
            .map(|order| {
                order
                    .expression
                    .evaluate_block(db, &records)
                    .map(|block| (block, order.order))
            })
            .collect::<Result<_>>()?;
        let mut permutation: Vec<usize> = (0..records.len()).collect();
        permutation.sort_by(|&a, &b| {
            for (block, order) in &keys {
                let ordering = compare_lanes(block, a, b, *order);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        let mut sorted: Vec<Record> = permutation.into_iter().map(|at| records[at]).collect();
        if self.offset > 0 {
            let offset = self.offset.min(sorted.len());
            sorted.drain(..offset);
        }
        sorted.truncate(self.limit);
        Ok(sorted)
    }

    /// Convenience for the one-shot case: reset, then finish.
    pub fn sort(&mut self, db: &Db, records: &mut Vec<Record>) -> Result<()> {
        self.reset(std::mem::take(records));
        self.progress()?;
        *records = self.finish(db)?;
        Ok(())
    }
}

/// Compares two lanes of one key block. N/A is the greatest value in
/// regular order; reverse order is the exact flip.
fn compare_lanes(block: &Block, a: usize, b: usize, order: OrderType) -> Ordering {
    let regular = match block {
        Block::Bool(v) => na_last(v[a].to_option(), v[b].to_option(), Ord::cmp),
        Block::Int(v) => na_last(v[a].to_option(), v[b].to_option(), Ord::cmp),
        Block::Float(v) => na_last(v[a].to_option(), v[b].to_option(), |x, y| {
            x.partial_cmp(y).unwrap_or(Ordering::Equal)
        }),
        Block::GeoPoint(v) => {
            let key = |at: usize| {
                if v[at].is_na() {
                    None
                } else {
                    Some((v[at].latitude().value(), v[at].longitude().value()))
                }
            };
            na_last(key(a), key(b), Ord::cmp)
        }
        Block::Text(v) => na_last(v[a].bytes(), v[b].bytes(), Ord::cmp),
        // Vector keys are rejected at construction.
        _ => Ordering::Equal,
    };
    match order {
        OrderType::Regular => regular,
        OrderType::Reverse => regular.reverse(),
    }
}

fn na_last<T>(a: Option<T>, b: Option<T>, cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
    match (&a, &b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => cmp(x, y),
    }
}
