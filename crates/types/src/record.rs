use crate::{Float, Int};

/// The unit that flows through cursors, expressions and pipelines.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Record {
    pub row_id: Int,
    pub score: Float,
}

impl Record {
    pub fn new(row_id: Int, score: Float) -> Self {
        Record { row_id, score }
    }

    /// A record as a cursor first emits it: score zero.
    pub fn fresh(row_id: Int) -> Self {
        Record {
            row_id,
            score: Float::new(0.0),
        }
    }
}
