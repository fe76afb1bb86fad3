use tabula_primitives::IntMap;
use tabula_types::{Float, Record};

use crate::error::Result;

/// Which row-id set the merged output covers.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum MergerLogicalOperator {
    /// Rows present in both inputs.
    #[default]
    And,
    /// Rows present in either input.
    Or,
    /// Rows present in exactly one input.
    Xor,
    /// Rows present in the first input and not in the second.
    Minus,
    /// Rows of the first input (second-input scores still combine).
    Left,
    /// Rows of the second input.
    Right,
}

/// How the two sides' scores combine per output record.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum MergerScoreOperator {
    #[default]
    Plus,
    Minus,
    Multiplication,
    /// Take the first input's score.
    Left,
    /// Take the second input's score.
    Right,
    /// Always zero.
    Zero,
}

#[derive(Clone, Debug)]
pub struct MergerOptions {
    pub logical_operator: MergerLogicalOperator,
    pub score_operator: MergerScoreOperator,
    /// Replaces the score of a side that has no record for a row.
    pub missing_score: Float,
    pub offset: usize,
    pub limit: usize,
}

impl Default for MergerOptions {
    fn default() -> Self {
        MergerOptions {
            logical_operator: MergerLogicalOperator::default(),
            score_operator: MergerScoreOperator::default(),
            missing_score: Float::new(0.0),
            offset: 0,
            limit: usize::MAX,
        }
    }
}

/// Merges two record streams by row id.
///
/// Inputs must each hold unique row ids; the result is unspecified
/// otherwise. Output order is unspecified.
pub struct Merger {
    options: MergerOptions,
    left: Vec<Record>,
    right: Vec<Record>,
}

impl Merger {
    pub fn new(options: MergerOptions) -> Self {
        Merger {
            options,
            left: Vec::new(),
            right: Vec::new(),
        }
    }

    /// Starts over with two new inputs.
    pub fn reset(&mut self, left: Vec<Record>, right: Vec<Record>) {
        self.left = left;
        self.right = right;
    }

    /// Incremental-work hook; merging happens in [`Merger::finish`].
    pub fn progress(&mut self) -> Result<()> {
        Ok(())
    }

    /// Merges the two inputs and returns the configured window.
    pub fn finish(&mut self) -> Result<Vec<Record>> {
        let left = std::mem::take(&mut self.left);
        let right = std::mem::take(&mut self.right);
        let missing = self.options.missing_score;
        let combine = |l: Float, r: Float| -> Float {
            match self.options.score_operator {
                MergerScoreOperator::Plus => l + r,
                MergerScoreOperator::Minus => l - r,
                MergerScoreOperator::Multiplication => l * r,
                MergerScoreOperator::Left => l,
                MergerScoreOperator::Right => r,
                MergerScoreOperator::Zero => Float::new(0.0),
            }
        };
        let mut out = Vec::new();
        match self.options.logical_operator {
            MergerLogicalOperator::And => {
                // Hash the smaller side, stream the larger.
                let left_is_stream = left.len() >= right.len();
                let (filter, stream) = if left_is_stream {
                    (&right, &left)
                } else {
                    (&left, &right)
                };
                let map = score_map(filter);
                for record in stream {
                    if let Some(&other) = map.get(&record.row_id.value()) {
                        let (l, r) = if left_is_stream {
                            (record.score, other)
                        } else {
                            (other, record.score)
                        };
                        out.push(Record::new(record.row_id, combine(l, r)));
                    }
                }
            }
            MergerLogicalOperator::Or => {
                let mut map = score_map(&right);
                for record in &left {
                    let r = map.remove(&record.row_id.value()).unwrap_or(missing);
                    out.push(Record::new(record.row_id, combine(record.score, r)));
                }
                for record in &right {
                    if map.remove(&record.row_id.value()).is_some() {
                        out.push(Record::new(record.row_id, combine(missing, record.score)));
                    }
                }
            }
            MergerLogicalOperator::Xor => {
                let mut map = score_map(&right);
                for record in &left {
                    if map.remove(&record.row_id.value()).is_none() {
                        out.push(Record::new(record.row_id, combine(record.score, missing)));
                    }
                }
                for record in &right {
                    if map.remove(&record.row_id.value()).is_some() {
                        out.push(Record::new(record.row_id, combine(missing, record.score)));
                    }
                }
            }
            MergerLogicalOperator::Minus => {
                let map = score_map(&right);
                for record in &left {
                    if !map.contains_key(&record.row_id.value()) {
                        out.push(Record::new(record.row_id, combine(record.score, missing)));
                    }
                }
            }
            MergerLogicalOperator::Left => {
                let map = score_map(&right);
                for record in &left {
                    let r = map.get(&record.row_id.value()).copied().unwrap_or(missing);
                    out.push(Record::new(record.row_id, combine(record.score, r)));
                }
            }
            MergerLogicalOperator::Right => {
                let map = score_map(&left);
                for record in &right {
                    let l = map.get(&record.row_id.value()).copied().unwrap_or(missing);
                    out.push(Record::new(record.row_id, combine(l, record.score)));
                }
            }
        }
        if self.options.offset > 0 {
            let offset = self.options.offset.min(out.len());
            out.drain(..offset);
        }
        out.truncate(self.options.limit);
        Ok(out)
    }

    /// Convenience for the one-shot case: reset, then finish.
    pub fn merge(&mut self, left: Vec<Record>, right: Vec<Record>) -> Result<Vec<Record>> {
        self.reset(left, right);
        self.progress()?;
        self.finish()
    }
}

fn score_map(records: &[Record]) -> IntMap<i64, Float> {
    let mut map = IntMap::default();
    for record in records {
        map.insert(record.row_id.value(), record.score);
    }
    map
}
