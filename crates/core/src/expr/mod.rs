//! The expression engine: typed trees built by a post-order stack
//! builder, evaluated lanewise over record batches.

mod builder;
mod eval;
mod node;
mod parser;

pub use builder::ExpressionBuilder;
pub use node::Operator;
pub use parser::parse;

use tabula_primitives::TableId;
use tabula_types::{
    Bool, DataType, Float, GeoPoint, Int, Record, Text, ValueType, Vector,
};

use crate::db::Db;
use crate::error::{Error, ExprError, Result};
use crate::BLOCK_SIZE;

pub(crate) use eval::Block;
use node::Node;

/// A compiled expression over one table's records.
///
/// One expression supports all three evaluation modes: `filter` for
/// Bool-typed trees, `adjust` for Float-typed trees, and typed
/// `evaluate` for any tree. Evaluation takes the owning [`Db`] so that
/// dereference nodes can reach other tables.
#[derive(Clone, Debug)]
pub struct Expression {
    table: TableId,
    root: Node,
    block_size: usize,
}

impl Expression {
    pub(crate) fn new(table: TableId, root: Node) -> Self {
        Expression {
            table,
            root,
            block_size: BLOCK_SIZE,
        }
    }

    /// The table this expression was built against.
    pub fn table(&self) -> TableId {
        self.table
    }

    /// The result type of the tree.
    pub fn data_type(&self) -> DataType {
        self.root.data_type()
    }

    /// Whether the whole expression is just the `_id` pseudo column.
    pub fn is_row_id(&self) -> bool {
        matches!(self.root, Node::RowId)
    }

    /// Whether the whole expression is just the `_score` pseudo column.
    pub fn is_score(&self) -> bool {
        matches!(self.root, Node::Score)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Keeps exactly the records whose evaluation is `true` (not false,
    /// not N/A), preserving input order.
    pub fn filter(&self, db: &Db, records: &mut Vec<Record>) -> Result<()> {
        self.filter_from(db, records, 0)
    }

    /// Like [`Expression::filter`], but leaves `records[..from]` alone.
    /// Streams in blocks of [`BLOCK_SIZE`].
    pub(crate) fn filter_from(&self, db: &Db, records: &mut Vec<Record>, from: usize) -> Result<()> {
        if self.data_type() != DataType::Bool {
            return Err(ExprError::ResultType {
                expected: DataType::Bool,
                found: self.data_type(),
            }
            .into());
        }
        let mut write = from;
        let mut read = from;
        let len = records.len();
        while read < len {
            let end = (read + self.block_size).min(len);
            let block = eval::evaluate(db, &self.root, &records[read..end])?;
            let Block::Bool(values) = block else {
                return Err(Error::Broken("filter expression produced a non-Bool block"));
            };
            for (lane, value) in values.iter().enumerate() {
                if value.is_true() {
                    records[write] = records[read + lane];
                    write += 1;
                }
            }
            read = end;
        }
        records.truncate(write);
        Ok(())
    }

    /// Overwrites every record's score with the evaluation result.
    /// Float-typed expressions only; row ids are left untouched.
    pub fn adjust(&self, db: &Db, records: &mut [Record]) -> Result<()> {
        if self.data_type() != DataType::Float {
            return Err(ExprError::ResultType {
                expected: DataType::Float,
                found: self.data_type(),
            }
            .into());
        }
        let mut at = 0;
        while at < records.len() {
            let end = (at + self.block_size).min(records.len());
            let block = eval::evaluate(db, &self.root, &records[at..end])?;
            let Block::Float(values) = block else {
                return Err(Error::Broken("adjust expression produced a non-Float block"));
            };
            for (lane, value) in values.into_iter().enumerate() {
                records[at + lane].score = value;
            }
            at = end;
        }
        Ok(())
    }

    /// Appends one result per input record to `out` (N/A lanes
    /// included). The expression's type must be `T`.
    pub fn evaluate<T: ExprResult>(
        &self,
        db: &Db,
        records: &[Record],
        out: &mut Vec<T>,
    ) -> Result<()> {
        if self.data_type() != T::DATA_TYPE {
            return Err(ExprError::ResultType {
                expected: T::DATA_TYPE,
                found: self.data_type(),
            }
            .into());
        }
        let mut at = 0;
        while at < records.len() {
            let end = (at + self.block_size).min(records.len());
            let block = eval::evaluate(db, &self.root, &records[at..end])?;
            let values =
                T::take(block).ok_or(Error::Broken("expression block type mismatch"))?;
            out.extend(values);
            at = end;
        }
        Ok(())
    }

    /// Evaluates into one concatenated block, chunking internally.
    pub(crate) fn evaluate_block(&self, db: &Db, records: &[Record]) -> Result<Block> {
        let mut out = Block::na_filled(self.data_type(), 0);
        let mut at = 0;
        while at < records.len() {
            let end = (at + self.block_size).min(records.len());
            let block = eval::evaluate(db, &self.root, &records[at..end])?;
            out.append(block)?;
            at = end;
        }
        Ok(out)
    }
}

/// Output types of [`Expression::evaluate`]: the ten value types.
pub trait ExprResult: ValueType {
    #[doc(hidden)]
    fn take(block: Block) -> Option<Vec<Self>>;
}

macro_rules! expr_result {
    ($($ty:ty => $variant:ident,)*) => {
        $(
            impl ExprResult for $ty {
                fn take(block: Block) -> Option<Vec<Self>> {
                    match block {
                        Block::$variant(values) => Some(values),
                        _ => None,
                    }
                }
            }
        )*
    };
}

expr_result! {
    Bool => Bool,
    Int => Int,
    Float => Float,
    GeoPoint => GeoPoint,
    Text => Text,
    Vector<Bool> => BoolVector,
    Vector<Int> => IntVector,
    Vector<Float> => FloatVector,
    Vector<GeoPoint> => GeoPointVector,
    Vector<Text> => TextVector,
}
