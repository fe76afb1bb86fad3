//! Batch evaluation over record blocks.
//!
//! Each (sub)tree evaluates into a typed block of values, one lane per
//! input record. Operators apply lanewise; Kleene AND/OR evaluate both
//! children fully — short-circuiting is a property of the logic, not of
//! the evaluation order.

use tabula_types::{Bool, DataType, Datum, Float, GeoPoint, Int, Record, Text, Vector};

use crate::db::{Column, Db};
use crate::error::{Error, Result};
use crate::expr::node::{Node, Operator};

/// A typed vector of lane values. Unnameable outside the crate; it only
/// appears in the hidden method of `ExprResult`.
#[doc(hidden)]
#[derive(Clone, Debug)]
pub enum Block {
    Bool(Vec<Bool>),
    Int(Vec<Int>),
    Float(Vec<Float>),
    GeoPoint(Vec<GeoPoint>),
    Text(Vec<Text>),
    BoolVector(Vec<Vector<Bool>>),
    IntVector(Vec<Vector<Int>>),
    FloatVector(Vec<Vector<Float>>),
    GeoPointVector(Vec<Vector<GeoPoint>>),
    TextVector(Vec<Vector<Text>>),
}

impl Block {
    /// A block of `len` N/A lanes of the given type.
    pub(crate) fn na_filled(data_type: DataType, len: usize) -> Block {
        match data_type {
            DataType::Bool => Block::Bool(vec![Bool::Na; len]),
            DataType::Int => Block::Int(vec![Int::na(); len]),
            DataType::Float => Block::Float(vec![Float::na(); len]),
            DataType::GeoPoint => Block::GeoPoint(vec![GeoPoint::na(); len]),
            DataType::Text => Block::Text(vec![Text::na(); len]),
            DataType::BoolVector => Block::BoolVector(vec![Vector::na(); len]),
            DataType::IntVector => Block::IntVector(vec![Vector::na(); len]),
            DataType::FloatVector => Block::FloatVector(vec![Vector::na(); len]),
            DataType::GeoPointVector => Block::GeoPointVector(vec![Vector::na(); len]),
            DataType::TextVector => Block::TextVector(vec![Vector::na(); len]),
        }
    }

    /// Appends a same-typed block.
    pub(crate) fn append(&mut self, other: Block) -> crate::error::Result<()> {
        match (self, other) {
            (Block::Bool(a), Block::Bool(b)) => a.extend(b),
            (Block::Int(a), Block::Int(b)) => a.extend(b),
            (Block::Float(a), Block::Float(b)) => a.extend(b),
            (Block::GeoPoint(a), Block::GeoPoint(b)) => a.extend(b),
            (Block::Text(a), Block::Text(b)) => a.extend(b),
            (Block::BoolVector(a), Block::BoolVector(b)) => a.extend(b),
            (Block::IntVector(a), Block::IntVector(b)) => a.extend(b),
            (Block::FloatVector(a), Block::FloatVector(b)) => a.extend(b),
            (Block::GeoPointVector(a), Block::GeoPointVector(b)) => a.extend(b),
            (Block::TextVector(a), Block::TextVector(b)) => a.extend(b),
            _ => return Err(broken()),
        }
        Ok(())
    }

    /// Copies one lane out of a same-typed block.
    fn copy_lane(&mut self, from: &Block, from_lane: usize, to_lane: usize) {
        match (self, from) {
            (Block::Bool(a), Block::Bool(b)) => a[to_lane] = b[from_lane],
            (Block::Int(a), Block::Int(b)) => a[to_lane] = b[from_lane],
            (Block::Float(a), Block::Float(b)) => a[to_lane] = b[from_lane],
            (Block::GeoPoint(a), Block::GeoPoint(b)) => a[to_lane] = b[from_lane],
            (Block::Text(a), Block::Text(b)) => a[to_lane] = b[from_lane].clone(),
            (Block::BoolVector(a), Block::BoolVector(b)) => a[to_lane] = b[from_lane].clone(),
            (Block::IntVector(a), Block::IntVector(b)) => a[to_lane] = b[from_lane].clone(),
            (Block::FloatVector(a), Block::FloatVector(b)) => a[to_lane] = b[from_lane].clone(),
            (Block::GeoPointVector(a), Block::GeoPointVector(b)) => {
                a[to_lane] = b[from_lane].clone()
            }
            (Block::TextVector(a), Block::TextVector(b)) => a[to_lane] = b[from_lane].clone(),
            _ => debug_assert!(false, "scatter between differently typed blocks"),
        }
    }
}

fn broken() -> Error {
    Error::Broken("expression node evaluated to an unexpected type")
}

/// Evaluates `node` for every record in the batch.
pub(crate) fn evaluate(db: &Db, node: &Node, records: &[Record]) -> Result<Block> {
    match node {
        Node::Constant(datum) => Ok(constant_block(datum, records.len())),
        Node::Column {
            table,
            column,
            data_type,
        } => {
            let column = db.table(*table)?.column_by_id(*column)?;
            Ok(column_block(column, *data_type, records))
        }
        Node::RowId => Ok(Block::Int(records.iter().map(|r| r.row_id).collect())),
        Node::Score => Ok(Block::Float(records.iter().map(|r| r.score).collect())),
        Node::Unary { op, arg, .. } => {
            let arg = evaluate(db, arg, records)?;
            apply_unary(*op, arg)
        }
        Node::Binary { op, lhs, rhs, .. } => {
            let lhs = evaluate(db, lhs, records)?;
            let rhs = evaluate(db, rhs, records)?;
            apply_binary(*op, lhs, rhs)
        }
        Node::Dereference {
            ref_node,
            table,
            expr,
            data_type,
        } => {
            let refs = evaluate(db, ref_node, records)?;
            let Block::Int(refs) = refs else {
                return Err(broken());
            };
            let target = db.table(*table)?;
            let mut lanes = Vec::new();
            let mut sub_records = Vec::new();
            for (lane, reference) in refs.iter().enumerate() {
                if target.test_row(*reference) {
                    lanes.push(lane);
                    sub_records.push(Record::new(*reference, records[lane].score));
                }
            }
            let sub = evaluate(db, expr, &sub_records)?;
            let mut out = Block::na_filled(*data_type, records.len());
            for (at, &lane) in lanes.iter().enumerate() {
                out.copy_lane(&sub, at, lane);
            }
            Ok(out)
        }
    }
}

fn constant_block(datum: &Datum, len: usize) -> Block {
    match datum {
        Datum::Bool(v) => Block::Bool(vec![*v; len]),
        Datum::Int(v) => Block::Int(vec![*v; len]),
        Datum::Float(v) => Block::Float(vec![*v; len]),
        Datum::GeoPoint(v) => Block::GeoPoint(vec![*v; len]),
        Datum::Text(v) => Block::Text(vec![v.clone(); len]),
        Datum::BoolVector(v) => Block::BoolVector(vec![v.clone(); len]),
        Datum::IntVector(v) => Block::IntVector(vec![v.clone(); len]),
        Datum::FloatVector(v) => Block::FloatVector(vec![v.clone(); len]),
        Datum::GeoPointVector(v) => Block::GeoPointVector(vec![v.clone(); len]),
        Datum::TextVector(v) => Block::TextVector(vec![v.clone(); len]),
        Datum::Na => Block::Bool(vec![Bool::Na; len]),
    }
}

fn column_block(column: &Column, data_type: DataType, records: &[Record]) -> Block {
    let rows = records.iter().map(|r| r.row_id);
    match data_type {
        DataType::Bool => Block::Bool(rows.map(|r| column.get_bool(r)).collect()),
        DataType::Int => Block::Int(rows.map(|r| column.get_int(r)).collect()),
        DataType::Float => Block::Float(rows.map(|r| column.get_float(r)).collect()),
        DataType::GeoPoint => Block::GeoPoint(rows.map(|r| column.get_geo_point(r)).collect()),
        DataType::Text => Block::Text(rows.map(|r| column.get_text(r)).collect()),
        DataType::BoolVector => {
            Block::BoolVector(rows.map(|r| column.get_bool_vector(r)).collect())
        }
        DataType::IntVector => Block::IntVector(rows.map(|r| column.get_int_vector(r)).collect()),
        DataType::FloatVector => {
            Block::FloatVector(rows.map(|r| column.get_float_vector(r)).collect())
        }
        DataType::GeoPointVector => {
            Block::GeoPointVector(rows.map(|r| column.get_geo_point_vector(r)).collect())
        }
        DataType::TextVector => {
            Block::TextVector(rows.map(|r| column.get_text_vector(r)).collect())
        }
    }
}

fn zip<A, B, C>(a: Vec<A>, b: Vec<B>, f: impl Fn(A, B) -> C) -> Vec<C> {
    a.into_iter().zip(b).map(|(x, y)| f(x, y)).collect()
}

fn zip_ref<A, C>(a: &[A], b: &[A], f: impl Fn(&A, &A) -> C) -> Vec<C> {
    a.iter().zip(b.iter()).map(|(x, y)| f(x, y)).collect()
}

fn apply_unary(op: Operator, arg: Block) -> Result<Block> {
    Ok(match (op, arg) {
        (Operator::LogicalNot | Operator::BitwiseNot, Block::Bool(v)) => {
            Block::Bool(v.into_iter().map(|x| !x).collect())
        }
        (Operator::BitwiseNot, Block::Int(v)) => Block::Int(v.into_iter().map(|x| !x).collect()),
        (Operator::Positive, block @ (Block::Int(_) | Block::Float(_))) => block,
        (Operator::Negative, Block::Int(v)) => Block::Int(v.into_iter().map(|x| -x).collect()),
        (Operator::Negative, Block::Float(v)) => {
            Block::Float(v.into_iter().map(|x| -x).collect())
        }
        (Operator::ToInt, Block::Bool(v)) => Block::Int(
            v.into_iter()
                .map(|x| match x.to_option() {
                    Some(true) => Int::new(1),
                    Some(false) => Int::new(0),
                    None => Int::na(),
                })
                .collect(),
        ),
        (Operator::ToInt, block @ Block::Int(_)) => block,
        (Operator::ToInt, Block::Float(v)) => {
            Block::Int(v.into_iter().map(|x| x.to_int()).collect())
        }
        (Operator::ToFloat, Block::Int(v)) => Block::Float(
            v.into_iter()
                .map(|x| match x.to_option() {
                    Some(i) => Float::new(i as f64),
                    None => Float::na(),
                })
                .collect(),
        ),
        (Operator::ToFloat, block @ Block::Float(_)) => block,
        (Operator::ToBool, block @ Block::Bool(_)) => block,
        (Operator::ToGeoPoint, block @ Block::GeoPoint(_)) => block,
        (Operator::ToText, block @ Block::Text(_)) => block,
        _ => return Err(broken()),
    })
}

fn apply_binary(op: Operator, lhs: Block, rhs: Block) -> Result<Block> {
    use Operator::*;
    Ok(match (op, lhs, rhs) {
        // Logical and bitwise Bool operators share Kleene semantics.
        (LogicalAnd | BitwiseAnd, Block::Bool(a), Block::Bool(b)) => {
            Block::Bool(zip(a, b, |x, y| x & y))
        }
        (LogicalOr | BitwiseOr, Block::Bool(a), Block::Bool(b)) => {
            Block::Bool(zip(a, b, |x, y| x | y))
        }
        (LogicalXor | BitwiseXor, Block::Bool(a), Block::Bool(b)) => {
            Block::Bool(zip(a, b, |x, y| x ^ y))
        }
        (BitwiseAnd, Block::Int(a), Block::Int(b)) => Block::Int(zip(a, b, |x, y| x & y)),
        (BitwiseOr, Block::Int(a), Block::Int(b)) => Block::Int(zip(a, b, |x, y| x | y)),
        (BitwiseXor, Block::Int(a), Block::Int(b)) => Block::Int(zip(a, b, |x, y| x ^ y)),

        (Equal, Block::Bool(a), Block::Bool(b)) => Block::Bool(zip(a, b, |x, y| x.equal(y))),
        (NotEqual, Block::Bool(a), Block::Bool(b)) => {
            Block::Bool(zip(a, b, |x, y| x.not_equal(y)))
        }
        (Equal, Block::Int(a), Block::Int(b)) => Block::Bool(zip(a, b, |x, y| x.equal(y))),
        (NotEqual, Block::Int(a), Block::Int(b)) => Block::Bool(zip(a, b, |x, y| x.not_equal(y))),
        (Equal, Block::Float(a), Block::Float(b)) => Block::Bool(zip(a, b, |x, y| x.equal(y))),
        (NotEqual, Block::Float(a), Block::Float(b)) => {
            Block::Bool(zip(a, b, |x, y| x.not_equal(y)))
        }
        (Equal, Block::GeoPoint(a), Block::GeoPoint(b)) => {
            Block::Bool(zip(a, b, |x, y| x.equal(y)))
        }
        (NotEqual, Block::GeoPoint(a), Block::GeoPoint(b)) => {
            Block::Bool(zip(a, b, |x, y| x.not_equal(y)))
        }
        (Equal, Block::Text(a), Block::Text(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.equal(y)))
        }
        (NotEqual, Block::Text(a), Block::Text(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.not_equal(y)))
        }
        (Equal, Block::BoolVector(a), Block::BoolVector(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.equal(y)))
        }
        (NotEqual, Block::BoolVector(a), Block::BoolVector(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.not_equal(y)))
        }
        (Equal, Block::IntVector(a), Block::IntVector(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.equal(y)))
        }
        (NotEqual, Block::IntVector(a), Block::IntVector(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.not_equal(y)))
        }
        (Equal, Block::FloatVector(a), Block::FloatVector(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.equal(y)))
        }
        (NotEqual, Block::FloatVector(a), Block::FloatVector(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.not_equal(y)))
        }
        (Equal, Block::GeoPointVector(a), Block::GeoPointVector(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.equal(y)))
        }
        (NotEqual, Block::GeoPointVector(a), Block::GeoPointVector(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.not_equal(y)))
        }
        (Equal, Block::TextVector(a), Block::TextVector(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.equal(y)))
        }
        (NotEqual, Block::TextVector(a), Block::TextVector(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.not_equal(y)))
        }

        (Less, Block::Int(a), Block::Int(b)) => Block::Bool(zip(a, b, |x, y| x.less(y))),
        (LessEqual, Block::Int(a), Block::Int(b)) => {
            Block::Bool(zip(a, b, |x, y| x.less_equal(y)))
        }
        (Greater, Block::Int(a), Block::Int(b)) => Block::Bool(zip(a, b, |x, y| x.greater(y))),
        (GreaterEqual, Block::Int(a), Block::Int(b)) => {
            Block::Bool(zip(a, b, |x, y| x.greater_equal(y)))
        }
        (Less, Block::Float(a), Block::Float(b)) => Block::Bool(zip(a, b, |x, y| x.less(y))),
        (LessEqual, Block::Float(a), Block::Float(b)) => {
            Block::Bool(zip(a, b, |x, y| x.less_equal(y)))
        }
        (Greater, Block::Float(a), Block::Float(b)) => {
            Block::Bool(zip(a, b, |x, y| x.greater(y)))
        }
        (GreaterEqual, Block::Float(a), Block::Float(b)) => {
            Block::Bool(zip(a, b, |x, y| x.greater_equal(y)))
        }
        (Less, Block::GeoPoint(a), Block::GeoPoint(b)) => {
            Block::Bool(zip(a, b, |x, y| x.less(y)))
        }
        (LessEqual, Block::GeoPoint(a), Block::GeoPoint(b)) => {
            Block::Bool(zip(a, b, |x, y| x.less_equal(y)))
        }
        (Greater, Block::GeoPoint(a), Block::GeoPoint(b)) => {
            Block::Bool(zip(a, b, |x, y| x.greater(y)))
        }
        (GreaterEqual, Block::GeoPoint(a), Block::GeoPoint(b)) => {
            Block::Bool(zip(a, b, |x, y| x.greater_equal(y)))
        }
        (Less, Block::Text(a), Block::Text(b)) => Block::Bool(zip_ref(&a, &b, |x, y| x.less(y))),
        (LessEqual, Block::Text(a), Block::Text(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.less_equal(y)))
        }
        (Greater, Block::Text(a), Block::Text(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.greater(y)))
        }
        (GreaterEqual, Block::Text(a), Block::Text(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.greater_equal(y)))
        }

        (Plus, Block::Int(a), Block::Int(b)) => Block::Int(zip(a, b, |x, y| x + y)),
        (Minus, Block::Int(a), Block::Int(b)) => Block::Int(zip(a, b, |x, y| x - y)),
        (Multiplication, Block::Int(a), Block::Int(b)) => Block::Int(zip(a, b, |x, y| x * y)),
        (Division, Block::Int(a), Block::Int(b)) => Block::Int(zip(a, b, |x, y| x / y)),
        (Modulus, Block::Int(a), Block::Int(b)) => Block::Int(zip(a, b, |x, y| x % y)),
        (Plus, Block::Float(a), Block::Float(b)) => Block::Float(zip(a, b, |x, y| x + y)),
        (Minus, Block::Float(a), Block::Float(b)) => Block::Float(zip(a, b, |x, y| x - y)),
        (Multiplication, Block::Float(a), Block::Float(b)) => {
            Block::Float(zip(a, b, |x, y| x * y))
        }
        (Division, Block::Float(a), Block::Float(b)) => Block::Float(zip(a, b, |x, y| x / y)),

        (Subscript, Block::Text(a), Block::Int(b)) => {
            Block::Int(zip(a, b, |x, y| x.get(y)))
        }
        (Subscript, Block::BoolVector(a), Block::Int(b)) => {
            Block::Bool(zip(a, b, |x, y| x.get(y)))
        }
        (Subscript, Block::IntVector(a), Block::Int(b)) => {
            Block::Int(zip(a, b, |x, y| x.get(y)))
        }
        (Subscript, Block::FloatVector(a), Block::Int(b)) => {
            Block::Float(zip(a, b, |x, y| x.get(y)))
        }
        (Subscript, Block::GeoPointVector(a), Block::Int(b)) => {
            Block::GeoPoint(zip(a, b, |x, y| x.get(y)))
        }
        (Subscript, Block::TextVector(a), Block::Int(b)) => {
            Block::Text(zip(a, b, |x, y| x.get(y)))
        }

        (StartsWith, Block::Text(a), Block::Text(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.starts_with(y)))
        }
        (EndsWith, Block::Text(a), Block::Text(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.ends_with(y)))
        }
        (Contains, Block::Text(a), Block::Text(b)) => {
            Block::Bool(zip_ref(&a, &b, |x, y| x.contains(y)))
        }

        _ => return Err(broken()),
    })
}
