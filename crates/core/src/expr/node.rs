use tabula_primitives::{ColumnId, TableId};
use tabula_types::{DataType, Datum};

use crate::db::Db;
use crate::error::{ExprError, Result};

/// Every operator the builder accepts. Unary operators pop one operand,
/// binary operators pop two.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operator {
    // Unary.
    LogicalNot,
    BitwiseNot,
    Positive,
    Negative,
    ToBool,
    ToInt,
    ToFloat,
    ToGeoPoint,
    ToText,
    // Binary.
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    Plus,
    Minus,
    Multiplication,
    Division,
    Modulus,
    Subscript,
    StartsWith,
    EndsWith,
    Contains,
}

impl Operator {
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            Operator::LogicalNot
                | Operator::BitwiseNot
                | Operator::Positive
                | Operator::Negative
                | Operator::ToBool
                | Operator::ToInt
                | Operator::ToFloat
                | Operator::ToGeoPoint
                | Operator::ToText
        )
    }

    pub fn is_binary(self) -> bool {
        !self.is_unary()
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Operator::LogicalNot => "LOGICAL_NOT",
            Operator::BitwiseNot => "BITWISE_NOT",
            Operator::Positive => "POSITIVE",
            Operator::Negative => "NEGATIVE",
            Operator::ToBool => "TO_BOOL",
            Operator::ToInt => "TO_INT",
            Operator::ToFloat => "TO_FLOAT",
            Operator::ToGeoPoint => "TO_GEO_POINT",
            Operator::ToText => "TO_TEXT",
            Operator::LogicalAnd => "LOGICAL_AND",
            Operator::LogicalOr => "LOGICAL_OR",
            Operator::LogicalXor => "LOGICAL_XOR",
            Operator::Equal => "EQUAL",
            Operator::NotEqual => "NOT_EQUAL",
            Operator::Less => "LESS",
            Operator::LessEqual => "LESS_EQUAL",
            Operator::Greater => "GREATER",
            Operator::GreaterEqual => "GREATER_EQUAL",
            Operator::BitwiseAnd => "BITWISE_AND",
            Operator::BitwiseOr => "BITWISE_OR",
            Operator::BitwiseXor => "BITWISE_XOR",
            Operator::Plus => "PLUS",
            Operator::Minus => "MINUS",
            Operator::Multiplication => "MULTIPLICATION",
            Operator::Division => "DIVISION",
            Operator::Modulus => "MODULUS",
            Operator::Subscript => "SUBSCRIPT",
            Operator::StartsWith => "STARTS_WITH",
            Operator::EndsWith => "ENDS_WITH",
            Operator::Contains => "CONTAINS",
        }
    }
}

/// A compiled expression node. Construction goes through the builder,
/// which validates operand types, so evaluation can assume they fit.
#[derive(Clone, Debug)]
pub(crate) enum Node {
    Constant(Datum),
    Column {
        table: TableId,
        column: ColumnId,
        data_type: DataType,
    },
    /// The `_id` pseudo column.
    RowId,
    /// The `_score` pseudo column.
    Score,
    Unary {
        op: Operator,
        data_type: DataType,
        arg: Box<Node>,
    },
    Binary {
        op: Operator,
        data_type: DataType,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    /// Evaluates `expr` against `table` for the rows named by the
    /// reference values of `ref_node`.
    Dereference {
        ref_node: Box<Node>,
        table: TableId,
        expr: Box<Node>,
        data_type: DataType,
    },
}

impl Node {
    pub(crate) fn data_type(&self) -> DataType {
        match self {
            Node::Constant(datum) => datum.data_type().unwrap_or(DataType::Bool),
            Node::Column { data_type, .. } => *data_type,
            Node::RowId => DataType::Int,
            Node::Score => DataType::Float,
            Node::Unary { data_type, .. } => *data_type,
            Node::Binary { data_type, .. } => *data_type,
            Node::Dereference { data_type, .. } => *data_type,
        }
    }
}

/// The table a node's value points into, when the node is (or wraps) a
/// reference column. Subscripting a Vector<Int> reference keeps the
/// target; so does a dereference whose inner expression is a reference.
pub(crate) fn reference_target(node: &Node, db: &Db) -> Option<TableId> {
    match node {
        Node::Column { table, column, .. } => db
            .table(*table)
            .ok()?
            .column_by_id(*column)
            .ok()?
            .reference_table(),
        Node::Binary {
            op: Operator::Subscript,
            lhs,
            ..
        } => reference_target(lhs, db),
        Node::Dereference { expr, .. } => reference_target(expr, db),
        _ => None,
    }
}

/// The result type of applying `op` to operand types, or
/// `INVALID_OPERAND`. This is the single place expression types are
/// validated; it consumes nothing, so a failed push leaves the builder
/// stack as it was.
pub(crate) fn result_type(op: Operator, operands: &[DataType]) -> Result<DataType> {
    use DataType::*;
    if op.is_unary() {
        let at = operands[0];
        let out = match (op, at) {
            (Operator::LogicalNot, Bool) => Bool,
            (Operator::BitwiseNot, Bool) => Bool,
            (Operator::BitwiseNot, Int) => Int,
            (Operator::Positive | Operator::Negative, Int) => Int,
            (Operator::Positive | Operator::Negative, Float) => Float,
            (Operator::ToBool, Bool) => Bool,
            (Operator::ToInt, Bool | Int | Float) => Int,
            (Operator::ToFloat, Int | Float) => Float,
            (Operator::ToGeoPoint, GeoPoint) => GeoPoint,
            (Operator::ToText, Text) => Text,
            _ => return Err(ExprError::InvalidOperand(at.to_string(), op.name()).into()),
        };
        return Ok(out);
    }
    let (lt, rt) = (operands[0], operands[1]);
    let out = match op {
        Operator::LogicalAnd | Operator::LogicalOr | Operator::LogicalXor => match (lt, rt) {
            (Bool, Bool) => Bool,
            _ => return invalid(op, lt, rt),
        },
        Operator::Equal | Operator::NotEqual => {
            if lt == rt {
                Bool
            } else {
                return invalid(op, lt, rt);
            }
        }
        Operator::Less | Operator::LessEqual | Operator::Greater | Operator::GreaterEqual => {
            match (lt, rt) {
                (Int, Int) | (Float, Float) | (Text, Text) | (GeoPoint, GeoPoint) => Bool,
                _ => return invalid(op, lt, rt),
            }
        }
        Operator::BitwiseAnd | Operator::BitwiseOr | Operator::BitwiseXor => match (lt, rt) {
            (Bool, Bool) => Bool,
            (Int, Int) => Int,
            _ => return invalid(op, lt, rt),
        },
        Operator::Plus | Operator::Minus | Operator::Multiplication | Operator::Division => {
            match (lt, rt) {
                (Int, Int) => Int,
                (Float, Float) => Float,
                _ => return invalid(op, lt, rt),
            }
        }
        Operator::Modulus => match (lt, rt) {
            (Int, Int) => Int,
            _ => return invalid(op, lt, rt),
        },
        Operator::Subscript => match (lt, rt) {
            (Text, Int) => Int,
            (BoolVector, Int) => Bool,
            (IntVector, Int) => Int,
            (FloatVector, Int) => Float,
            (GeoPointVector, Int) => GeoPoint,
            (TextVector, Int) => Text,
            _ => return invalid(op, lt, rt),
        },
        Operator::StartsWith | Operator::EndsWith | Operator::Contains => match (lt, rt) {
            (Text, Text) => Bool,
            _ => return invalid(op, lt, rt),
        },
        _ => return invalid(op, lt, rt),
    };
    Ok(out)
}

fn invalid(op: Operator, lt: DataType, rt: DataType) -> Result<DataType> {
    Err(ExprError::InvalidOperand(format!("{lt}, {rt}"), op.name()).into())
}

/// Wraps already-type-checked operands into the operator node.
pub(crate) fn build_node(op: Operator, data_type: DataType, mut operands: Vec<Node>) -> Node {
    if op.is_unary() {
        let arg = operands.pop().expect("arity checked by the builder");
        Node::Unary {
            op,
            data_type,
            arg: Box::new(arg),
        }
    } else {
        let rhs = operands.pop().expect("arity checked by the builder");
        let lhs = operands.pop().expect("arity checked by the builder");
        Node::Binary {
            op,
            data_type,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}
