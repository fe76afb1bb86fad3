use tabula_primitives::{ColumnId, TableId};
use tabula_types::DataType;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The closed set of error kinds every error maps onto.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    NotRemovable,
    InvalidName,
    NoKeyColumn,
    InvalidArgument,
    InvalidOperation,
    InvalidOperand,
    NoMemory,
    NotSupportedYet,
    Broken,
}

#[derive(Error, Debug, PartialEq)]
pub enum TableError {
    #[error("table `{0}` not found")]
    NotFound(String),
    #[error("table with id `{0}` not found")]
    IdNotFound(TableId),
    #[error("table `{0}` already exists")]
    Exists(String),
    #[error("`{0}` is not a valid name")]
    InvalidName(String),
    #[error("table `{0}` is referenced by {1} foreign column(s)")]
    NotRemovable(String, usize),
    #[error("row {0} is not live")]
    RowNotFound(i64),
    #[error("row {0} is already live")]
    RowExists(i64),
    #[error("row id {0} is out of range")]
    RowIdOutOfRange(i64),
    #[error("table `{0}` has no key column")]
    NoKeyColumn(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum ColumnError {
    #[error("column `{0}` not found")]
    NotFound(String),
    #[error("column with id `{0}` not found")]
    IdNotFound(ColumnId),
    #[error("column `{0}` already exists")]
    Exists(String),
    #[error("`{0}` is not a valid name")]
    InvalidName(String),
    #[error("column `{column}` stores {expected}, got {found}")]
    WrongType {
        column: String,
        expected: DataType,
        found: String,
    },
    #[error("N/A cannot be stored into key column `{0}`")]
    NaKey(String),
    #[error("key `{key}` already exists in column `{column}`")]
    DuplicateKey { column: String, key: String },
    #[error("column `{0}` is already the key column")]
    AlreadyKey(String),
    #[error("table already has key column `{0}`")]
    KeyColumnExists(String),
    #[error("column `{0}` is not the key column")]
    NotKey(String),
    #[error("column `{column}` contains N/A at row {row} and cannot become the key")]
    KeyHasNa { column: String, row: i64 },
    #[error("{0} columns cannot be key columns")]
    UnsupportedKeyType(DataType),
    #[error("reference columns cannot be key columns")]
    ReferenceKey,
    #[error("row {row} is not live in referenced table `{table}`")]
    DanglingReference { table: String, row: i64 },
    #[error("{0} columns cannot reference a table")]
    UnsupportedReferenceType(DataType),
}

#[derive(Error, Debug, PartialEq)]
pub enum IndexError {
    #[error("index `{0}` not found")]
    NotFound(String),
    #[error("index `{0}` already exists")]
    Exists(String),
    #[error("`{0}` is not a valid name")]
    InvalidName(String),
    #[error("column `{0}` contains duplicate values")]
    NotUnique(String),
    #[error("{0} columns cannot be indexed yet")]
    UnsupportedType(DataType),
    #[error("hash indexes do not support {0} search yet")]
    UnsupportedSearch(&'static str),
}

#[derive(Error, Debug, PartialEq)]
pub enum ExprError {
    #[error("operator needs {required} operand(s), stack holds {found}")]
    MissingOperands { required: usize, found: usize },
    #[error("operand types {0} do not fit operator {1}")]
    InvalidOperand(String, &'static str),
    #[error("a constant must carry a typed value")]
    NaConstant,
    #[error("the stack holds {0} nodes at release, expected exactly one")]
    UnbalancedStack(usize),
    #[error("no subexpression is open")]
    NoSubexpression,
    #[error("a subexpression is still open")]
    OpenSubexpression,
    #[error("the node under a subexpression must be a reference column")]
    NotAReference,
    #[error("expression yields {found}, expected {expected}")]
    ResultType { expected: DataType, found: DataType },
    #[error("parse error at byte {at}: {message}")]
    Parse { at: usize, message: String },
}

#[derive(Error, Debug, PartialEq)]
pub enum PipelineError {
    #[error("stage needs {required} input(s), stack holds {found}")]
    MissingInputs { required: usize, found: usize },
    #[error("the stack holds {0} nodes at release, expected exactly one")]
    UnbalancedStack(usize),
    #[error("sort keys must be scalar, got {0}")]
    UnsortableKey(DataType),
    #[error("a sorter needs at least one key")]
    NoKeys,
}

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("TableError: {0}")]
    Table(#[from] TableError),
    #[error("ColumnError: {0}")]
    Column(#[from] ColumnError),
    #[error("IndexError: {0}")]
    Index(#[from] IndexError),
    #[error("ExprError: {0}")]
    Expr(#[from] ExprError),
    #[error("PipelineError: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("allocation of {0} bytes failed")]
    NoMemory(usize),
    #[error("internal invariant broken: {0}")]
    Broken(&'static str),
}

impl Error {
    /// Maps every error onto the closed kind set.
    pub fn kind(&self) -> ErrorKind {
        use ErrorKind::*;
        match self {
            Error::Table(e) => match e {
                TableError::NotFound(_) | TableError::IdNotFound(_) => NotFound,
                TableError::Exists(_) | TableError::RowExists(_) => AlreadyExists,
                TableError::InvalidName(_) => InvalidName,
                TableError::NotRemovable(..) => NotRemovable,
                TableError::RowNotFound(_) | TableError::RowIdOutOfRange(_) => InvalidArgument,
                TableError::NoKeyColumn(_) => NoKeyColumn,
            },
            Error::Column(e) => match e {
                ColumnError::NotFound(_) | ColumnError::IdNotFound(_) => NotFound,
                ColumnError::Exists(_)
                | ColumnError::DuplicateKey { .. }
                | ColumnError::KeyColumnExists(_) => AlreadyExists,
                ColumnError::InvalidName(_) => InvalidName,
                ColumnError::AlreadyKey(_) | ColumnError::NotKey(_) => InvalidOperation,
                ColumnError::WrongType { .. }
                | ColumnError::NaKey(_)
                | ColumnError::KeyHasNa { .. }
                | ColumnError::UnsupportedKeyType(_)
                | ColumnError::ReferenceKey
                | ColumnError::DanglingReference { .. }
                | ColumnError::UnsupportedReferenceType(_) => InvalidArgument,
            },
            Error::Index(e) => match e {
                IndexError::NotFound(_) => NotFound,
                IndexError::Exists(_) => AlreadyExists,
                IndexError::InvalidName(_) => InvalidName,
                IndexError::NotUnique(_) => AlreadyExists,
                IndexError::UnsupportedType(_) | IndexError::UnsupportedSearch(_) => {
                    NotSupportedYet
                }
            },
            Error::Expr(e) => match e {
                ExprError::InvalidOperand(..) | ExprError::NotAReference => InvalidOperand,
                ExprError::NaConstant | ExprError::ResultType { .. } => InvalidArgument,
                ExprError::Parse { .. } => InvalidArgument,
                ExprError::MissingOperands { .. }
                | ExprError::UnbalancedStack(_)
                | ExprError::NoSubexpression
                | ExprError::OpenSubexpression => InvalidOperation,
            },
            Error::Pipeline(e) => match e {
                PipelineError::MissingInputs { .. } | PipelineError::UnbalancedStack(_) => {
                    InvalidOperation
                }
                PipelineError::UnsortableKey(_) | PipelineError::NoKeys => InvalidArgument,
            },
            Error::NoMemory(_) => NoMemory,
            Error::Broken(_) => Broken,
        }
    }
}
