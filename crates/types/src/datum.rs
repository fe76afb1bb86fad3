use enum_as_inner::EnumAsInner;

use crate::{Bool, DataType, Float, GeoPoint, Int, Text, Vector};

/// A tagged union carrying one value of any type.
///
/// Its sole purpose is to pass typed payloads across untyped API
/// boundaries (column set/get, expression constants, insert-by-key).
/// `Datum::Na` is the typeless missing value, accepted wherever any
/// type's N/A would be.
#[derive(Clone, Debug, PartialEq, EnumAsInner)]
pub enum Datum {
    Na,
    Bool(Bool),
    Int(Int),
    Float(Float),
    GeoPoint(GeoPoint),
    Text(Text),
    BoolVector(Vector<Bool>),
    IntVector(Vector<Int>),
    FloatVector(Vector<Float>),
    GeoPointVector(Vector<GeoPoint>),
    TextVector(Vector<Text>),
}

impl Datum {
    /// The payload's type tag; `None` for the typeless N/A.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Datum::Na => None,
            Datum::Bool(_) => Some(DataType::Bool),
            Datum::Int(_) => Some(DataType::Int),
            Datum::Float(_) => Some(DataType::Float),
            Datum::GeoPoint(_) => Some(DataType::GeoPoint),
            Datum::Text(_) => Some(DataType::Text),
            Datum::BoolVector(_) => Some(DataType::BoolVector),
            Datum::IntVector(_) => Some(DataType::IntVector),
            Datum::FloatVector(_) => Some(DataType::FloatVector),
            Datum::GeoPointVector(_) => Some(DataType::GeoPointVector),
            Datum::TextVector(_) => Some(DataType::TextVector),
        }
    }

    /// Whether the datum is the typeless N/A or a typed N/A payload.
    pub fn is_missing(&self) -> bool {
        match self {
            Datum::Na => true,
            Datum::Bool(v) => v.is_na(),
            Datum::Int(v) => v.is_na(),
            Datum::Float(v) => v.is_na(),
            Datum::GeoPoint(v) => v.is_na(),
            Datum::Text(v) => v.is_na(),
            Datum::BoolVector(v) => v.is_na(),
            Datum::IntVector(v) => v.is_na(),
            Datum::FloatVector(v) => v.is_na(),
            Datum::GeoPointVector(v) => v.is_na(),
            Datum::TextVector(v) => v.is_na(),
        }
    }

    /// Numeric coercion to `Int`: Bool maps to 0/1, Float truncates
    /// toward zero. Anything else is N/A.
    pub fn force_int(&self) -> Int {
        match self {
            Datum::Na => Int::na(),
            Datum::Bool(v) => match v.to_option() {
                Some(true) => Int::new(1),
                Some(false) => Int::new(0),
                None => Int::na(),
            },
            Datum::Int(v) => *v,
            Datum::Float(v) => v.to_int(),
            _ => Int::na(),
        }
    }

    /// Numeric coercion to `Float`. Anything non-numeric is N/A.
    pub fn force_float(&self) -> Float {
        match self {
            Datum::Na => Float::na(),
            Datum::Int(v) => match v.to_option() {
                Some(i) => Float::new(i as f64),
                None => Float::na(),
            },
            Datum::Float(v) => *v,
            _ => Float::na(),
        }
    }
}

macro_rules! datum_from {
    ($($variant:ident($ty:ty),)*) => {
        $(
            impl From<$ty> for Datum {
                fn from(value: $ty) -> Self {
                    Datum::$variant(value)
                }
            }
        )*
    };
}

datum_from! {
    Bool(Bool),
    Int(Int),
    Float(Float),
    GeoPoint(GeoPoint),
    Text(Text),
    BoolVector(Vector<Bool>),
    IntVector(Vector<Int>),
    FloatVector(Vector<Float>),
    GeoPointVector(Vector<GeoPoint>),
    TextVector(Vector<Text>),
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::Text(Text::from(value))
    }
}

impl From<i64> for Datum {
    fn from(value: i64) -> Self {
        Datum::Int(Int::new(value))
    }
}

impl From<f64> for Datum {
    fn from(value: f64) -> Self {
        Datum::Float(Float::new(value))
    }
}

impl From<bool> for Datum {
    fn from(value: bool) -> Self {
        Datum::Bool(Bool::new(value))
    }
}
