use std::fmt;

/// The tag of every storable type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DataType {
    Bool,
    Int,
    Float,
    GeoPoint,
    Text,
    BoolVector,
    IntVector,
    FloatVector,
    GeoPointVector,
    TextVector,
}

impl DataType {
    pub fn is_scalar(self) -> bool {
        !self.is_vector()
    }

    pub fn is_vector(self) -> bool {
        matches!(
            self,
            DataType::BoolVector
                | DataType::IntVector
                | DataType::FloatVector
                | DataType::GeoPointVector
                | DataType::TextVector
        )
    }

    /// The element type of a vector type; scalars return themselves.
    pub fn scalar_type(self) -> DataType {
        match self {
            DataType::BoolVector => DataType::Bool,
            DataType::IntVector => DataType::Int,
            DataType::FloatVector => DataType::Float,
            DataType::GeoPointVector => DataType::GeoPoint,
            DataType::TextVector => DataType::Text,
            scalar => scalar,
        }
    }

    /// The vector type over a scalar, if one exists.
    pub fn vector_type(self) -> Option<DataType> {
        match self {
            DataType::Bool => Some(DataType::BoolVector),
            DataType::Int => Some(DataType::IntVector),
            DataType::Float => Some(DataType::FloatVector),
            DataType::GeoPoint => Some(DataType::GeoPointVector),
            DataType::Text => Some(DataType::TextVector),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Bool => "Bool",
            DataType::Int => "Int",
            DataType::Float => "Float",
            DataType::GeoPoint => "GeoPoint",
            DataType::Text => "Text",
            DataType::BoolVector => "Vector<Bool>",
            DataType::IntVector => "Vector<Int>",
            DataType::FloatVector => "Vector<Float>",
            DataType::GeoPointVector => "Vector<GeoPoint>",
            DataType::TextVector => "Vector<Text>",
        };
        f.write_str(name)
    }
}
