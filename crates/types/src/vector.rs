use crate::{Bool, DataType, Int, ValueType};

/// A finite sequence of scalar values, or N/A.
///
/// The empty vector is a valid value, distinct from N/A. Vectors have no
/// ordering; they support equality, size and subscript only.
#[derive(Clone, Debug, PartialEq)]
pub struct Vector<T>(Option<Box<[T]>>);

impl<T: ValueType> Vector<T> {
    pub fn new(elements: impl Into<Box<[T]>>) -> Self {
        Vector(Some(elements.into()))
    }

    pub fn na() -> Self {
        Vector(None)
    }

    pub fn is_na(&self) -> bool {
        self.0.is_none()
    }

    pub fn elements(&self) -> Option<&[T]> {
        self.0.as_deref()
    }

    /// The number of elements, or N/A.
    pub fn size(&self) -> Int {
        match &self.0 {
            Some(elements) => Int::new(elements.len() as i64),
            None => Int::na(),
        }
    }

    /// The element at `index`, or N/A when out of range.
    pub fn get(&self, index: Int) -> T {
        match (&self.0, index.to_option()) {
            (Some(elements), Some(i)) if i >= 0 && (i as usize) < elements.len() => {
                elements[i as usize].clone()
            }
            _ => T::na(),
        }
    }

    /// Three-valued equality: N/A operands and size mismatches yield N/A;
    /// otherwise elements are compared by exact match.
    pub fn equal(&self, other: &Self) -> Bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => {
                if a.len() != b.len() {
                    return Bool::Na;
                }
                Bool::new(a.iter().zip(b.iter()).all(|(x, y)| x.matches(y)))
            }
            _ => Bool::Na,
        }
    }

    pub fn not_equal(&self, other: &Self) -> Bool {
        !self.equal(other)
    }
}

impl<T: ValueType> Default for Vector<T> {
    fn default() -> Self {
        Vector::na()
    }
}

impl<T: ValueType> From<Vec<T>> for Vector<T> {
    fn from(elements: Vec<T>) -> Self {
        Vector::new(elements)
    }
}

impl<T: ValueType> ValueType for Vector<T> {
    const DATA_TYPE: DataType = match T::DATA_TYPE {
        DataType::Bool => DataType::BoolVector,
        DataType::Int => DataType::IntVector,
        DataType::Float => DataType::FloatVector,
        DataType::GeoPoint => DataType::GeoPointVector,
        DataType::Text => DataType::TextVector,
        // Vectors of vectors do not exist in the universe.
        _ => panic!("vector element must be a scalar type"),
    };

    fn na() -> Self {
        Vector::na()
    }

    fn is_na(&self) -> bool {
        Vector::is_na(self)
    }

    fn matches(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.matches(y))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Float;

    #[test]
    fn size_and_subscript() {
        let v = Vector::<Int>::new(vec![Int::new(1), Int::na(), Int::new(3)]);
        assert_eq!(v.size(), Int::new(3));
        assert_eq!(v.get(Int::new(0)), Int::new(1));
        assert!(v.get(Int::new(1)).is_na());
        assert!(v.get(Int::new(3)).is_na());
        assert!(Vector::<Int>::na().size().is_na());
    }

    #[test]
    fn equality_is_elementwise_match() {
        let a = Vector::<Float>::new(vec![Float::new(1.0), Float::na()]);
        let b = Vector::<Float>::new(vec![Float::new(1.0), Float::na()]);
        let c = Vector::<Float>::new(vec![Float::new(1.0)]);
        assert_eq!(a.equal(&b), Bool::True);
        assert_eq!(a.equal(&c), Bool::Na);
        assert_eq!(a.equal(&Vector::na()), Bool::Na);
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
    }
}
