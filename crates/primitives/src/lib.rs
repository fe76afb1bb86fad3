//! Small identifier newtypes shared by the whole engine.
//!
//! Ids are dense handles into the owning collection, never content hashes.
//! They implement [`nohash_hasher::IsEnabled`] so they can key an
//! [`IntMap`] without a real hash function.

use core::fmt;
use std::hash::BuildHasherDefault;

use nohash_hasher::NoHashHasher;

/// A `HashMap` keyed by a dense id, with the identity hash.
pub type IntMap<K, V> = std::collections::HashMap<K, V, BuildHasherDefault<NoHashHasher<K>>>;

macro_rules! id_type {
    ($(#[doc = $doc:expr] $name:ident,)*) => {
        $(
            #[doc = $doc]
            #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
            pub struct $name(pub u32);

            impl $name {
                pub fn idx(self) -> usize {
                    self.0 as usize
                }
            }

            impl nohash_hasher::IsEnabled for $name {}

            impl From<u32> for $name {
                fn from(id: u32) -> Self {
                    Self(id)
                }
            }

            impl From<usize> for $name {
                fn from(id: usize) -> Self {
                    Self(id as u32)
                }
            }

            impl From<$name> for u32 {
                fn from(id: $name) -> u32 {
                    id.0
                }
            }

            impl From<$name> for usize {
                fn from(id: $name) -> usize {
                    id.0 as usize
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

id_type! {
    #[doc = "The id of a table within its database, in creation order."]
    TableId,
    #[doc = "The id of a column within its table, in creation order."]
    ColumnId,
    #[doc = "The id of an index within its column."]
    IndexId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_usize() {
        let t = TableId::from(7usize);
        assert_eq!(t.idx(), 7);
        assert_eq!(u32::from(t), 7);
        assert_eq!(TableId::from(7u32), t);
    }

    #[test]
    fn int_map_works_with_ids() {
        let mut map: IntMap<ColumnId, &str> = IntMap::default();
        map.insert(ColumnId(3), "x");
        assert_eq!(map.get(&ColumnId(3)), Some(&"x"));
        assert_eq!(map.get(&ColumnId(4)), None);
    }
}
