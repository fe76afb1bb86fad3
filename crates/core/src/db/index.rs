use std::collections::BTreeSet;
use std::ops::Bound;

use indexmap::IndexMap;
use itertools::Either;
use smallvec::SmallVec;
use tabula_primitives::IndexId;
use tabula_types::{Datum, Int};

use crate::db::cursor::{Cursor, CursorOptions, IterCursor, OrderType};
use crate::error::{IndexError, Result};

/// The two concrete index shapes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IndexType {
    /// Ordered; supports ranges and prefix search.
    Tree,
    /// Unordered; supports exact match only.
    Hash,
}

/// Whether a range end point includes its bound.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum EndPointType {
    #[default]
    Inclusive,
    Exclusive,
}

/// A half- or fully-bounded key range for tree-index search.
#[derive(Clone, Debug, Default)]
pub struct IndexRange {
    lower: Option<(Datum, EndPointType)>,
    upper: Option<(Datum, EndPointType)>,
}

impl IndexRange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_lower_bound(&mut self, value: Datum, point: EndPointType) {
        self.lower = Some((value, point));
    }

    pub fn set_upper_bound(&mut self, value: Datum, point: EndPointType) {
        self.upper = Some((value, point));
    }

    pub fn unset_lower_bound(&mut self) {
        self.lower = None;
    }

    pub fn unset_upper_bound(&mut self) {
        self.upper = None;
    }
}

/// A normalized, ordered, hashable index key. N/A is never a key.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub(crate) enum IndexKey {
    Bool(bool),
    Int(i64),
    /// Order-preserving bit image of an f64 (sign-flip trick). NaN never
    /// reaches an index, so total order over the rest is enough.
    Float(u64),
    GeoPoint(i32, i32),
    Text(Box<[u8]>),
}

fn float_bits(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits >> 63 == 1 {
        !bits
    } else {
        bits ^ (1 << 63)
    }
}

impl IndexKey {
    /// Builds a key from a typed datum; `None` for N/A (which is never
    /// indexed) and for vector payloads (which are not indexable).
    pub(crate) fn from_datum(datum: &Datum) -> Option<IndexKey> {
        match datum {
            Datum::Bool(v) => v.to_option().map(IndexKey::Bool),
            Datum::Int(v) => v.to_option().map(IndexKey::Int),
            Datum::Float(v) => v.to_option().map(|f| IndexKey::Float(float_bits(f))),
            Datum::GeoPoint(v) => match (v.latitude().to_option(), v.longitude().to_option()) {
                (Some(lat), Some(lon)) => Some(IndexKey::GeoPoint(lat as i32, lon as i32)),
                _ => None,
            },
            Datum::Text(v) => v.bytes().map(|b| IndexKey::Text(b.into())),
            _ => None,
        }
    }
}

/// An index attached to a column. Keys are the column's non-N/A values.
#[derive(Debug)]
pub struct Index {
    id: IndexId,
    name: String,
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    Tree(BTreeSet<(IndexKey, i64)>),
    // A SmallVec avoids the allocation for the common unique case.
    Hash(IndexMap<IndexKey, SmallVec<[i64; 1]>>),
}

impl Index {
    pub(crate) fn new(id: IndexId, name: String, index_type: IndexType) -> Self {
        let inner = match index_type {
            IndexType::Tree => Inner::Tree(BTreeSet::new()),
            IndexType::Hash => Inner::Hash(IndexMap::new()),
        };
        Index { id, name, inner }
    }

    pub fn id(&self) -> IndexId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index_type(&self) -> IndexType {
        match self.inner {
            Inner::Tree(_) => IndexType::Tree,
            Inner::Hash(_) => IndexType::Hash,
        }
    }

    pub fn num_entries(&self) -> usize {
        match &self.inner {
            Inner::Tree(set) => set.len(),
            Inner::Hash(map) => map.values().map(SmallVec::len).sum(),
        }
    }

    /// Inserts an entry. N/A keys are silently skipped.
    pub(crate) fn insert(&mut self, row_id: i64, key: Option<IndexKey>) {
        let Some(key) = key else { return };
        match &mut self.inner {
            Inner::Tree(set) => {
                set.insert((key, row_id));
            }
            Inner::Hash(map) => {
                map.entry(key).or_default().push(row_id);
            }
        }
    }

    pub(crate) fn remove(&mut self, row_id: i64, key: Option<IndexKey>) {
        let Some(key) = key else { return };
        match &mut self.inner {
            Inner::Tree(set) => {
                set.remove(&(key, row_id));
            }
            Inner::Hash(map) => {
                if let Some(rows) = map.get_mut(&key) {
                    if let Some(at) = rows.iter().position(|&r| r == row_id) {
                        rows.swap_remove(at);
                    }
                    if rows.is_empty() {
                        map.swap_remove(&key);
                    }
                }
            }
        }
    }

    pub(crate) fn contains_key(&self, key: &IndexKey) -> bool {
        match &self.inner {
            Inner::Tree(_) => self.rows_matching(key).next().is_some(),
            Inner::Hash(map) => map.contains_key(key),
        }
    }

    pub(crate) fn find_one_key(&self, key: &IndexKey) -> Option<i64> {
        self.rows_matching(key).next()
    }

    /// All rows whose value matches `key`, in key order for trees.
    fn rows_matching<'a>(&'a self, key: &IndexKey) -> impl Iterator<Item = i64> + 'a {
        match &self.inner {
            Inner::Tree(set) => Either::Left(
                set.range((
                    Bound::Included((key.clone(), i64::MIN)),
                    Bound::Included((key.clone(), i64::MAX)),
                ))
                .map(|(_, row)| *row),
            ),
            Inner::Hash(map) => Either::Right(
                map.get(key)
                    .map(|rows| rows.iter().copied())
                    .into_iter()
                    .flatten(),
            ),
        }
    }

    /// Whether the datum has at least one entry.
    pub fn contains(&self, value: &Datum) -> bool {
        IndexKey::from_datum(value).is_some_and(|key| self.contains_key(&key))
    }

    /// Any row matching the datum, or N/A.
    pub fn find_one(&self, value: &Datum) -> Int {
        IndexKey::from_datum(value)
            .and_then(|key| self.find_one_key(&key))
            .map(Int::new)
            .unwrap_or_else(Int::na)
    }

    /// True iff no two entries share a key.
    pub fn test_uniqueness(&self) -> bool {
        match &self.inner {
            Inner::Tree(set) => {
                let mut previous: Option<&IndexKey> = None;
                for (key, _) in set {
                    if previous == Some(key) {
                        return false;
                    }
                    previous = Some(key);
                }
                true
            }
            Inner::Hash(map) => map.values().all(|rows| rows.len() <= 1),
        }
    }

    /// A cursor over all rows matching `value`.
    pub fn find<'a>(
        &'a self,
        value: &Datum,
        options: CursorOptions,
    ) -> Result<Box<dyn Cursor + 'a>> {
        let Some(key) = IndexKey::from_datum(value) else {
            return Ok(Box::new(IterCursor::new(std::iter::empty(), &options)));
        };
        let rows: Vec<i64> = self.rows_matching(&key).collect();
        Ok(Box::new(directed(rows, options)))
    }

    /// A cursor over all rows whose key falls in `range`, in key order.
    /// Tree indexes only.
    pub fn find_in_range<'a>(
        &'a self,
        range: &IndexRange,
        options: CursorOptions,
    ) -> Result<Box<dyn Cursor + 'a>> {
        let Inner::Tree(set) = &self.inner else {
            return Err(IndexError::UnsupportedSearch("range").into());
        };
        let lower = match &range.lower {
            None => Bound::Unbounded,
            Some((datum, point)) => {
                let Some(key) = IndexKey::from_datum(datum) else {
                    return Ok(Box::new(IterCursor::new(std::iter::empty(), &options)));
                };
                match point {
                    EndPointType::Inclusive => Bound::Included((key, i64::MIN)),
                    EndPointType::Exclusive => Bound::Excluded((key, i64::MAX)),
                }
            }
        };
        let upper = match &range.upper {
            None => Bound::Unbounded,
            Some((datum, point)) => {
                let Some(key) = IndexKey::from_datum(datum) else {
                    return Ok(Box::new(IterCursor::new(std::iter::empty(), &options)));
                };
                match point {
                    EndPointType::Inclusive => Bound::Included((key, i64::MAX)),
                    EndPointType::Exclusive => Bound::Excluded((key, i64::MIN)),
                }
            }
        };
        let rows = set.range((lower, upper)).map(|(_, row)| *row);
        match options.order {
            OrderType::Regular => Ok(Box::new(IterCursor::new(rows, &options))),
            OrderType::Reverse => Ok(Box::new(IterCursor::new(rows.rev(), &options))),
        }
    }

    /// A cursor over rows whose Text key starts with `prefix`, in key
    /// order. Tree indexes over Text only.
    pub fn find_starts_with<'a>(
        &'a self,
        prefix: &Datum,
        options: CursorOptions,
    ) -> Result<Box<dyn Cursor + 'a>> {
        let Inner::Tree(set) = &self.inner else {
            return Err(IndexError::UnsupportedSearch("prefix").into());
        };
        let Some(IndexKey::Text(prefix)) = IndexKey::from_datum(prefix) else {
            return Ok(Box::new(IterCursor::new(std::iter::empty(), &options)));
        };
        let lower = Bound::Included((IndexKey::Text(prefix.clone()), i64::MIN));
        let upper = match next_prefix(&prefix) {
            Some(next) => Bound::Excluded((IndexKey::Text(next), i64::MIN)),
            None => Bound::Unbounded,
        };
        let rows = set.range((lower, upper)).map(|(_, row)| *row);
        match options.order {
            OrderType::Regular => Ok(Box::new(IterCursor::new(rows, &options))),
            OrderType::Reverse => Ok(Box::new(IterCursor::new(rows.rev(), &options))),
        }
    }

    /// A cursor over rows whose Text key is a prefix of `value`, shortest
    /// first. Tree indexes over Text only.
    pub fn find_prefixes<'a>(
        &'a self,
        value: &Datum,
        options: CursorOptions,
    ) -> Result<Box<dyn Cursor + 'a>> {
        if !matches!(self.inner, Inner::Tree(_)) {
            return Err(IndexError::UnsupportedSearch("prefix").into());
        }
        let Some(IndexKey::Text(bytes)) = IndexKey::from_datum(value) else {
            return Ok(Box::new(IterCursor::new(std::iter::empty(), &options)));
        };
        let mut rows = Vec::new();
        for end in 0..=bytes.len() {
            let key = IndexKey::Text(bytes[..end].into());
            rows.extend(self.rows_matching(&key));
        }
        Ok(Box::new(directed(rows, options)))
    }
}

fn directed(rows: Vec<i64>, options: CursorOptions) -> IterCursor<'static> {
    match options.order {
        OrderType::Regular => IterCursor::new(rows.into_iter(), &options),
        OrderType::Reverse => IterCursor::new(rows.into_iter().rev(), &options),
    }
}

/// The shortest byte string greater than every string with this prefix.
fn next_prefix(prefix: &[u8]) -> Option<Box<[u8]>> {
    let mut next = prefix.to_vec();
    while let Some(&last) = next.last() {
        if last == u8::MAX {
            next.pop();
        } else {
            *next.last_mut().expect("nonempty") = last + 1;
            return Some(next.into());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_types::{Record, Text};

    fn read_rows(mut cursor: Box<dyn Cursor + '_>) -> Vec<i64> {
        let mut records: Vec<Record> = Vec::new();
        cursor.read_all(&mut records).unwrap();
        records.iter().map(|r| r.row_id.value()).collect()
    }

    fn tree_with(values: &[(i64, i64)]) -> Index {
        let mut index = Index::new(IndexId(0), "idx".into(), IndexType::Tree);
        for &(row, value) in values {
            index.insert(row, IndexKey::from_datum(&Datum::from(value)));
        }
        index
    }

    #[test]
    fn tree_insert_find_remove() {
        let mut index = tree_with(&[(0, 5), (1, 3), (2, 5)]);
        assert!(index.contains(&Datum::from(5i64)));
        assert_eq!(index.find_one(&Datum::from(3i64)), Int::new(1));
        assert!(index.find_one(&Datum::from(4i64)).is_na());
        assert!(!index.test_uniqueness());
        index.remove(2, IndexKey::from_datum(&Datum::from(5i64)));
        assert!(index.test_uniqueness());
        assert_eq!(index.num_entries(), 2);
    }

    #[test]
    fn na_is_never_indexed() {
        let mut index = Index::new(IndexId(0), "idx".into(), IndexType::Hash);
        index.insert(0, IndexKey::from_datum(&Datum::from(Int::na())));
        assert_eq!(index.num_entries(), 0);
        assert!(!index.contains(&Datum::from(Int::na())));
    }

    #[test]
    fn hash_point_search_only() {
        let mut index = Index::new(IndexId(0), "idx".into(), IndexType::Hash);
        index.insert(0, IndexKey::from_datum(&Datum::from(7i64)));
        index.insert(1, IndexKey::from_datum(&Datum::from(7i64)));
        let rows = read_rows(index.find(&Datum::from(7i64), CursorOptions::default()).unwrap());
        assert_eq!(rows.len(), 2);
        assert!(index
            .find_in_range(&IndexRange::new(), CursorOptions::default())
            .is_err());
    }

    #[test]
    fn range_cursor_walks_in_key_order() {
        let index = tree_with(&[(0, 30), (1, 10), (2, 20), (3, 40)]);
        let mut range = IndexRange::new();
        range.set_lower_bound(Datum::from(10i64), EndPointType::Exclusive);
        range.set_upper_bound(Datum::from(40i64), EndPointType::Exclusive);
        let rows = read_rows(index.find_in_range(&range, CursorOptions::default()).unwrap());
        assert_eq!(rows, vec![2, 0]);
        let rows = read_rows(
            index
                .find_in_range(
                    &range,
                    CursorOptions {
                        order: OrderType::Reverse,
                        ..Default::default()
                    },
                )
                .unwrap(),
        );
        assert_eq!(rows, vec![0, 2]);
    }

    #[test]
    fn float_keys_order_correctly() {
        let mut index = Index::new(IndexId(0), "idx".into(), IndexType::Tree);
        for (row, value) in [(0, -1.5), (1, 0.0), (2, 2.5), (3, -10.0)] {
            index.insert(row, IndexKey::from_datum(&Datum::from(value)));
        }
        let mut range = IndexRange::new();
        range.set_lower_bound(Datum::from(-2.0), EndPointType::Inclusive);
        let rows = read_rows(index.find_in_range(&range, CursorOptions::default()).unwrap());
        assert_eq!(rows, vec![0, 1, 2]);
    }

    #[test]
    fn prefix_search() {
        let mut index = Index::new(IndexId(0), "idx".into(), IndexType::Tree);
        for (row, value) in [(0, "ab"), (1, "abc"), (2, "b"), (3, "a")] {
            index.insert(row, IndexKey::from_datum(&Datum::from(value)));
        }
        let rows = read_rows(
            index
                .find_starts_with(&Datum::from("ab"), CursorOptions::default())
                .unwrap(),
        );
        assert_eq!(rows, vec![0, 1]);

        let rows = read_rows(
            index
                .find_prefixes(&Datum::from("abcd"), CursorOptions::default())
                .unwrap(),
        );
        // Keys "a", "ab", "abc" are prefixes of "abcd"; shortest first.
        assert_eq!(rows, vec![3, 0, 1]);

        let rows = read_rows(
            index
                .find(&Datum::Text(Text::na()), CursorOptions::default())
                .unwrap(),
        );
        assert!(rows.is_empty());
    }
}
