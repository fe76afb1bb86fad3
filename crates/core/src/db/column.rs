use smallvec::SmallVec;
use tabula_primitives::{ColumnId, IndexId, TableId};
use tabula_types::{Bool, DataType, Datum, Float, GeoPoint, Int, Text, Vector};

use crate::db::index::{Index, IndexKey, IndexType};
use crate::db::storage::Storage;
use crate::error::{ColumnError, IndexError, Result};

/// Options accepted by column creation.
#[derive(Clone, Debug, Default)]
pub struct ColumnOptions {
    /// Declares the column a foreign reference into the named table.
    /// Only Int and Vector<Int> columns may reference a table.
    pub reference_table: Option<String>,
}

/// A typed column. Storage is selected per [`DataType`]; dispatch is a
/// closed enum rather than virtual calls.
#[derive(Debug)]
pub struct Column {
    id: ColumnId,
    name: String,
    data_type: DataType,
    is_key: bool,
    reference_table: Option<TableId>,
    indexes: SmallVec<[Index; 1]>,
    next_index_id: u32,
    storage: Storage,
}

impl Column {
    pub(crate) fn new(
        id: ColumnId,
        name: String,
        data_type: DataType,
        reference_table: Option<TableId>,
    ) -> Self {
        Column {
            id,
            name,
            data_type,
            is_key: false,
            reference_table,
            indexes: SmallVec::new(),
            next_index_id: 0,
            storage: Storage::new(data_type),
        }
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_key(&self) -> bool {
        self.is_key
    }

    pub(crate) fn set_key(&mut self, is_key: bool) {
        self.is_key = is_key;
    }

    /// The referenced table, when this is a reference column.
    pub fn reference_table(&self) -> Option<TableId> {
        self.reference_table
    }

    pub fn num_indexes(&self) -> usize {
        self.indexes.len()
    }

    pub fn indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.iter()
    }

    pub fn find_index(&self, name: &str) -> Result<&Index> {
        self.indexes
            .iter()
            .find(|index| index.name() == name)
            .ok_or_else(|| IndexError::NotFound(name.into()).into())
    }

    // --- values ---

    /// Checks that `value` fits this column and returns it as the typed
    /// payload (the typeless `Datum::Na` becomes the typed N/A).
    pub(crate) fn parse_value(&self, value: &Datum) -> Result<Datum> {
        match value {
            Datum::Na => Ok(self.typed_na()),
            v if v.data_type() == Some(self.data_type) => Ok(v.clone()),
            v => Err(ColumnError::WrongType {
                column: self.name.clone(),
                expected: self.data_type,
                found: v
                    .data_type()
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "N/A".into()),
            }
            .into()),
        }
    }

    fn typed_na(&self) -> Datum {
        match self.data_type {
            DataType::Bool => Datum::Bool(Bool::Na),
            DataType::Int => Datum::Int(Int::na()),
            DataType::Float => Datum::Float(Float::na()),
            DataType::GeoPoint => Datum::GeoPoint(GeoPoint::na()),
            DataType::Text => Datum::Text(Text::na()),
            DataType::BoolVector => Datum::BoolVector(Vector::na()),
            DataType::IntVector => Datum::IntVector(Vector::na()),
            DataType::FloatVector => Datum::FloatVector(Vector::na()),
            DataType::GeoPointVector => Datum::GeoPointVector(Vector::na()),
            DataType::TextVector => Datum::TextVector(Vector::na()),
        }
    }

    /// The value at `row`, as the typed payload. Rows that were never
    /// set (or are out of range) read as the typed N/A.
    pub fn get(&self, row: Int) -> Datum {
        let Some(slot) = slot_of(row) else {
            return self.typed_na();
        };
        match &self.storage {
            Storage::Bool(s) => Datum::Bool(s.get(slot)),
            Storage::Int(s) => Datum::Int(s.get(slot)),
            Storage::Float(s) => Datum::Float(s.get(slot)),
            Storage::GeoPoint(s) => Datum::GeoPoint(s.get(slot)),
            Storage::Text(s) => Datum::Text(match s.get(slot) {
                Some(bytes) => Text::new(bytes),
                None => Text::na(),
            }),
            Storage::BoolVector(s) => Datum::BoolVector(vector_from(s.get(slot))),
            Storage::IntVector(s) => Datum::IntVector(vector_from(s.get(slot))),
            Storage::FloatVector(s) => Datum::FloatVector(vector_from(s.get(slot))),
            Storage::GeoPointVector(s) => Datum::GeoPointVector(vector_from(s.get(slot))),
            Storage::TextVector(s) => Datum::TextVector(match s.get(slot) {
                Some(elements) => Vector::new(elements),
                None => Vector::na(),
            }),
        }
    }

    pub(crate) fn get_bool(&self, row: Int) -> Bool {
        match (&self.storage, slot_of(row)) {
            (Storage::Bool(s), Some(slot)) => s.get(slot),
            _ => Bool::Na,
        }
    }

    pub(crate) fn get_int(&self, row: Int) -> Int {
        match (&self.storage, slot_of(row)) {
            (Storage::Int(s), Some(slot)) => s.get(slot),
            _ => Int::na(),
        }
    }

    pub(crate) fn get_float(&self, row: Int) -> Float {
        match (&self.storage, slot_of(row)) {
            (Storage::Float(s), Some(slot)) => s.get(slot),
            _ => Float::na(),
        }
    }

    pub(crate) fn get_geo_point(&self, row: Int) -> GeoPoint {
        match (&self.storage, slot_of(row)) {
            (Storage::GeoPoint(s), Some(slot)) => s.get(slot),
            _ => GeoPoint::na(),
        }
    }

    pub(crate) fn get_text(&self, row: Int) -> Text {
        match (&self.storage, slot_of(row)) {
            (Storage::Text(s), Some(slot)) => match s.get(slot) {
                Some(bytes) => Text::new(bytes),
                None => Text::na(),
            },
            _ => Text::na(),
        }
    }

    pub(crate) fn get_bool_vector(&self, row: Int) -> Vector<Bool> {
        match (&self.storage, slot_of(row)) {
            (Storage::BoolVector(s), Some(slot)) => vector_from(s.get(slot)),
            _ => Vector::na(),
        }
    }

    pub(crate) fn get_int_vector(&self, row: Int) -> Vector<Int> {
        match (&self.storage, slot_of(row)) {
            (Storage::IntVector(s), Some(slot)) => vector_from(s.get(slot)),
            _ => Vector::na(),
        }
    }

    pub(crate) fn get_float_vector(&self, row: Int) -> Vector<Float> {
        match (&self.storage, slot_of(row)) {
            (Storage::FloatVector(s), Some(slot)) => vector_from(s.get(slot)),
            _ => Vector::na(),
        }
    }

    pub(crate) fn get_geo_point_vector(&self, row: Int) -> Vector<GeoPoint> {
        match (&self.storage, slot_of(row)) {
            (Storage::GeoPointVector(s), Some(slot)) => vector_from(s.get(slot)),
            _ => Vector::na(),
        }
    }

    pub(crate) fn get_text_vector(&self, row: Int) -> Vector<Text> {
        match (&self.storage, slot_of(row)) {
            (Storage::TextVector(s), Some(slot)) => match s.get(slot) {
                Some(elements) => Vector::new(elements),
                None => Vector::na(),
            },
            _ => Vector::na(),
        }
    }

    /// Stores a parsed value. The caller has already validated the type,
    /// key constraints and references.
    pub(crate) fn store(&mut self, slot: usize, value: &Datum) {
        match (&mut self.storage, value) {
            (Storage::Bool(s), Datum::Bool(v)) => s.set(slot, *v),
            (Storage::Int(s), Datum::Int(v)) => s.set(slot, *v),
            (Storage::Float(s), Datum::Float(v)) => s.set(slot, *v),
            (Storage::GeoPoint(s), Datum::GeoPoint(v)) => s.set(slot, *v),
            (Storage::Text(s), Datum::Text(v)) => s.set(slot, v.bytes()),
            (Storage::BoolVector(s), Datum::BoolVector(v)) => s.set(slot, v.elements()),
            (Storage::IntVector(s), Datum::IntVector(v)) => s.set(slot, v.elements()),
            (Storage::FloatVector(s), Datum::FloatVector(v)) => s.set(slot, v.elements()),
            (Storage::GeoPointVector(s), Datum::GeoPointVector(v)) => s.set(slot, v.elements()),
            (Storage::TextVector(s), Datum::TextVector(v)) => s.set(slot, v.elements()),
            _ => debug_assert!(false, "store called with a mismatched payload"),
        }
    }

    pub(crate) fn unset(&mut self, slot: usize) {
        self.storage.unset(slot);
    }

    /// Moves all attached indexes from `old` to `new` for `row`.
    ///
    /// Inserting into an in-memory index cannot fail part-way, so the
    /// roll-back contract of multi-index updates holds trivially here.
    pub(crate) fn update_indexes(&mut self, row: i64, old: &Datum, new: &Datum) {
        if self.indexes.is_empty() || old == new {
            return;
        }
        let old_key = IndexKey::from_datum(old);
        let new_key = IndexKey::from_datum(new);
        for index in &mut self.indexes {
            index.remove(row, old_key.clone());
            index.insert(row, new_key.clone());
        }
    }

    pub(crate) fn remove_from_indexes(&mut self, row: i64, old: &Datum) {
        let old_key = IndexKey::from_datum(old);
        for index in &mut self.indexes {
            index.remove(row, old_key.clone());
        }
    }

    /// Drops a reference to `target` from this column at `row`: a scalar
    /// reference turns N/A, a vector reference loses the element and is
    /// compacted in place.
    pub(crate) fn clear_reference(&mut self, row: i64, target: Int) {
        match self.data_type {
            DataType::Int => {
                if self.get_int(Int::new(row)).matches(&target) {
                    self.remove_from_indexes(row, &Datum::Int(target));
                    self.unset(row as usize);
                }
            }
            DataType::IntVector => {
                if let Storage::IntVector(s) = &mut self.storage {
                    s.retain_in_slot(row as usize, |v| !v.matches(&target));
                }
            }
            _ => {}
        }
    }

    // --- scans ---

    /// Whether any live row holds `value`. `live` tests the row bitmap,
    /// `max_slot` is the table's `max_row_id`.
    pub(crate) fn contains_value(
        &self,
        value: &Datum,
        live: impl Fn(i64) -> bool,
        max_slot: Option<i64>,
    ) -> bool {
        !self
            .find_one_value(value, live, max_slot)
            .is_na()
    }

    /// Any live row holding `value`, or N/A. Consults the first attached
    /// index for non-N/A probes, else scans.
    pub(crate) fn find_one_value(
        &self,
        value: &Datum,
        live: impl Fn(i64) -> bool,
        max_slot: Option<i64>,
    ) -> Int {
        let probe_is_na = value.is_missing();
        if !probe_is_na {
            if let Some(index) = self.indexes.first() {
                return index.find_one(value);
            }
        }
        let Some(max_slot) = max_slot else {
            return Int::na();
        };
        for row in 0..=max_slot {
            if !live(row) {
                continue;
            }
            let stored = self.get(Int::new(row));
            if probe_is_na {
                if stored.is_missing() {
                    return Int::new(row);
                }
            } else if stored == *value {
                return Int::new(row);
            }
        }
        Int::na()
    }

    // --- indexes ---

    pub(crate) fn create_index(
        &mut self,
        name: &str,
        index_type: IndexType,
        live_rows: impl Iterator<Item = i64>,
    ) -> Result<IndexId> {
        if self.data_type.is_vector() {
            return Err(IndexError::UnsupportedType(self.data_type).into());
        }
        if self.indexes.iter().any(|index| index.name() == name) {
            return Err(IndexError::Exists(name.into()).into());
        }
        let id = IndexId(self.next_index_id);
        let mut index = Index::new(id, name.into(), index_type);
        for row in live_rows {
            index.insert(row, IndexKey::from_datum(&self.get(Int::new(row))));
        }
        self.next_index_id += 1;
        self.indexes.push(index);
        Ok(id)
    }

    pub(crate) fn remove_index(&mut self, name: &str) -> Result<()> {
        let at = self
            .indexes
            .iter()
            .position(|index| index.name() == name)
            .ok_or_else(|| IndexError::NotFound(name.to_owned()))?;
        self.indexes.remove(at);
        Ok(())
    }
}

fn slot_of(row: Int) -> Option<usize> {
    match row.to_option() {
        Some(row) if row >= 0 => Some(row as usize),
        _ => None,
    }
}

fn vector_from<T: tabula_types::ValueType>(elements: Option<&[T]>) -> Vector<T> {
    match elements {
        Some(elements) => Vector::new(elements),
        None => Vector::na(),
    }
}
