//! The database object and its collaborators: tables, columns, indexes
//! and cursors.
//!
//! All mutation flows through [`Db`], which owns every table. Cross-table
//! invariants (reference validation, referrer cleanup on row removal)
//! need access to more than one table at a time, so tables hand out only
//! read access; the back-references a referenced table keeps are plain
//! `(TableId, ColumnId)` pairs, never owning pointers.

mod column;
mod cursor;
mod index;
mod storage;
mod table;

pub use column::{Column, ColumnOptions};
pub use cursor::{Cursor, CursorOptions, OrderType, RowCursor};
pub use index::{EndPointType, Index, IndexRange, IndexType};
pub use table::Table;

use log::debug;
use tabula_primitives::{ColumnId, IndexId, IntMap, TableId};
use tabula_types::{DataType, Datum, Int};

use crate::error::{ColumnError, IndexError, Result, TableError};

/// An in-memory database: a set of named tables.
#[derive(Debug, Default)]
pub struct Db {
    tables: IntMap<TableId, Table>,
    /// Creation order, for stable iteration.
    order: Vec<TableId>,
    next_table_id: u32,
}

/// The naming rule shared by tables, columns and indexes: non-empty,
/// `[0-9A-Za-z_]` only, and not starting with a digit.
fn name_is_valid(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        None => false,
        Some(first) if first.is_ascii_digit() => false,
        Some(first) if !(first.is_ascii_alphanumeric() || first == b'_') => false,
        Some(_) => bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_'),
    }
}

impl Db {
    pub fn new() -> Self {
        Db::default()
    }

    pub fn num_tables(&self) -> usize {
        self.order.len()
    }

    /// Tables in creation order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.order.iter().filter_map(|id| self.tables.get(id))
    }

    pub fn table(&self, id: TableId) -> Result<&Table> {
        self.tables
            .get(&id)
            .ok_or_else(|| TableError::IdNotFound(id).into())
    }

    fn table_mut(&mut self, id: TableId) -> Result<&mut Table> {
        self.tables
            .get_mut(&id)
            .ok_or_else(|| TableError::IdNotFound(id).into())
    }

    pub fn find_table(&self, name: &str) -> Result<&Table> {
        self.tables()
            .find(|table| table.name() == name)
            .ok_or_else(|| TableError::NotFound(name.into()).into())
    }

    pub fn table_id(&self, name: &str) -> Result<TableId> {
        Ok(self.find_table(name)?.id())
    }

    // --- table DDL ---

    pub fn create_table(&mut self, name: &str) -> Result<TableId> {
        if !name_is_valid(name) {
            return Err(TableError::InvalidName(name.into()).into());
        }
        if self.tables().any(|table| table.name() == name) {
            return Err(TableError::Exists(name.into()).into());
        }
        let id = TableId(self.next_table_id);
        self.next_table_id += 1;
        self.tables.insert(id, Table::new(id, name.into()));
        self.order.push(id);
        debug!("created table `{name}` ({id})");
        Ok(id)
    }

    /// Removes a table. Fails while reference columns in *other* tables
    /// still point into it.
    pub fn remove_table(&mut self, name: &str) -> Result<()> {
        let id = self.table_id(name)?;
        let table = self.table(id)?;
        let foreign = table
            .referrers
            .iter()
            .filter(|(referrer, _)| *referrer != id)
            .count();
        if foreign > 0 {
            return Err(TableError::NotRemovable(name.into(), foreign).into());
        }
        // Unregister this table's own reference columns elsewhere.
        let outgoing: Vec<(TableId, ColumnId)> = table
            .columns()
            .filter_map(|column| column.reference_table().map(|target| (target, column.id())))
            .collect();
        for (target, column) in outgoing {
            if target != id {
                if let Ok(target) = self.table_mut(target) {
                    target.unregister_referrer(id, column);
                }
            }
        }
        self.tables.remove(&id);
        self.order.retain(|&t| t != id);
        debug!("removed table `{name}`");
        Ok(())
    }

    pub fn rename_table(&mut self, name: &str, new_name: &str) -> Result<()> {
        if !name_is_valid(new_name) {
            return Err(TableError::InvalidName(new_name.into()).into());
        }
        if name != new_name && self.tables().any(|table| table.name() == new_name) {
            return Err(TableError::Exists(new_name.into()).into());
        }
        let id = self.table_id(name)?;
        self.table_mut(id)?.set_name(new_name.into());
        Ok(())
    }

    // --- column DDL ---

    pub fn create_column(
        &mut self,
        table: TableId,
        name: &str,
        data_type: DataType,
        options: ColumnOptions,
    ) -> Result<ColumnId> {
        if !name_is_valid(name) {
            return Err(ColumnError::InvalidName(name.into()).into());
        }
        if self.table(table)?.column(name).is_ok() {
            return Err(ColumnError::Exists(name.into()).into());
        }
        let reference = match &options.reference_table {
            None => None,
            Some(target_name) => {
                if !matches!(data_type, DataType::Int | DataType::IntVector) {
                    return Err(ColumnError::UnsupportedReferenceType(data_type).into());
                }
                Some(self.table_id(target_name)?)
            }
        };
        let id = self.table_mut(table)?.add_column(name.into(), data_type, reference);
        if let Some(target) = reference {
            self.table_mut(target)?.register_referrer(table, id);
        }
        debug!("created column `{name}` ({data_type})");
        Ok(id)
    }

    pub fn remove_column(&mut self, table: TableId, name: &str) -> Result<()> {
        let column = self.table_mut(table)?.take_column(name)?;
        if let Some(target) = column.reference_table() {
            if let Ok(target) = self.table_mut(target) {
                target.unregister_referrer(table, column.id());
            }
        }
        debug!("removed column `{name}`");
        Ok(())
    }

    pub fn rename_column(&mut self, table: TableId, name: &str, new_name: &str) -> Result<()> {
        if !name_is_valid(new_name) {
            return Err(ColumnError::InvalidName(new_name.into()).into());
        }
        let table = self.table_mut(table)?;
        if name != new_name && table.column(new_name).is_ok() {
            return Err(ColumnError::Exists(new_name.into()).into());
        }
        table.column_mut(name)?.set_name(new_name.into());
        Ok(())
    }

    /// Places `name` immediately after `prev_name` in the column order;
    /// an empty `prev_name` moves it to the head.
    pub fn reorder_column(&mut self, table: TableId, name: &str, prev_name: &str) -> Result<()> {
        self.table_mut(table)?.reorder_column(name, prev_name)
    }

    // --- key column ---

    /// Promotes an existing column to key status after scanning it for
    /// N/A values and duplicates.
    pub fn set_key_column(&mut self, table: TableId, name: &str) -> Result<()> {
        let table_ref = self.table(table)?;
        if let Some(current) = table_ref.key_column() {
            return Err(ColumnError::KeyColumnExists(current.name().into()).into());
        }
        let column = table_ref.column(name)?;
        if !matches!(column.data_type(), DataType::Int | DataType::Text) {
            return Err(ColumnError::UnsupportedKeyType(column.data_type()).into());
        }
        if column.reference_table().is_some() {
            return Err(ColumnError::ReferenceKey.into());
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(max) = table_ref.max_row_id().to_option() {
            for row in 0..=max {
                if !table_ref.test_row(Int::new(row)) {
                    continue;
                }
                let value = column.get(Int::new(row));
                if value.is_missing() {
                    return Err(ColumnError::KeyHasNa {
                        column: name.into(),
                        row,
                    }
                    .into());
                }
                if let Some(key) = index::IndexKey::from_datum(&value) {
                    if !seen.insert(key) {
                        return Err(ColumnError::DuplicateKey {
                            column: name.into(),
                            key: format!("{value:?}"),
                        }
                        .into());
                    }
                }
            }
        }
        let id = column.id();
        let table = self.table_mut(table)?;
        table.column_mut_by_id(id)?.set_key(true);
        table.set_key_column_id(Some(id));
        Ok(())
    }

    pub fn unset_key_column(&mut self, table: TableId) -> Result<()> {
        let table = self.table_mut(table)?;
        let Some(id) = table.key_column_id() else {
            return Err(TableError::NoKeyColumn(table.name().into()).into());
        };
        table.column_mut_by_id(id)?.set_key(false);
        table.set_key_column_id(None);
        Ok(())
    }

    // --- indexes ---

    pub fn create_index(
        &mut self,
        table: TableId,
        column: &str,
        name: &str,
        index_type: IndexType,
    ) -> Result<IndexId> {
        if !name_is_valid(name) {
            return Err(IndexError::InvalidName(name.into()).into());
        }
        let table_ref = self.table(table)?;
        table_ref.column(column)?;
        let live: Vec<i64> = match table_ref.max_row_id().to_option() {
            None => Vec::new(),
            Some(max) => (0..=max)
                .filter(|&row| table_ref.test_row(Int::new(row)))
                .collect(),
        };
        self.table_mut(table)?
            .column_mut(column)?
            .create_index(name, index_type, live.into_iter())
    }

    pub fn remove_index(&mut self, table: TableId, column: &str, name: &str) -> Result<()> {
        self.table_mut(table)?.column_mut(column)?.remove_index(name)
    }

    // --- rows ---

    /// Allocates the lowest free slot. With a key column, `key` becomes
    /// the new row's key, set atomically with the bitmap update; without
    /// one, `key` must be `Datum::Na`.
    pub fn insert_row(&mut self, table: TableId, key: &Datum) -> Result<Int> {
        let table_ref = self.table(table)?;
        let row = table_ref.next_free_row();
        Table::check_row_id_range(row)?;
        self.insert_at_slot(table, row, key)
    }

    /// Recreates a specific slot; fails if it is live.
    pub fn insert_row_at(&mut self, table: TableId, row_id: Int, key: &Datum) -> Result<()> {
        let row = row_id.to_option().ok_or(TableError::RowIdOutOfRange(i64::MIN))?;
        Table::check_row_id_range(row)?;
        if self.table(table)?.test_row(row_id) {
            return Err(TableError::RowExists(row).into());
        }
        self.insert_at_slot(table, row, key)?;
        Ok(())
    }

    fn insert_at_slot(&mut self, table: TableId, row: i64, key: &Datum) -> Result<Int> {
        let table_ref = self.table(table)?;
        let key_column = match table_ref.key_column() {
            None => {
                if !matches!(key, Datum::Na) {
                    return Err(TableError::NoKeyColumn(table_ref.name().into()).into());
                }
                None
            }
            Some(column) => {
                let parsed = column.parse_value(key)?;
                if parsed.is_missing() {
                    return Err(ColumnError::NaKey(column.name().into()).into());
                }
                if column.contains_value(
                    &parsed,
                    |r| table_ref.test_row(Int::new(r)),
                    table_ref.max_row_id().to_option(),
                ) {
                    return Err(ColumnError::DuplicateKey {
                        column: column.name().into(),
                        key: format!("{parsed:?}"),
                    }
                    .into());
                }
                Some((column.id(), parsed))
            }
        };
        let table = self.table_mut(table)?;
        let slot = row as usize;
        table.validate_row(slot);
        if let Some((column_id, parsed)) = key_column {
            let column = table.column_mut_by_id(column_id)?;
            let old = column.get(Int::new(row));
            column.update_indexes(row, &old, &parsed);
            column.store(slot, &parsed);
        }
        Ok(Int::new(row))
    }

    /// Key lookup that inserts on miss. Returns the row id and whether a
    /// new row was created.
    pub fn find_or_insert_row(&mut self, table: TableId, key: &Datum) -> Result<(Int, bool)> {
        let found = self.table(table)?.find_row(key)?;
        if !found.is_na() {
            return Ok((found, false));
        }
        let row = self.insert_row(table, key)?;
        Ok((row, true))
    }

    /// Removes a row: clears the bitmap bit, unsets every column value,
    /// then clears references to this row held by referrer columns.
    pub fn remove_row(&mut self, table: TableId, row_id: Int) -> Result<()> {
        let table_mut = self.table_mut(table)?;
        if !table_mut.test_row(row_id) {
            return Err(TableError::RowNotFound(row_id.value()).into());
        }
        let row = row_id.value();
        let slot = row as usize;
        for column in table_mut.columns_mut() {
            let old = column.get(row_id);
            if !old.is_missing() {
                column.remove_from_indexes(row, &old);
                column.unset(slot);
            }
        }
        table_mut.invalidate_row(slot);
        let referrers = table_mut.referrers.clone();
        for (referrer_table, referrer_column) in referrers {
            self.clear_references(referrer_table, referrer_column, row_id)?;
        }
        Ok(())
    }

    /// Clears every reference to `target_row` held by one referrer
    /// column: scalar references turn N/A, vector references drop the
    /// element and compact.
    fn clear_references(
        &mut self,
        table: TableId,
        column: ColumnId,
        target_row: Int,
    ) -> Result<()> {
        let table_ref = self.table(table)?;
        let Some(max) = table_ref.max_row_id().to_option() else {
            return Ok(());
        };
        let rows: Vec<i64> = (0..=max)
            .filter(|&row| table_ref.test_row(Int::new(row)))
            .collect();
        let column = self.table_mut(table)?.column_mut_by_id(column)?;
        for row in rows {
            column.clear_reference(row, target_row);
        }
        Ok(())
    }

    // --- values ---

    /// Stores `value` into a column. Checks the payload type, key
    /// constraints and reference liveness before touching anything, so a
    /// failed call leaves the store untouched.
    pub fn set_value(
        &mut self,
        table: TableId,
        column: &str,
        row_id: Int,
        value: &Datum,
    ) -> Result<()> {
        let table_ref = self.table(table)?;
        if !table_ref.test_row(row_id) {
            return Err(TableError::RowNotFound(row_id.value()).into());
        }
        let column_ref = table_ref.column(column)?;
        let parsed = column_ref.parse_value(value)?;
        let old = column_ref.get(row_id);
        if parsed == old {
            return Ok(());
        }
        if column_ref.is_key() {
            if parsed.is_missing() {
                return Err(ColumnError::NaKey(column.into()).into());
            }
            if column_ref.contains_value(
                &parsed,
                |r| table_ref.test_row(Int::new(r)),
                table_ref.max_row_id().to_option(),
            ) {
                return Err(ColumnError::DuplicateKey {
                    column: column.into(),
                    key: format!("{parsed:?}"),
                }
                .into());
            }
        }
        if let Some(target) = column_ref.reference_table() {
            self.check_reference(target, &parsed)?;
        }
        let column_id = column_ref.id();
        let row = row_id.value();
        let column = self.table_mut(table)?.column_mut_by_id(column_id)?;
        column.update_indexes(row, &old, &parsed);
        column.store(row as usize, &parsed);
        Ok(())
    }

    /// Clears a column value back to N/A.
    pub fn unset_value(&mut self, table: TableId, column: &str, row_id: Int) -> Result<()> {
        self.set_value(table, column, row_id, &Datum::Na)
    }

    fn check_reference(&self, target: TableId, value: &Datum) -> Result<()> {
        let target_table = self.table(target)?;
        let check = |row: Int| -> Result<()> {
            if row.is_na() || target_table.test_row(row) {
                Ok(())
            } else {
                Err(ColumnError::DanglingReference {
                    table: target_table.name().into(),
                    row: row.value(),
                }
                .into())
            }
        };
        match value {
            Datum::Int(row) => check(*row),
            Datum::IntVector(rows) => {
                for row in rows.elements().unwrap_or_default() {
                    // Vector elements cannot be N/A references.
                    if row.is_na() {
                        return Err(ColumnError::DanglingReference {
                            table: target_table.name().into(),
                            row: row.value(),
                        }
                        .into());
                    }
                    check(*row)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
