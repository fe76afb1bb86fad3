use tabula_primitives::{ColumnId, TableId};
use tabula_types::{Datum, Int};

use crate::db::column::Column;
use crate::db::cursor::{CursorOptions, RowCursor};
use crate::error::{ColumnError, Result, TableError};
use crate::MAX_ROW_ID;

/// A named table: an ordered list of typed columns plus the row bitmap.
///
/// Row ids are dense non-negative 40-bit integers; row 0 is an ordinary
/// row. A removed slot turns free and is reused by the next insert, which
/// always picks the lowest free slot.
#[derive(Debug)]
pub struct Table {
    id: TableId,
    name: String,
    columns: Vec<Column>,
    next_column_id: u32,
    key_column: Option<ColumnId>,
    num_rows: u64,
    max_row_id: Option<i64>,
    /// One bit per row slot; 1 = live.
    bitmap: Vec<u64>,
    /// Two-level rank structure over `bitmap`: level 0 holds one bit per
    /// bitmap word (1 = the word has a free bit), level 1 one bit per
    /// level-0 word. Keeps lowest-free-slot search amortized O(1).
    summary: [Vec<u64>; 2],
    /// Reference columns in other tables that point into this one.
    pub(crate) referrers: Vec<(TableId, ColumnId)>,
}

impl Table {
    pub(crate) fn new(id: TableId, name: String) -> Self {
        Table {
            id,
            name,
            columns: Vec::new(),
            next_column_id: 0,
            key_column: None,
            num_rows: 0,
            max_row_id: None,
            bitmap: Vec::new(),
            summary: [Vec::new(), Vec::new()],
            referrers: Vec::new(),
        }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|column| column.name() == name)
            .ok_or_else(|| ColumnError::NotFound(name.into()).into())
    }

    pub fn column_by_id(&self, id: ColumnId) -> Result<&Column> {
        self.columns
            .iter()
            .find(|column| column.id() == id)
            .ok_or_else(|| ColumnError::IdNotFound(id).into())
    }

    pub fn key_column(&self) -> Option<&Column> {
        let id = self.key_column?;
        self.columns.iter().find(|column| column.id() == id)
    }

    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// The largest live row id, or N/A when empty.
    pub fn max_row_id(&self) -> Int {
        match self.max_row_id {
            Some(row) => Int::new(row),
            None => Int::na(),
        }
    }

    /// True iff there are no free slots below `max_row_id`.
    pub fn is_full(&self) -> bool {
        match self.max_row_id {
            None => true,
            Some(max) => self.num_rows == (max as u64) + 1,
        }
    }

    /// Bounds-checked liveness test.
    pub fn test_row(&self, row_id: Int) -> bool {
        match row_id.to_option() {
            Some(row) if row >= 0 => {
                let slot = row as usize;
                let word = slot / 64;
                word < self.bitmap.len() && self.bitmap[word] & (1 << (slot % 64)) != 0
            }
            _ => false,
        }
    }

    /// A cursor over all live rows, in row-id order per the options.
    pub fn create_cursor(&self, options: CursorOptions) -> RowCursor<'_> {
        RowCursor::new(self, options)
    }

    /// Whether any live row stores `value` in the named column.
    pub fn contains(&self, column: &str, value: &Datum) -> Result<bool> {
        let column = self.column(column)?;
        let value = column.parse_value(value)?;
        Ok(column.contains_value(&value, |row| self.test_row(Int::new(row)), self.max_row_id))
    }

    /// Any live row storing `value` in the named column, or N/A.
    pub fn find_one(&self, column: &str, value: &Datum) -> Result<Int> {
        let column = self.column(column)?;
        let value = column.parse_value(value)?;
        Ok(column.find_one_value(&value, |row| self.test_row(Int::new(row)), self.max_row_id))
    }

    /// Key lookup. Requires a key column.
    pub fn find_row(&self, key: &Datum) -> Result<Int> {
        let Some(key_column) = self.key_column() else {
            return Err(TableError::NoKeyColumn(self.name.clone()).into());
        };
        let value = key_column.parse_value(key)?;
        Ok(key_column.find_one_value(&value, |row| self.test_row(Int::new(row)), self.max_row_id))
    }

    // --- internal column management ---

    pub(crate) fn columns_mut(&mut self) -> impl Iterator<Item = &mut Column> {
        self.columns.iter_mut()
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Result<&mut Column> {
        self.columns
            .iter_mut()
            .find(|column| column.name() == name)
            .ok_or_else(|| ColumnError::NotFound(name.into()).into())
    }

    pub(crate) fn column_mut_by_id(&mut self, id: ColumnId) -> Result<&mut Column> {
        self.columns
            .iter_mut()
            .find(|column| column.id() == id)
            .ok_or_else(|| ColumnError::IdNotFound(id).into())
    }

    pub(crate) fn add_column(
        &mut self,
        name: String,
        data_type: tabula_types::DataType,
        reference_table: Option<TableId>,
    ) -> ColumnId {
        let id = ColumnId(self.next_column_id);
        self.next_column_id += 1;
        self.columns.push(Column::new(id, name, data_type, reference_table));
        id
    }

    /// Removes the named column and returns it for referrer cleanup.
    pub(crate) fn take_column(&mut self, name: &str) -> Result<Column> {
        let at = self
            .columns
            .iter()
            .position(|column| column.name() == name)
            .ok_or_else(|| ColumnError::NotFound(name.into()))?;
        let column = self.columns.remove(at);
        if self.key_column == Some(column.id()) {
            self.key_column = None;
        }
        Ok(column)
    }

    /// Places `name` immediately after `prev_name`; an empty predecessor
    /// moves it to the head.
    pub(crate) fn reorder_column(&mut self, name: &str, prev_name: &str) -> Result<()> {
        let from = self
            .columns
            .iter()
            .position(|column| column.name() == name)
            .ok_or_else(|| ColumnError::NotFound(name.into()))?;
        let to = if prev_name.is_empty() {
            0
        } else {
            let prev = self
                .columns
                .iter()
                .position(|column| column.name() == prev_name)
                .ok_or_else(|| ColumnError::NotFound(prev_name.into()))?;
            if prev < from {
                prev + 1
            } else {
                prev
            }
        };
        let column = self.columns.remove(from);
        self.columns.insert(to, column);
        Ok(())
    }

    pub(crate) fn key_column_id(&self) -> Option<ColumnId> {
        self.key_column
    }

    pub(crate) fn set_key_column_id(&mut self, id: Option<ColumnId>) {
        self.key_column = id;
    }

    pub(crate) fn register_referrer(&mut self, table: TableId, column: ColumnId) {
        self.referrers.push((table, column));
    }

    pub(crate) fn unregister_referrer(&mut self, table: TableId, column: ColumnId) {
        self.referrers
            .retain(|&(t, c)| (t, c) != (table, column));
    }

    // --- row allocation ---

    /// The lowest free slot.
    pub(crate) fn next_free_row(&self) -> i64 {
        // Level 1 narrows to a level-0 word, level 0 to a bitmap word.
        for (l1_word_at, &l1_word) in self.summary[1].iter().enumerate() {
            if l1_word == 0 {
                continue;
            }
            let l0_at = l1_word_at * 64 + l1_word.trailing_zeros() as usize;
            let l0_word = self.summary[0][l0_at];
            debug_assert_ne!(l0_word, 0, "summary levels out of sync");
            let word_at = l0_at * 64 + l0_word.trailing_zeros() as usize;
            let word = self.bitmap[word_at];
            debug_assert_ne!(word, u64::MAX, "summary level 0 out of sync");
            return (word_at * 64 + (!word).trailing_zeros() as usize) as i64;
        }
        (self.bitmap.len() * 64) as i64
    }

    fn reserve_slot(&mut self, slot: usize) {
        let words = slot / 64 + 1;
        let old_words = self.bitmap.len();
        if words <= old_words {
            return;
        }
        self.bitmap.resize(words, 0);
        let l0_words = words.div_ceil(64);
        self.summary[0].resize(l0_words, 0);
        self.summary[1].resize(l0_words.div_ceil(64), 0);
        // Freshly added words are all-free.
        for word_at in old_words..words {
            self.summary[0][word_at / 64] |= 1 << (word_at % 64);
            let l0_at = word_at / 64;
            self.summary[1][l0_at / 64] |= 1 << (l0_at % 64);
        }
    }

    /// Marks a free slot live. The caller checks range and liveness.
    pub(crate) fn validate_row(&mut self, slot: usize) {
        self.reserve_slot(slot);
        let word_at = slot / 64;
        self.bitmap[word_at] |= 1 << (slot % 64);
        if self.bitmap[word_at] == u64::MAX {
            self.summary[0][word_at / 64] &= !(1 << (word_at % 64));
            if self.summary[0][word_at / 64] == 0 {
                let l0_at = word_at / 64;
                self.summary[1][l0_at / 64] &= !(1 << (l0_at % 64));
            }
        }
        self.num_rows += 1;
        let row = slot as i64;
        if self.max_row_id.map_or(true, |max| row > max) {
            self.max_row_id = Some(row);
        }
    }

    /// Marks a live slot free and maintains `max_row_id`.
    pub(crate) fn invalidate_row(&mut self, slot: usize) {
        let word_at = slot / 64;
        self.bitmap[word_at] &= !(1 << (slot % 64));
        self.summary[0][word_at / 64] |= 1 << (word_at % 64);
        let l0_at = word_at / 64;
        self.summary[1][l0_at / 64] |= 1 << (l0_at % 64);
        self.num_rows -= 1;
        if self.max_row_id == Some(slot as i64) {
            self.max_row_id = self.top_live_row_below(slot);
        }
    }

    fn top_live_row_below(&self, slot: usize) -> Option<i64> {
        let mut word_at = slot / 64;
        loop {
            let mut word = self.bitmap[word_at];
            if word_at == slot / 64 && slot % 64 != 0 {
                word &= (1 << (slot % 64)) - 1;
            } else if word_at == slot / 64 && slot % 64 == 0 {
                word = 0;
            }
            if word != 0 {
                let bit = 63 - word.leading_zeros() as usize;
                return Some((word_at * 64 + bit) as i64);
            }
            if word_at == 0 {
                return None;
            }
            word_at -= 1;
        }
    }

    pub(crate) fn check_row_id_range(row: i64) -> Result<()> {
        if (0..=MAX_ROW_ID).contains(&row) {
            Ok(())
        } else {
            Err(TableError::RowIdOutOfRange(row).into())
        }
    }
}
