//! An in-memory columnar engine with an expression language and a
//! pipeline-style query executor.
//!
//! A [`Db`] owns named [`Table`]s; a table owns typed [`Column`]s and a
//! row bitmap. Queries are built from three pieces:
//!
//! - a [`Cursor`](db::Cursor) producing a stream of [`Record`]s,
//! - [`Expression`](expr::Expression)s compiled by a stack
//!   [`ExpressionBuilder`](expr::ExpressionBuilder),
//! - a [`Pipeline`](pipeline::Pipeline) chaining cursor, filter,
//!   adjuster, sorter and merger stages into one pull-mode reader.
//!
//! ```
//! use tabula::{DataType, Datum, Db, Int};
//!
//! let mut db = Db::new();
//! let t = db.create_table("readings").unwrap();
//! db.create_column(t, "value", DataType::Int, Default::default()).unwrap();
//! let row = db.insert_row(t, &Datum::Na).unwrap();
//! db.set_value(t, "value", row, &Datum::from(42i64)).unwrap();
//! let got = db.table(t).unwrap().column("value").unwrap().get(row);
//! assert_eq!(got, Datum::from(Int::new(42)));
//! ```

pub mod db;
pub mod error;
pub mod expr;
pub mod pipeline;

pub use db::{Column, ColumnOptions, Cursor, CursorOptions, Db, IndexType, OrderType, Table};
pub use error::{Error, ErrorKind, Result};
pub use tabula_primitives::{ColumnId, IndexId, TableId};
pub use tabula_types::{Bool, DataType, Datum, Float, GeoPoint, Int, Record, Text, Vector};

/// The batch granularity used by streaming operators.
pub const BLOCK_SIZE: usize = 1024;

/// Row ids are dense 40-bit integers; this is the largest valid one.
pub const MAX_ROW_ID: i64 = (1 << 40) - 1;
