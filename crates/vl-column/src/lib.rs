//! Column encoding: turns loosely-typed batch records into typed,
//! length-consistent write columns.

pub mod column;
pub mod encoder;

pub use column::{Column, ColumnData, SparseRow};
pub use encoder::{BatchRecord, ColumnEncoder};
