//! Error type shared by the table and view implementations.
//!
//! Only construction and mutation are fallible. The read path (`value`,
//! `header`, `index_of`, row/column mapping) reports misses as
//! `ColumnValue::Null` or `None` instead.

use crate::column::{ColumnType, ColumnValue};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    #[error("row {row} out of range [0, {len})")]
    RowOutOfRange { row: usize, len: usize },

    #[error("type mismatch in column '{column}': expected {expected:?}, got {value:?}")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        value: ColumnValue,
    },

    #[error("row has {got} values but the schema has {expected} columns")]
    RowShape { expected: usize, got: usize },

    #[error("{0} is read-only")]
    ReadOnly(String),

    #[error("measure flags cover {got} columns but the brushed table has {expected}")]
    MeasureFlags { expected: usize, got: usize },

    #[error("all-data column prefix must not be empty")]
    EmptyPrefix,

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
