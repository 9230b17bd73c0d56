//! Cell formats and the format capability.
//!
//! Formatting is optional: a table that can answer per-cell format queries
//! exposes it through `Table::formats()`, and renderers query the capability
//! instead of inspecting the concrete table type.

use serde::{Deserialize, Serialize};

/// Display format for a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellFormat {
    /// Fraction rendered as a percentage (0.25 -> "25%")
    Percent,
    /// Fixed number of fraction digits
    Decimal(u8),
    /// Currency with a symbol
    Currency(String),
    /// Date/time pattern such as "yyyy-MM-dd"
    DateTime(String),
}

/// Capability of tables that carry per-cell formats.
pub trait FormatSource {
    /// Format for the cell, `None` when the table has no format for it.
    fn format(&self, col: usize, row: usize) -> Option<CellFormat>;
}
