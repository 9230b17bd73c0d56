//! Row-subset views and decorated wrapper tables.
//!
//! `SubsetView` exposes an ordered subset of its base table's rows and keeps
//! the mapping in both directions. `MetadataTable` is a pass-through
//! decoration carrying string annotations (a "top N" filter, a geo binding);
//! through the `TableWrapper` capability its inner table can be swapped while
//! the decoration is kept.

use crate::column::{ColumnType, ColumnValue};
use crate::error::ViewError;
use crate::format::{CellFormat, FormatSource};
use crate::table::{delegate_calc, shared, Comparator, SharedTable, Table, TableView};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Capability of decorated tables whose inner table can be replaced.
pub trait TableWrapper {
    /// The decorated table.
    fn inner(&self) -> SharedTable;

    /// Same decoration around another table.
    fn rewrap(&self, inner: SharedTable) -> SharedTable;

    fn metadata(&self, _key: &str) -> Option<&str> {
        None
    }
}

/// A SubsetView shows selected rows of a base table in a given order.
/// Maintains the mapping from view rows to base rows and its inverse.
pub struct SubsetView {
    base: SharedTable,
    view_to_parent: Vec<usize>,
    parent_to_view: Vec<Option<usize>>,
}

impl SubsetView {
    /// Rows outside the base table are ignored.
    pub fn new(base: SharedTable, rows: Vec<usize>) -> Self {
        let parent_rows = base.borrow().row_count();
        let view_to_parent: Vec<usize> = rows.into_iter().filter(|r| *r < parent_rows).collect();
        let mut parent_to_view = vec![None; parent_rows];
        for (view_row, parent_row) in view_to_parent.iter().enumerate() {
            parent_to_view[*parent_row] = Some(view_row);
        }
        SubsetView {
            base,
            view_to_parent,
            parent_to_view,
        }
    }

    /// View row showing `parent_row`, `None` if it is not part of the subset.
    pub fn subset_row(&self, parent_row: usize) -> Option<usize> {
        self.parent_to_view.get(parent_row).copied().flatten()
    }

    pub fn parent_rows(&self) -> &[usize] {
        &self.view_to_parent
    }
}

impl Table for SubsetView {
    fn row_count(&self) -> usize {
        self.view_to_parent.len()
    }

    fn col_count(&self) -> usize {
        self.base.borrow().col_count()
    }

    fn header(&self, col: usize) -> Option<String> {
        self.base.borrow().header(col)
    }

    fn column_type(&self, col: usize) -> Option<ColumnType> {
        self.base.borrow().column_type(col)
    }

    fn is_measure(&self, col: usize) -> bool {
        self.base.borrow().is_measure(col)
    }

    fn index_of(&self, header: &str) -> Option<usize> {
        self.base.borrow().index_of(header)
    }

    fn value(&self, col: usize, row: usize) -> ColumnValue {
        match self.view_to_parent.get(row) {
            Some(parent_row) => self.base.borrow().value(col, *parent_row),
            None => ColumnValue::Null,
        }
    }

    fn comparator(&self, col: usize) -> Option<Comparator> {
        self.base.borrow().comparator(col)
    }

    fn set_value(&mut self, col: usize, row: usize, value: ColumnValue) -> Result<(), ViewError> {
        let parent_row = *self.view_to_parent.get(row).ok_or(ViewError::RowOutOfRange {
            row,
            len: self.view_to_parent.len(),
        })?;
        self.base.borrow_mut().set_value(col, parent_row, value)
    }

    fn prepare_calc(&mut self, dimension: Option<&str>, rows: Option<&[usize]>, compute_measures: bool) {
        let parent_rows: Vec<usize> = match rows {
            Some(rows) => rows
                .iter()
                .filter_map(|r| self.view_to_parent.get(*r).copied())
                .collect(),
            None => self.view_to_parent.clone(),
        };
        self.base
            .borrow_mut()
            .prepare_calc(dimension, Some(&parent_rows), compute_measures);
    }

    delegate_calc!();

    fn remove_calc_values(&mut self) {
        self.base.borrow_mut().remove_calc_values();
    }

    fn clone_table(&self, shallow: bool) -> SharedTable {
        let base = if shallow {
            Rc::clone(&self.base)
        } else {
            self.base.borrow().clone_table(false)
        };
        shared(SubsetView {
            base,
            view_to_parent: self.view_to_parent.clone(),
            parent_to_view: self.parent_to_view.clone(),
        })
    }

    fn as_view(&self) -> Option<&dyn TableView> {
        Some(self)
    }

    fn formats(&self) -> Option<&dyn FormatSource> {
        Some(self)
    }
}

impl TableView for SubsetView {
    fn table(&self) -> SharedTable {
        Rc::clone(&self.base)
    }

    fn base_row(&self, row: usize) -> Option<usize> {
        self.view_to_parent.get(row).copied()
    }

    fn base_col(&self, col: usize) -> Option<usize> {
        (col < self.col_count()).then_some(col)
    }
}

impl FormatSource for SubsetView {
    fn format(&self, col: usize, row: usize) -> Option<CellFormat> {
        let parent_row = self.base_row(row)?;
        let base = self.base.borrow();
        let source = base.formats()?;
        source.format(col, parent_row)
    }
}

impl std::fmt::Debug for SubsetView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubsetView")
            .field("rows", &self.view_to_parent.len())
            .field("parent_rows", &self.parent_to_view.len())
            .finish()
    }
}

/// Pass-through table decorated with string metadata.
pub struct MetadataTable {
    base: SharedTable,
    metadata: BTreeMap<String, String>,
}

impl MetadataTable {
    pub fn new(base: SharedTable, metadata: BTreeMap<String, String>) -> Self {
        MetadataTable { base, metadata }
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}

impl Table for MetadataTable {
    fn row_count(&self) -> usize {
        self.base.borrow().row_count()
    }

    fn row_count_unprojected(&self) -> usize {
        self.base.borrow().row_count_unprojected()
    }

    fn col_count(&self) -> usize {
        self.base.borrow().col_count()
    }

    fn header(&self, col: usize) -> Option<String> {
        self.base.borrow().header(col)
    }

    fn column_type(&self, col: usize) -> Option<ColumnType> {
        self.base.borrow().column_type(col)
    }

    fn is_measure(&self, col: usize) -> bool {
        self.base.borrow().is_measure(col)
    }

    fn index_of(&self, header: &str) -> Option<usize> {
        self.base.borrow().index_of(header)
    }

    fn value(&self, col: usize, row: usize) -> ColumnValue {
        self.base.borrow().value(col, row)
    }

    fn comparator(&self, col: usize) -> Option<Comparator> {
        self.base.borrow().comparator(col)
    }

    fn set_value(&mut self, col: usize, row: usize, value: ColumnValue) -> Result<(), ViewError> {
        self.base.borrow_mut().set_value(col, row, value)
    }

    fn prepare_calc(&mut self, dimension: Option<&str>, rows: Option<&[usize]>, compute_measures: bool) {
        self.base
            .borrow_mut()
            .prepare_calc(dimension, rows, compute_measures);
    }

    delegate_calc!();

    fn remove_calc_values(&mut self) {
        self.base.borrow_mut().remove_calc_values();
    }

    fn clone_table(&self, shallow: bool) -> SharedTable {
        let base = if shallow {
            Rc::clone(&self.base)
        } else {
            self.base.borrow().clone_table(false)
        };
        shared(MetadataTable::new(base, self.metadata.clone()))
    }

    fn as_view(&self) -> Option<&dyn TableView> {
        Some(self)
    }

    fn as_wrapper(&self) -> Option<&dyn TableWrapper> {
        Some(self)
    }

    fn formats(&self) -> Option<&dyn FormatSource> {
        Some(self)
    }
}

impl TableView for MetadataTable {
    fn table(&self) -> SharedTable {
        Rc::clone(&self.base)
    }

    fn base_row(&self, row: usize) -> Option<usize> {
        (row < self.row_count()).then_some(row)
    }

    fn base_col(&self, col: usize) -> Option<usize> {
        (col < self.col_count()).then_some(col)
    }
}

impl TableWrapper for MetadataTable {
    fn inner(&self) -> SharedTable {
        Rc::clone(&self.base)
    }

    fn rewrap(&self, inner: SharedTable) -> SharedTable {
        shared(MetadataTable::new(inner, self.metadata.clone()))
    }

    fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

impl FormatSource for MetadataTable {
    fn format(&self, col: usize, row: usize) -> Option<CellFormat> {
        let base = self.base.borrow();
        let source = base.formats()?;
        source.format(col, row)
    }
}
