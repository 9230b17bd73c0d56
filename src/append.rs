//! AppendView: constant-valued columns appended to a base table.

use crate::column::{ColumnType, ColumnValue};
use crate::error::ViewError;
use crate::format::{CellFormat, FormatSource};
use crate::table::{delegate_calc, shared, Comparator, SharedTable, Table, TableView};
use std::rc::Rc;

#[derive(Debug, Clone)]
struct AppendedColumn {
    header: String,
    value: ColumnValue,
    measure: bool,
}

/// Appends named columns holding one constant value per row.
///
/// The row count follows the base's unprojected row count, so the appended
/// columns also cover rows a base view currently hides. It is sampled at
/// construction and refreshed whenever computed values are prepared or
/// cleared.
///
/// # Examples
///
/// ```
/// use brushview::{shared, AppendView, ColumnType, ColumnValue, DataTable, Schema, Table};
///
/// let schema = Schema::new(vec![("Region".to_string(), ColumnType::String, false)]);
/// let mut table = DataTable::new("regions".to_string(), schema);
/// table.append_row(vec![ColumnValue::String("East".to_string())]).unwrap();
///
/// let mut view = AppendView::new(shared(table));
/// view.add_measure("Const", ColumnValue::Int32(42));
///
/// assert_eq!(view.value_of("Const", 0).as_i32(), Some(42));
/// assert!(view.is_measure_header("Const"));
/// ```
pub struct AppendView {
    base: SharedTable,
    columns: Vec<AppendedColumn>,
    row_count: usize,
}

impl AppendView {
    pub fn new(base: SharedTable) -> Self {
        let row_count = base.borrow().row_count_unprojected();
        AppendView {
            base,
            columns: Vec::new(),
            row_count,
        }
    }

    pub fn add_measure(&mut self, header: impl Into<String>, value: ColumnValue) {
        self.add_column(header.into(), value, true);
    }

    pub fn add_dimension(&mut self, header: impl Into<String>, value: ColumnValue) {
        self.add_column(header.into(), value, false);
    }

    fn add_column(&mut self, header: String, value: ColumnValue, measure: bool) {
        let column = AppendedColumn { header, value, measure };
        match self.columns.iter_mut().find(|c| c.header == column.header) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    pub fn remove_column(&mut self, header: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c.header != header);
        self.columns.len() != before
    }

    fn refresh_row_count(&mut self) {
        self.row_count = self.base.borrow().row_count_unprojected();
    }

    fn appended(&self, col: usize) -> Result<&AppendedColumn, usize> {
        let base_cols = self.base.borrow().col_count();
        match col.checked_sub(base_cols) {
            Some(i) => self.columns.get(i).ok_or(col),
            None => Err(col),
        }
    }
}

impl Table for AppendView {
    fn row_count(&self) -> usize {
        self.row_count
    }

    fn row_count_unprojected(&self) -> usize {
        self.row_count
    }

    fn col_count(&self) -> usize {
        self.base.borrow().col_count() + self.columns.len()
    }

    fn header(&self, col: usize) -> Option<String> {
        match self.appended(col) {
            Ok(column) => Some(column.header.clone()),
            Err(col) => self.base.borrow().header(col),
        }
    }

    fn column_type(&self, col: usize) -> Option<ColumnType> {
        match self.appended(col) {
            Ok(column) => column.value.value_type(),
            Err(col) => self.base.borrow().column_type(col),
        }
    }

    fn is_measure(&self, col: usize) -> bool {
        match self.appended(col) {
            Ok(column) => column.measure,
            Err(col) => self.base.borrow().is_measure(col),
        }
    }

    fn index_of(&self, header: &str) -> Option<usize> {
        let base = self.base.borrow();
        match self.columns.iter().position(|c| c.header == header) {
            Some(pos) => Some(base.col_count() + pos),
            None => base.index_of(header),
        }
    }

    fn value(&self, col: usize, row: usize) -> ColumnValue {
        if row >= self.row_count {
            return ColumnValue::Null;
        }
        match self.appended(col) {
            Ok(column) => column.value.clone(),
            Err(col) => self.base.borrow().value(col, row),
        }
    }

    fn comparator(&self, col: usize) -> Option<Comparator> {
        match self.appended(col) {
            Ok(_) => None,
            Err(col) => self.base.borrow().comparator(col),
        }
    }

    fn set_value(&mut self, col: usize, row: usize, value: ColumnValue) -> Result<(), ViewError> {
        match self.appended(col) {
            Ok(column) => Err(ViewError::ReadOnly(format!("appended column '{}'", column.header))),
            Err(col) => self.base.borrow_mut().set_value(col, row, value),
        }
    }

    fn prepare_calc(&mut self, dimension: Option<&str>, rows: Option<&[usize]>, compute_measures: bool) {
        self.base
            .borrow_mut()
            .prepare_calc(dimension, rows, compute_measures);
        self.refresh_row_count();
    }

    delegate_calc!();

    fn remove_calc_values(&mut self) {
        self.base.borrow_mut().remove_calc_values();
        self.refresh_row_count();
    }

    fn clone_table(&self, shallow: bool) -> SharedTable {
        let base = if shallow {
            Rc::clone(&self.base)
        } else {
            self.base.borrow().clone_table(false)
        };
        shared(AppendView {
            base,
            columns: self.columns.clone(),
            row_count: self.row_count,
        })
    }

    fn as_view(&self) -> Option<&dyn TableView> {
        Some(self)
    }

    fn formats(&self) -> Option<&dyn FormatSource> {
        Some(self)
    }
}

impl TableView for AppendView {
    fn table(&self) -> SharedTable {
        Rc::clone(&self.base)
    }

    fn base_row(&self, row: usize) -> Option<usize> {
        (row < self.base.borrow().row_count_unprojected()).then_some(row)
    }

    fn base_col(&self, col: usize) -> Option<usize> {
        (col < self.base.borrow().col_count()).then_some(col)
    }
}

impl FormatSource for AppendView {
    fn format(&self, col: usize, row: usize) -> Option<CellFormat> {
        let base_col = self.base_col(col)?;
        let base = self.base.borrow();
        let source = base.formats()?;
        source.format(base_col, row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::{GapFill, TimeSeriesRow};
    use crate::table::{DataTable, Schema};

    fn days() -> SharedTable {
        let schema = Schema::new(vec![
            ("Day".to_string(), ColumnType::Int32, false),
            ("Sales".to_string(), ColumnType::Float64, true),
        ]);
        let rows = vec![
            vec![ColumnValue::Int32(1), ColumnValue::Float64(1.0)],
            vec![ColumnValue::Int32(3), ColumnValue::Float64(3.0)],
        ];
        shared(DataTable::from_rows("days".to_string(), schema, rows).unwrap())
    }

    #[test]
    fn test_constant_measure() {
        let mut view = AppendView::new(days());
        view.add_measure("Const", ColumnValue::Int32(42));

        assert_eq!(view.col_count(), 3);
        for row in 0..view.row_count() {
            assert_eq!(view.value_of("Const", row), ColumnValue::Int32(42));
        }
        assert!(view.is_measure_header("Const"));
        assert_eq!(view.type_of("Const"), Some(ColumnType::Int32));
        assert_eq!(view.base_col(2), None);
        assert_eq!(view.base_col(1), Some(1));
        assert!(view.value(2, 2).is_null());
    }

    #[test]
    fn test_dimension_replace_and_remove() {
        let mut view = AppendView::new(days());
        view.add_dimension("Series", ColumnValue::String("a".to_string()));
        view.add_dimension("Series", ColumnValue::String("b".to_string()));
        assert_eq!(view.col_count(), 3);
        assert!(!view.is_measure_header("Series"));
        assert_eq!(view.value_of("Series", 1).as_string(), Some("b"));

        assert!(view.remove_column("Series"));
        assert!(!view.remove_column("Series"));
        assert_eq!(view.index_of("Series"), None);
    }

    #[test]
    fn test_appended_columns_are_read_only() {
        let mut view = AppendView::new(days());
        view.add_measure("Const", ColumnValue::Int32(1));
        assert!(matches!(
            view.set_value(2, 0, ColumnValue::Int32(2)),
            Err(ViewError::ReadOnly(_))
        ));
        view.set_value(1, 0, ColumnValue::Float64(9.0)).unwrap();
        assert_eq!(view.value_of("Sales", 0).as_f64(), Some(9.0));
    }

    #[test]
    fn test_row_count_follows_computed_rows() {
        let base = days();
        let mut view = AppendView::new(Rc::clone(&base));
        view.add_measure("Const", ColumnValue::Int32(1));
        view.add_calc_row(Box::new(TimeSeriesRow::new("Day", 1.0, GapFill::Zero)));

        view.prepare_calc(None, None, true);
        assert_eq!(view.row_count(), 3);
        assert_eq!(view.value_of("Const", 2).as_i32(), Some(1));

        view.remove_calc_values();
        assert_eq!(view.row_count(), 2);
    }
}
