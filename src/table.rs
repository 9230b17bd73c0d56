//! BrushView Table Implementation
//!
//! The `Table` trait is the contract every table and view in this crate
//! implements: an addressable virtual table of typed, named columns and rows
//! with optional pluggable computed columns and rows. Renderers address data
//! solely through this contract.
//!
//! `DataTable` is the terminal (non-view) implementation that owns its data.
//!
//! # Examples
//!
//! ```
//! use brushview::{ColumnType, ColumnValue, DataTable, Schema, Table};
//!
//! let schema = Schema::new(vec![
//!     ("Region".to_string(), ColumnType::String, false),
//!     ("Sales".to_string(), ColumnType::Float64, true),
//! ]);
//!
//! let mut table = DataTable::new("sales".to_string(), schema);
//! table
//!     .append_row(vec![ColumnValue::String("East".to_string()), ColumnValue::Float64(10.0)])
//!     .unwrap();
//!
//! assert_eq!(table.row_count(), 1);
//! assert_eq!(table.index_of("Sales"), Some(1));
//! assert!(table.is_measure(1));
//! assert_eq!(table.value_of("Sales", 0).to_f64(), Some(10.0));
//! // Unresolved columns read as null rather than failing.
//! assert!(table.value_of("Profit", 0).is_null());
//! ```

use crate::calc::{CalcColumn, CalcHost, CalcRow, CalcSupport};
use crate::column::{Column, ColumnType, ColumnValue};
use crate::error::ViewError;
use crate::format::{CellFormat, FormatSource};
use crate::view::TableWrapper;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

/// A table shared between the views that wrap it.
pub type SharedTable = Rc<RefCell<dyn Table>>;

/// Ordering function for the values of a categorical column.
pub type Comparator = Rc<dyn Fn(&ColumnValue, &ColumnValue) -> Ordering>;

/// Wraps a table for sharing between views.
pub fn shared<T: Table + 'static>(table: T) -> SharedTable {
    Rc::new(RefCell::new(table))
}

/// Base contract for all tables and views.
///
/// Lookups never fail: an unresolved column yields `None` from `index_of`
/// and `ColumnValue::Null` from `value`, and out-of-range rows or columns
/// read as null. Only mutation reports errors.
pub trait Table {
    fn row_count(&self) -> usize;

    /// Row count including rows hidden by a view's projection.
    fn row_count_unprojected(&self) -> usize {
        self.row_count()
    }

    fn col_count(&self) -> usize;

    fn header(&self, col: usize) -> Option<String>;

    fn column_type(&self, col: usize) -> Option<ColumnType>;

    fn is_measure(&self, col: usize) -> bool;

    fn index_of(&self, header: &str) -> Option<usize>;

    /// Value at (col, row); null when either is out of range.
    fn value(&self, col: usize, row: usize) -> ColumnValue;

    /// Ordering for a categorical column, if the table defines one.
    fn comparator(&self, _col: usize) -> Option<Comparator> {
        None
    }

    fn value_of(&self, header: &str, row: usize) -> ColumnValue {
        self.index_of(header)
            .map_or(ColumnValue::Null, |col| self.value(col, row))
    }

    fn type_of(&self, header: &str) -> Option<ColumnType> {
        self.index_of(header).and_then(|col| self.column_type(col))
    }

    fn is_measure_header(&self, header: &str) -> bool {
        self.index_of(header).is_some_and(|col| self.is_measure(col))
    }

    fn comparator_of(&self, header: &str) -> Option<Comparator> {
        self.index_of(header).and_then(|col| self.comparator(col))
    }

    /// Overwrites one cell. Views forward to their base where the cell maps
    /// to exactly one base cell.
    fn set_value(&mut self, _col: usize, _row: usize, _value: ColumnValue) -> Result<(), ViewError> {
        Err(ViewError::ReadOnly("table".to_string()))
    }

    /// Pre-render hook letting computed columns precompute values for a
    /// grouping over a row subset (`None` = all rows). Recomputes cached
    /// computed values when `compute_measures` is set.
    fn prepare_calc(&mut self, dimension: Option<&str>, rows: Option<&[usize]>, compute_measures: bool);

    fn add_calc_column(&mut self, calc: Box<dyn CalcColumn>);

    fn calc_columns(&self) -> Vec<Box<dyn CalcColumn>>;

    /// Detaches and returns all computed columns.
    fn remove_calc_columns(&mut self) -> Vec<Box<dyn CalcColumn>>;

    fn add_calc_row(&mut self, calc: Box<dyn CalcRow>);

    fn calc_rows(&self) -> Vec<Box<dyn CalcRow>>;

    /// Detaches and returns all computed-row generators.
    fn remove_calc_rows(&mut self) -> Vec<Box<dyn CalcRow>>;

    /// Clears cached computed values and generated rows.
    fn remove_calc_values(&mut self);

    /// Independent copy. A shallow clone shares the wrapped base table, a
    /// deep clone copies it too.
    fn clone_table(&self, shallow: bool) -> SharedTable;

    fn as_view(&self) -> Option<&dyn TableView> {
        None
    }

    fn as_wrapper(&self) -> Option<&dyn TableWrapper> {
        None
    }

    fn formats(&self) -> Option<&dyn FormatSource> {
        None
    }
}

/// A table composed over another table.
///
/// Views that keep row count and order map row r to base row r; views that
/// drop or reorder rows maintain the inverse mapping.
pub trait TableView: Table {
    /// The immediately wrapped table.
    fn table(&self) -> SharedTable;

    fn base_row(&self, row: usize) -> Option<usize>;

    fn base_col(&self, col: usize) -> Option<usize>;

    /// The terminal (non-view) table found by repeatedly unwrapping.
    fn root_table(&self) -> SharedTable {
        root_of(self.table())
    }

    fn root_row(&self, row: usize) -> Option<usize> {
        let base_row = self.base_row(row)?;
        let base = self.table();
        let base = base.borrow();
        match base.as_view() {
            Some(view) => view.root_row(base_row),
            None => Some(base_row),
        }
    }

    fn root_col(&self, col: usize) -> Option<usize> {
        let base_col = self.base_col(col)?;
        let base = self.table();
        let base = base.borrow();
        match base.as_view() {
            Some(view) => view.root_col(base_col),
            None => Some(base_col),
        }
    }
}

/// Unwraps views until a terminal table is reached.
pub fn root_of(table: SharedTable) -> SharedTable {
    let mut current = table;
    loop {
        let next = current.borrow().as_view().map(|view| view.table());
        match next {
            Some(base) => current = base,
            None => return current,
        }
    }
}

/// Forwards the computed column/row methods of `Table` to `self.base`.
macro_rules! delegate_calc {
    () => {
        fn add_calc_column(&mut self, calc: Box<dyn $crate::calc::CalcColumn>) {
            self.base.borrow_mut().add_calc_column(calc)
        }

        fn calc_columns(&self) -> Vec<Box<dyn $crate::calc::CalcColumn>> {
            self.base.borrow().calc_columns()
        }

        fn remove_calc_columns(&mut self) -> Vec<Box<dyn $crate::calc::CalcColumn>> {
            self.base.borrow_mut().remove_calc_columns()
        }

        fn add_calc_row(&mut self, calc: Box<dyn $crate::calc::CalcRow>) {
            self.base.borrow_mut().add_calc_row(calc)
        }

        fn calc_rows(&self) -> Vec<Box<dyn $crate::calc::CalcRow>> {
            self.base.borrow().calc_rows()
        }

        fn remove_calc_rows(&mut self) -> Vec<Box<dyn $crate::calc::CalcRow>> {
            self.base.borrow_mut().remove_calc_rows()
        }
    };
}
pub(crate) use delegate_calc;

/// Schema definition with column names, types and measure flags.
///
/// # Examples
///
/// ```
/// use brushview::{Schema, ColumnType};
///
/// let schema = Schema::new(vec![
///     ("Region".to_string(), ColumnType::String, false),  // dimension
///     ("Sales".to_string(), ColumnType::Float64, true),   // measure
/// ]);
///
/// assert_eq!(schema.len(), 2);
/// assert_eq!(schema.get_column_index("Sales"), Some(1));
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<(String, ColumnType, bool)>, // (name, type, measure)
}

impl Schema {
    /// Creates a new schema from (column_name, column_type, is_measure) tuples.
    pub fn new(columns: Vec<(String, ColumnType, bool)>) -> Self {
        Schema { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get_column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _, _)| name.as_str()).collect()
    }

    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _, _)| n == name)
    }

    /// Returns (name, type, measure) for the column at `index`.
    pub fn get_column_info(&self, index: usize) -> Option<(&str, ColumnType, bool)> {
        self.columns
            .get(index)
            .map(|(name, ty, measure)| (name.as_str(), *ty, *measure))
    }
}

/// Terminal table owning its data.
///
/// Row count is fixed once the query layer has filled the table; composition
/// creates views over it rather than mutating it. Computed rows, when
/// attached, follow the stored rows and computed columns follow the stored
/// columns.
#[derive(Clone)]
pub struct DataTable {
    name: String,
    schema: Schema,
    columns: Vec<Column>,
    row_count: usize,
    comparators: HashMap<usize, Comparator>,
    formats: HashMap<usize, CellFormat>,
    calc: CalcSupport,
}

impl DataTable {
    pub fn new(name: String, schema: Schema) -> Self {
        let columns = schema
            .columns
            .iter()
            .map(|(col_name, col_type, measure)| Column::new(col_name.clone(), *col_type, *measure))
            .collect();

        DataTable {
            name,
            schema,
            columns,
            row_count: 0,
            comparators: HashMap::new(),
            formats: HashMap::new(),
            calc: CalcSupport::default(),
        }
    }

    /// Builds a table from positional rows.
    pub fn from_rows(name: String, schema: Schema, rows: Vec<Vec<ColumnValue>>) -> Result<Self, ViewError> {
        let mut table = DataTable::new(name, schema);
        for row in rows {
            table.append_row(row)?;
        }
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Appends one row of values in schema order.
    /// The row is validated in full before any column is touched.
    pub fn append_row(&mut self, row: Vec<ColumnValue>) -> Result<(), ViewError> {
        if row.len() != self.columns.len() {
            return Err(ViewError::RowShape {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        for (col, value) in self.columns.iter().zip(&row) {
            col.check(value)?;
        }
        for (col, value) in self.columns.iter_mut().zip(row) {
            col.append(value)?;
        }
        self.row_count += 1;
        Ok(())
    }

    /// Appends one row given by column name. Columns missing from the
    /// record are null.
    pub fn append_record(&mut self, mut record: HashMap<String, ColumnValue>) -> Result<(), ViewError> {
        let row: Vec<ColumnValue> = self
            .schema
            .get_column_names()
            .iter()
            .map(|name| record.remove(*name).unwrap_or(ColumnValue::Null))
            .collect();

        if let Some(unknown) = record.into_keys().next() {
            return Err(ViewError::ColumnNotFound(unknown));
        }
        self.append_row(row)
    }

    pub fn set_comparator(&mut self, header: &str, comparator: Comparator) -> Result<(), ViewError> {
        let col = self
            .schema
            .get_column_index(header)
            .ok_or_else(|| ViewError::ColumnNotFound(header.to_string()))?;
        self.comparators.insert(col, comparator);
        Ok(())
    }

    pub fn set_format(&mut self, header: &str, format: CellFormat) -> Result<(), ViewError> {
        let col = self
            .schema
            .get_column_index(header)
            .ok_or_else(|| ViewError::ColumnNotFound(header.to_string()))?;
        self.formats.insert(col, format);
        Ok(())
    }
}

impl CalcHost for DataTable {
    fn calc(&self) -> &CalcSupport {
        &self.calc
    }

    fn calc_mut(&mut self) -> &mut CalcSupport {
        &mut self.calc
    }

    fn data_rows(&self) -> usize {
        self.row_count
    }

    fn data_cols(&self) -> usize {
        self.columns.len()
    }
}

impl Table for DataTable {
    fn row_count(&self) -> usize {
        self.row_count + self.calc.synthetic_len()
    }

    fn col_count(&self) -> usize {
        self.columns.len() + self.calc.column_count()
    }

    fn header(&self, col: usize) -> Option<String> {
        match self.columns.get(col) {
            Some(column) => Some(column.name().to_string()),
            None => self.calc.header(col - self.columns.len()).map(str::to_string),
        }
    }

    fn column_type(&self, col: usize) -> Option<ColumnType> {
        match self.columns.get(col) {
            Some(column) => Some(column.column_type()),
            None => self.calc.column_type(col - self.columns.len()),
        }
    }

    fn is_measure(&self, col: usize) -> bool {
        match self.columns.get(col) {
            Some(column) => column.is_measure(),
            None => self.calc.is_measure(col - self.columns.len()),
        }
    }

    fn index_of(&self, header: &str) -> Option<usize> {
        self.schema
            .get_column_index(header)
            .or_else(|| self.calc.index_of(header).map(|i| i + self.columns.len()))
    }

    #[inline]
    fn value(&self, col: usize, row: usize) -> ColumnValue {
        let stored_cols = self.columns.len();
        if col >= stored_cols {
            return self.calc.column_value(self, col - stored_cols, row);
        }
        if row >= self.row_count {
            return self.calc.synthetic_value(row - self.row_count, col);
        }
        self.columns[col].get(row).cloned().unwrap_or(ColumnValue::Null)
    }

    fn comparator(&self, col: usize) -> Option<Comparator> {
        self.comparators.get(&col).cloned()
    }

    fn set_value(&mut self, col: usize, row: usize, value: ColumnValue) -> Result<(), ViewError> {
        if row >= self.row_count {
            return Err(ViewError::RowOutOfRange {
                row,
                len: self.row_count,
            });
        }
        match self.columns.get_mut(col) {
            Some(column) => column.set(row, value),
            None => Err(ViewError::ReadOnly(format!("computed column {}", col))),
        }
    }

    fn prepare_calc(&mut self, dimension: Option<&str>, rows: Option<&[usize]>, compute_measures: bool) {
        self.calc.prepare(&*self, dimension, rows);
        if compute_measures {
            self.compute_calc();
        }
    }

    fn add_calc_column(&mut self, calc: Box<dyn CalcColumn>) {
        self.calc.add_column(calc);
    }

    fn calc_columns(&self) -> Vec<Box<dyn CalcColumn>> {
        self.calc.columns().to_vec()
    }

    fn remove_calc_columns(&mut self) -> Vec<Box<dyn CalcColumn>> {
        self.calc.take_columns()
    }

    fn add_calc_row(&mut self, calc: Box<dyn CalcRow>) {
        self.calc.add_row(calc);
    }

    fn calc_rows(&self) -> Vec<Box<dyn CalcRow>> {
        self.calc.rows().to_vec()
    }

    fn remove_calc_rows(&mut self) -> Vec<Box<dyn CalcRow>> {
        self.calc.take_rows()
    }

    fn remove_calc_values(&mut self) {
        self.calc.clear_values();
    }

    fn clone_table(&self, _shallow: bool) -> SharedTable {
        shared(self.clone())
    }

    fn formats(&self) -> Option<&dyn FormatSource> {
        Some(self)
    }
}

impl FormatSource for DataTable {
    fn format(&self, col: usize, _row: usize) -> Option<CellFormat> {
        if let Some(format) = self.formats.get(&col) {
            return Some(format.clone());
        }
        let calc = self.calc.column(col.checked_sub(self.columns.len())?)?;
        calc.is_percent().then_some(CellFormat::Percent)
    }
}

impl std::fmt::Debug for DataTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataTable")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("row_count", &self.row_count)
            .finish()
    }
}
