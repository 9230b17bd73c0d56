//! MergeView: one virtual table over an all-data table and its brushed subset.
//!
//! # Layout
//!
//! ```text
//!                  cols [0, base)            cols [base, base + measures)   calc cols
//!  rows [0, b)     brushed table             null                           computed
//!  rows [b, b + a) all table (measures only  all table measures             computed
//!                  where key was brushed)    ("__all__" prefixed)
//!  synthetic rows  generated by computed-row extensions (gap filling)
//! ```
//!
//! `base` is the brushed table's column count, `b` the brushed row count
//! after the semi-join against the all-data keys and `a` the all-data row
//! count (zero while brushed-only mode hides it).
//!
//! # Examples
//!
//! ```
//! use brushview::{shared, ColumnType, ColumnValue, DataTable, MergeView, Schema, Table};
//!
//! fn sales(rows: &[(&str, f64)]) -> DataTable {
//!     let schema = Schema::new(vec![
//!         ("Region".to_string(), ColumnType::String, false),
//!         ("Sales".to_string(), ColumnType::Float64, true),
//!     ]);
//!     let rows = rows
//!         .iter()
//!         .map(|(r, s)| vec![ColumnValue::String(r.to_string()), ColumnValue::Float64(*s)])
//!         .collect();
//!     DataTable::from_rows("sales".to_string(), schema, rows).unwrap()
//! }
//!
//! let all = shared(sales(&[("East", 10.0), ("West", 20.0)]));
//! let brushed = shared(sales(&[("East", 4.0)]));
//! let merged = MergeView::new(all, brushed);
//!
//! assert_eq!(merged.row_count(), 3);
//! assert_eq!(merged.header(2).as_deref(), Some("__all__Sales"));
//! assert_eq!(merged.value_of("Sales", 0).to_f64(), Some(4.0));
//! assert_eq!(merged.value_of("__all__Sales", 2).to_f64(), Some(20.0));
//! // West was not brushed, so its shared measure is hidden in the all-data band.
//! assert!(merged.value_of("Sales", 2).is_null());
//! ```

use crate::calc::{CalcColumn, CalcHost, CalcRow, CalcSupport, PresenceFn, SyntheticRow};
use crate::column::{ColumnType, ColumnValue};
use crate::config::MergeOptions;
use crate::error::ViewError;
use crate::format::{CellFormat, FormatSource};
use crate::index::{semi_join, DimensionTuple, KeyValue, TupleIndex};
use crate::table::{shared, Comparator, SharedTable, Table, TableView};
use log::debug;
use roaring::RoaringBitmap;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::rc::Rc;

/// Everything fixed at construction. Shared between clones.
struct MergeState {
    prefix: String,
    base_col_count: usize,
    brushed_rows: usize,
    all_rows: usize,
    measure_flags: Vec<bool>,
    /// Brushed column per measure
    measure_cols: Vec<usize>,
    /// Brushed column -> all-data column with the same header
    all_cols: Vec<Option<usize>>,
    /// Prefixed header per measure
    all_headers: Vec<String>,
    /// All-data column per measure
    all_measure_cols: Vec<Option<usize>>,
    /// Numeric subtype per shared column where the two tables disagree
    coercions: Vec<Option<ColumnType>>,
    dims: Vec<String>,
    dim_cols: Vec<usize>,
    brushed_keys: HashSet<DimensionTuple>,
    all_rows_in_brushed: RoaringBitmap,
    row_remap: Vec<Option<usize>>,
    dropped: usize,
}

impl MergeState {
    fn is_prefixed(&self, header: &str) -> bool {
        !self.prefix.is_empty() && header.starts_with(&self.prefix)
    }

    fn data_cols(&self) -> usize {
        self.base_col_count + self.all_headers.len()
    }

    fn coerce(&self, col: usize, value: ColumnValue) -> ColumnValue {
        match self.coercions.get(col).copied().flatten() {
            Some(target) => value.coerce(target).unwrap_or(value),
            None => value,
        }
    }

    /// Whether a generated row may carry a value for `measure`.
    fn is_present(&self, row: &SyntheticRow, measure: &str) -> bool {
        self.is_prefixed(measure)
            || row.source_row < self.brushed_rows
            || DimensionTuple::from_values(&row.values, &self.dim_cols)
                .is_some_and(|key| self.brushed_keys.contains(&key))
    }
}

/// Union of an all-data table and a brushed (filtered or zoomed) subset.
///
/// Shared columns come from the brushed table. Each measure is doubled by a
/// prefixed column read from the all-data table only. Brushed rows whose
/// dimension tuple does not occur in the all-data table are dropped.
pub struct MergeView {
    all: SharedTable,
    brushed: SharedTable,
    state: Rc<MergeState>,
    brushed_only: bool,
    calc: CalcSupport,
    comparators: RefCell<HashMap<usize, Comparator>>,
}

impl MergeView {
    /// Merges with default options. Computed columns and rows move from
    /// both inputs to the merged view.
    pub fn new(all: SharedTable, brushed: SharedTable) -> Self {
        Self::build(all, brushed, MergeOptions::default())
    }

    /// Merges with explicit options. Fails when the all-data prefix is empty
    /// or explicit measure flags do not cover exactly the brushed table's
    /// stored columns.
    pub fn with_options(all: SharedTable, brushed: SharedTable, options: MergeOptions) -> Result<Self, ViewError> {
        options.validate()?;
        if let Some(flags) = &options.measures {
            let table = brushed.borrow();
            let expected = table.col_count().saturating_sub(table.calc_columns().len());
            if flags.len() != expected {
                return Err(ViewError::MeasureFlags {
                    expected,
                    got: flags.len(),
                });
            }
        }
        Ok(Self::build(all, brushed, options))
    }

    fn build(all: SharedTable, brushed: SharedTable, options: MergeOptions) -> Self {
        let (brushed_calc_cols, brushed_calc_rows) = detach_calc(&brushed);
        let (all_calc_cols, all_calc_rows) = detach_calc(&all);

        let mut state = Self::classify(&all, &brushed, &options);
        let brushed_index = TupleIndex::build(&*brushed.borrow(), &state.dims);
        let all_index = TupleIndex::build(&*all.borrow(), &state.dims);
        state.brushed_keys = brushed_index
            .keys()
            .filter(|key| all_index.contains(key))
            .cloned()
            .collect::<HashSet<_>>();
        state.all_rows_in_brushed = all_index.matching_rows(&brushed_index);
        let join = semi_join(&brushed, &brushed_index, &all_index);

        state.brushed_rows = join.table.borrow().row_count();
        state.all_rows = all.borrow().row_count();
        state.row_remap = join.remap;
        state.dropped = join.dropped;
        debug!(
            "merged {} brushed rows ({} dropped by semi-join) with {} all-data rows; dims {:?}, {} measures",
            state.brushed_rows,
            state.dropped,
            state.all_rows,
            state.dims,
            state.all_headers.len()
        );

        let mut view = MergeView {
            all,
            brushed: join.table,
            state: Rc::new(state),
            brushed_only: options.brushed_only,
            calc: CalcSupport::default(),
            comparators: RefCell::new(HashMap::new()),
        };
        view.attach_calc(brushed_calc_cols, brushed_calc_rows, all_calc_cols, all_calc_rows);
        view
    }

    /// Column classification, key columns and numeric coercions.
    fn classify(all: &SharedTable, brushed: &SharedTable, options: &MergeOptions) -> MergeState {
        let all = all.borrow();
        let brushed = brushed.borrow();
        let base_col_count = brushed.col_count();
        let headers: Vec<String> = (0..base_col_count)
            .map(|c| brushed.header(c).unwrap_or_default())
            .collect();

        let measure_flags: Vec<bool> = match &options.measures {
            Some(flags) => flags.clone(),
            None => headers
                .iter()
                .enumerate()
                .map(|(c, h)| brushed.is_measure(c) && !options.is_discrete(h))
                .collect(),
        };
        let all_cols: Vec<Option<usize>> = headers.iter().map(|h| all.index_of(h)).collect();

        let coercions = (0..base_col_count)
            .map(|c| {
                let brushed_type = brushed.column_type(c)?;
                let all_type = all_cols[c].and_then(|ac| all.column_type(ac))?;
                if brushed_type == all_type {
                    return None;
                }
                let target = brushed_type.promote(all_type)?;
                debug!(
                    "column '{}': brushed {:?} and all-data {:?} read as {:?}",
                    headers[c], brushed_type, all_type, target
                );
                Some(target)
            })
            .collect();

        let dim_cols: Vec<usize> = (0..base_col_count)
            .filter(|c| !measure_flags.get(*c).copied().unwrap_or(false) && !options.is_discrete(&headers[*c]))
            .collect();
        let measure_cols: Vec<usize> = (0..base_col_count)
            .filter(|c| measure_flags.get(*c).copied().unwrap_or(false))
            .collect();

        MergeState {
            prefix: options.all_prefix.clone(),
            base_col_count,
            brushed_rows: 0,
            all_rows: 0,
            all_headers: measure_cols
                .iter()
                .map(|c| format!("{}{}", options.all_prefix, headers[*c]))
                .collect(),
            all_measure_cols: measure_cols.iter().map(|c| all_cols[*c]).collect(),
            measure_flags,
            measure_cols,
            all_cols,
            coercions,
            dims: dim_cols.iter().map(|c| headers[*c].clone()).collect(),
            dim_cols,
            brushed_keys: HashSet::new(),
            all_rows_in_brushed: RoaringBitmap::new(),
            row_remap: Vec::new(),
            dropped: 0,
        }
    }

    fn attach_calc(
        &mut self,
        brushed_cols: Vec<Box<dyn CalcColumn>>,
        brushed_rows: Vec<Box<dyn CalcRow>>,
        all_cols: Vec<Box<dyn CalcColumn>>,
        all_rows: Vec<Box<dyn CalcRow>>,
    ) {
        let prefix = self.state.prefix.clone();
        for calc in brushed_cols {
            let repointed = match calc.total_field() {
                Some(total) if calc.is_percent() => Some(calc.with_total_field(&format!("{}{}", prefix, total))),
                _ => None,
            };
            self.calc.add_column(repointed.unwrap_or(calc));
        }
        for calc in all_cols {
            self.calc.add_column(calc.with_prefix(&prefix));
        }

        let generators = if brushed_rows.is_empty() { all_rows } else { brushed_rows };
        for mut generator in generators {
            if generator.fills_time_gaps() {
                let state = Rc::clone(&self.state);
                let presence: PresenceFn =
                    Rc::new(move |_: &dyn Table, row: &SyntheticRow, measure: &str| state.is_present(row, measure));
                generator.set_presence(Some(presence));
            }
            self.calc.add_row(generator);
        }

        if !self.calc.is_empty() {
            self.compute_calc();
        }
    }

    /// Hides the all-data rows while the brushed set is non-empty.
    pub fn set_brushed_data_only(&mut self, brushed_only: bool) {
        if self.brushed_only == brushed_only {
            return;
        }
        self.brushed_only = brushed_only;
        if !self.calc.is_empty() {
            self.compute_calc();
        }
    }

    pub fn is_brushed_data_only(&self) -> bool {
        self.brushed_only
    }

    /// Rows in the brushed band, after the semi-join.
    pub fn brushed_row_count(&self) -> usize {
        self.state.brushed_rows
    }

    /// Rows in the all-data band as currently shown.
    pub fn all_row_count(&self) -> usize {
        if self.brushed_only && self.state.brushed_rows > 0 {
            0
        } else {
            self.state.all_rows
        }
    }

    pub fn all_table(&self) -> SharedTable {
        Rc::clone(&self.all)
    }

    /// The brushed table after the semi-join.
    pub fn brushed_table(&self) -> SharedTable {
        Rc::clone(&self.brushed)
    }

    /// Key columns of the semi-join.
    pub fn dims(&self) -> &[String] {
        &self.state.dims
    }

    pub fn measure_count(&self) -> usize {
        self.state.all_headers.len()
    }

    pub fn all_prefix(&self) -> &str {
        &self.state.prefix
    }

    /// Merged row of a row of the original brushed table, `None` when the
    /// semi-join dropped it.
    pub fn brushed_row_of(&self, original_row: usize) -> Option<usize> {
        self.state.row_remap.get(original_row).copied().flatten()
    }

    pub fn dropped_rows(&self) -> usize {
        self.state.dropped
    }

    /// All-data column behind merged column `col`.
    fn all_col(&self, col: usize) -> Option<usize> {
        let state = &self.state;
        if col < state.base_col_count {
            state.all_cols[col]
        } else {
            state.all_measure_cols.get(col - state.base_col_count).copied().flatten()
        }
    }

    fn data_value(&self, col: usize, row: usize) -> ColumnValue {
        let state = &self.state;
        let base = state.base_col_count;
        if row < state.brushed_rows {
            if col >= base {
                return ColumnValue::Null;
            }
            return state.coerce(col, self.brushed.borrow().value(col, row));
        }

        let all_row = row - state.brushed_rows;
        if col < base && state.measure_flags[col] && !state.all_rows_in_brushed.contains(all_row as u32) {
            return ColumnValue::Null;
        }
        let Some(all_col) = self.all_col(col) else {
            return ColumnValue::Null;
        };
        let value = self.all.borrow().value(all_col, all_row);
        if col < base {
            state.coerce(col, value)
        } else {
            value
        }
    }
}

fn detach_calc(table: &SharedTable) -> (Vec<Box<dyn CalcColumn>>, Vec<Box<dyn CalcRow>>) {
    let mut table = table.borrow_mut();
    let columns = table.remove_calc_columns();
    let rows = table.remove_calc_rows();
    table.remove_calc_values();
    (columns, rows)
}

/// Orders values by their first occurrence in `col` of `table`. Values not
/// seen there sort after all seen values.
fn first_occurrence_order(table: &dyn Table, col: usize) -> Comparator {
    let mut order: HashMap<KeyValue, usize> = HashMap::new();
    for row in 0..table.row_count() {
        let next = order.len();
        order.entry(KeyValue::from(&table.value(col, row))).or_insert(next);
    }
    Rc::new(move |a: &ColumnValue, b: &ColumnValue| {
        let (a, b) = (KeyValue::from(a), KeyValue::from(b));
        match (order.get(&a), order.get(&b)) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(&b),
        }
    })
}

impl CalcHost for MergeView {
    fn calc(&self) -> &CalcSupport {
        &self.calc
    }

    fn calc_mut(&mut self) -> &mut CalcSupport {
        &mut self.calc
    }

    fn data_rows(&self) -> usize {
        self.state.brushed_rows + self.all_row_count()
    }

    fn data_cols(&self) -> usize {
        self.state.data_cols()
    }

    fn row_bands(&self) -> Vec<Range<usize>> {
        let brushed = self.state.brushed_rows;
        vec![0..brushed, brushed..brushed + self.all_row_count()]
    }
}

impl Table for MergeView {
    fn row_count(&self) -> usize {
        self.data_rows() + self.calc.synthetic_len()
    }

    fn row_count_unprojected(&self) -> usize {
        self.state.brushed_rows + self.state.all_rows + self.calc.synthetic_len()
    }

    fn col_count(&self) -> usize {
        self.data_cols() + self.calc.column_count()
    }

    fn header(&self, col: usize) -> Option<String> {
        let state = &self.state;
        if col < state.base_col_count {
            self.brushed.borrow().header(col)
        } else if col < state.data_cols() {
            state.all_headers.get(col - state.base_col_count).cloned()
        } else {
            self.calc.header(col - state.data_cols()).map(str::to_string)
        }
    }

    fn column_type(&self, col: usize) -> Option<ColumnType> {
        let state = &self.state;
        if col < state.base_col_count {
            state.coercions[col].or_else(|| self.brushed.borrow().column_type(col))
        } else if col < state.data_cols() {
            match self.all_col(col) {
                Some(all_col) => self.all.borrow().column_type(all_col),
                None => {
                    let brushed_col = state.measure_cols[col - state.base_col_count];
                    self.brushed.borrow().column_type(brushed_col)
                }
            }
        } else {
            self.calc.column_type(col - state.data_cols())
        }
    }

    fn is_measure(&self, col: usize) -> bool {
        let state = &self.state;
        if col < state.base_col_count {
            state.measure_flags[col]
        } else if col < state.data_cols() {
            true
        } else {
            self.calc.is_measure(col - state.data_cols())
        }
    }

    fn index_of(&self, header: &str) -> Option<usize> {
        let state = &self.state;
        let calc_index = || self.calc.index_of(header).map(|i| state.data_cols() + i);
        if state.is_prefixed(header) {
            return match state.all_headers.iter().position(|h| h == header) {
                Some(pos) => Some(state.base_col_count + pos),
                None => calc_index(),
            };
        }
        self.brushed
            .borrow()
            .index_of(header)
            .filter(|c| *c < state.base_col_count)
            .or_else(calc_index)
    }

    fn value(&self, col: usize, row: usize) -> ColumnValue {
        let data_cols = self.data_cols();
        if col >= data_cols {
            return self.calc.column_value(self, col - data_cols, row);
        }
        let data_rows = self.data_rows();
        if row >= data_rows {
            return self.calc.synthetic_value(row - data_rows, col);
        }
        self.data_value(col, row)
    }

    /// The brushed table's comparator, else one keeping the all-data
    /// table's row order so brushing never reorders a categorical axis.
    fn comparator(&self, col: usize) -> Option<Comparator> {
        let state = &self.state;
        if col >= state.data_cols() {
            return None;
        }
        if col < state.base_col_count {
            if let Some(comparator) = self.brushed.borrow().comparator(col) {
                return Some(comparator);
            }
        }
        let all_col = self.all_col(col)?;
        if let Some(comparator) = self.all.borrow().comparator(all_col) {
            return Some(comparator);
        }
        let comparator = Rc::clone(
            self.comparators
                .borrow_mut()
                .entry(col)
                .or_insert_with(|| first_occurrence_order(&*self.all.borrow(), all_col)),
        );
        Some(comparator)
    }

    fn set_value(&mut self, col: usize, row: usize, value: ColumnValue) -> Result<(), ViewError> {
        let state = &self.state;
        let read_only = || ViewError::ReadOnly(format!("merged cell ({}, {})", col, row));
        if col >= state.data_cols() || row >= self.data_rows() {
            return Err(read_only());
        }
        if row < state.brushed_rows {
            if col >= state.base_col_count {
                return Err(read_only());
            }
            return self.brushed.borrow_mut().set_value(col, row, value);
        }
        let all_col = self.all_col(col).ok_or_else(read_only)?;
        self.all
            .borrow_mut()
            .set_value(all_col, row - state.brushed_rows, value)
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

    /// A deep clone copies both wrapped tables; construction state is shared.
    fn clone_table(&self, shallow: bool) -> SharedTable {
        let (all, brushed) = if shallow {
            (Rc::clone(&self.all), Rc::clone(&self.brushed))
        } else {
            (
                self.all.borrow().clone_table(false),
                self.brushed.borrow().clone_table(false),
            )
        };
        shared(MergeView {
            all,
            brushed,
            state: Rc::clone(&self.state),
            brushed_only: self.brushed_only,
            calc: self.calc.clone(),
            comparators: RefCell::new(HashMap::new()),
        })
    }

    fn as_view(&self) -> Option<&dyn TableView> {
        Some(self)
    }

    fn formats(&self) -> Option<&dyn FormatSource> {
        Some(self)
    }
}

impl TableView for MergeView {
    /// The brushed table after the semi-join.
    fn table(&self) -> SharedTable {
        Rc::clone(&self.brushed)
    }

    fn base_row(&self, row: usize) -> Option<usize> {
        (row < self.state.brushed_rows).then_some(row)
    }

    fn base_col(&self, col: usize) -> Option<usize> {
        (col < self.state.base_col_count).then_some(col)
    }

    /// Both bands take part in range and stacking computation downstream.
    fn root_row(&self, row: usize) -> Option<usize> {
        (row < self.row_count()).then_some(row)
    }
}

impl FormatSource for MergeView {
    fn format(&self, col: usize, row: usize) -> Option<CellFormat> {
        let state = &self.state;
        if col >= state.data_cols() {
            let calc = self.calc.column(col - state.data_cols())?;
            return calc.is_percent().then_some(CellFormat::Percent);
        }
        if col < state.base_col_count && row < state.brushed_rows {
            let brushed = self.brushed.borrow();
            return brushed.formats()?.format(col, row);
        }
        if row < state.brushed_rows {
            return None;
        }
        let all_col = self.all_col(col)?;
        let all = self.all.borrow();
        let source = all.formats()?;
        source.format(all_col, row - state.brushed_rows)
    }
}

impl std::fmt::Debug for MergeView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeView")
            .field("brushed_rows", &self.state.brushed_rows)
            .field("all_rows", &self.state.all_rows)
            .field("dims", &self.state.dims)
            .field("measures", &self.state.all_headers)
            .field("brushed_only", &self.brushed_only)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::{GapFill, PercentColumn, TimeSeriesRow};
    use crate::table::{DataTable, Schema};

    fn table(sales_type: ColumnType, rows: &[(&str, i32, f64)]) -> DataTable {
        let schema = Schema::new(vec![
            ("Region".to_string(), ColumnType::String, false),
            ("Month".to_string(), ColumnType::Int32, false),
            ("Sales".to_string(), sales_type, true),
        ]);
        let rows = rows
            .iter()
            .map(|(region, month, sales)| {
                vec![
                    ColumnValue::String(region.to_string()),
                    ColumnValue::Int32(*month),
                    ColumnValue::Float64(*sales).coerce(sales_type).unwrap(),
                ]
            })
            .collect();
        DataTable::from_rows("sales".to_string(), schema, rows).unwrap()
    }

    fn all_data() -> DataTable {
        table(
            ColumnType::Int64,
            &[("East", 1, 10.0), ("West", 1, 20.0), ("East", 2, 30.0), ("West", 2, 40.0)],
        )
    }

    fn zoomed() -> DataTable {
        table(
            ColumnType::Float64,
            &[("East", 2, 3.0), ("North", 2, 5.0), ("West", 2, 4.0)],
        )
    }

    fn merged() -> MergeView {
        MergeView::new(shared(all_data()), shared(zoomed()))
    }

    #[test]
    fn test_layout() {
        let view = merged();
        assert_eq!(view.brushed_row_count(), 2);
        assert_eq!(view.all_row_count(), 4);
        assert_eq!(view.row_count(), 6);
        assert_eq!(view.col_count(), 4);
        assert_eq!(view.dims(), &["Region".to_string(), "Month".to_string()]);
        assert_eq!(view.measure_count(), 1);

        assert_eq!(view.header(3).as_deref(), Some("__all__Sales"));
        assert_eq!(view.index_of("__all__Sales"), Some(3));
        assert_eq!(view.index_of("Sales"), Some(2));
        assert_eq!(view.index_of("__all__Region"), None);
        assert!(view.is_measure(3));
        assert!(!view.is_measure(0));
        assert!(view.header(4).is_none());
    }

    #[test]
    fn test_semi_join_drops_unknown_keys() {
        let view = merged();
        for row in 0..view.brushed_row_count() {
            assert_ne!(view.value(0, row).as_string(), Some("North"));
        }
        assert_eq!(view.dropped_rows(), 1);
        assert_eq!(view.brushed_row_of(0), Some(0));
        assert_eq!(view.brushed_row_of(1), None);
        assert_eq!(view.brushed_row_of(2), Some(1));
    }

    #[test]
    fn test_bands() {
        let view = merged();
        // Brushed band: prefixed measure is empty.
        assert_eq!(view.value_of("Sales", 1).to_f64(), Some(4.0));
        assert!(view.value_of("__all__Sales", 1).is_null());

        // All-data band: dimensions from the all table, shared measure only
        // for keys that were brushed.
        assert_eq!(view.value_of("Month", 2).as_i32(), Some(1));
        assert!(view.value_of("Sales", 2).is_null());
        assert_eq!(view.value_of("Sales", 4).to_f64(), Some(30.0));

        for row in view.brushed_row_count()..view.row_count() {
            let all_row = row - view.brushed_row_count();
            assert_eq!(
                view.value_of("__all__Sales", row),
                view.all_table().borrow().value_of("Sales", all_row)
            );
        }
    }

    #[test]
    fn test_numeric_coercion() {
        let view = merged();
        assert_eq!(view.type_of("Sales"), Some(ColumnType::Float64));
        assert_eq!(view.type_of("__all__Sales"), Some(ColumnType::Int64));
        for row in 0..view.brushed_row_count() {
            assert!(matches!(view.value_of("Sales", row), ColumnValue::Float64(_)));
        }
        assert_eq!(view.value_of("Sales", 5), ColumnValue::Float64(40.0));
    }

    #[test]
    fn test_discrete_measure_is_not_a_key() {
        let schema = || {
            Schema::new(vec![
                ("Region".to_string(), ColumnType::String, false),
                ("discrete_Rank".to_string(), ColumnType::Int32, true),
                ("Sales".to_string(), ColumnType::Float64, true),
            ])
        };
        let row = |region: &str, rank: i32, sales: f64| {
            vec![
                ColumnValue::String(region.to_string()),
                ColumnValue::Int32(rank),
                ColumnValue::Float64(sales),
            ]
        };
        let all = DataTable::from_rows("all".to_string(), schema(), vec![row("East", 1, 1.0)]).unwrap();
        let brushed = DataTable::from_rows("brushed".to_string(), schema(), vec![row("East", 7, 2.0)]).unwrap();
        let view = MergeView::new(shared(all), shared(brushed));

        assert_eq!(view.dims(), &["Region".to_string()]);
        assert_eq!(view.brushed_row_count(), 1);
        assert_eq!(view.col_count(), 4);
        assert!(!view.is_measure_header("discrete_Rank"));
        assert_eq!(view.index_of("__all__discrete_Rank"), None);
    }

    #[test]
    fn test_explicit_measure_flags() {
        let options = MergeOptions::default().with_measures(vec![false, false]);
        let err = MergeView::with_options(shared(all_data()), shared(zoomed()), options).unwrap_err();
        assert!(matches!(err, ViewError::MeasureFlags { expected: 3, got: 2 }));

        // Month flagged as a measure: it is doubled and no longer a key.
        let options = MergeOptions::default().with_measures(vec![false, true, true]);
        let view = MergeView::with_options(shared(all_data()), shared(zoomed()), options).unwrap();
        assert_eq!(view.dims(), &["Region".to_string()]);
        assert_eq!(view.col_count(), 5);
        assert_eq!(view.header(3).as_deref(), Some("__all__Month"));
    }

    #[test]
    fn test_comparator_follows_all_data_order() {
        let all = table(ColumnType::Int64, &[("West", 1, 1.0), ("East", 1, 2.0)]);
        let brushed = table(ColumnType::Int64, &[("East", 1, 2.0)]);
        let view = MergeView::new(shared(all), shared(brushed));

        let cmp = view.comparator_of("Region").unwrap();
        let east = ColumnValue::String("East".to_string());
        let west = ColumnValue::String("West".to_string());
        let north = ColumnValue::String("North".to_string());
        assert_eq!(cmp(&west, &east), Ordering::Less);
        assert_eq!(cmp(&north, &east), Ordering::Greater);
        assert!(view.comparator(9).is_none());
    }

    #[test]
    fn test_brushed_only_toggle() {
        let mut view = merged();
        view.set_brushed_data_only(true);
        assert!(view.is_brushed_data_only());
        assert_eq!(view.row_count(), 2);
        assert_eq!(view.row_count_unprojected(), 6);

        view.set_brushed_data_only(false);
        assert_eq!(view.row_count(), 6);
    }

    #[test]
    fn test_brushed_only_with_empty_brush_keeps_all_data() {
        let options = MergeOptions {
            brushed_only: true,
            ..MergeOptions::default()
        };
        let view = MergeView::with_options(shared(all_data()), shared(table(ColumnType::Int64, &[])), options).unwrap();
        assert_eq!(view.brushed_row_count(), 0);
        assert_eq!(view.row_count(), 4);
    }

    #[test]
    fn test_percent_columns_are_repointed() {
        let mut all = all_data();
        all.add_calc_column(Box::new(PercentColumn::new("Share", "Sales", "Sales")));
        let mut brushed = zoomed();
        brushed.add_calc_column(Box::new(PercentColumn::new("Share", "Sales", "Sales")));
        let all = shared(all);
        let brushed = shared(brushed);
        let view = MergeView::new(Rc::clone(&all), Rc::clone(&brushed));

        // Computed columns moved to the merged view.
        assert_eq!(all.borrow().col_count(), 3);
        assert_eq!(brushed.borrow().col_count(), 3);
        assert_eq!(view.col_count(), 6);

        let share = view.index_of("Share").unwrap();
        let all_share = view.index_of("__all__Share").unwrap();
        assert_eq!((share, all_share), (4, 5));
        assert_eq!(view.calc_columns()[0].total_field(), Some("__all__Sales"));
        assert_eq!(view.value(share, 0).to_f64(), Some(3.0 / 100.0));
        assert_eq!(view.value(all_share, 2).to_f64(), Some(10.0 / 100.0));
        assert!(view.value(all_share, 0).is_null());
        assert_eq!(view.format(share, 0), Some(CellFormat::Percent));
    }

    #[test]
    fn test_gap_rows_respect_brushed_keys() {
        let all = table(ColumnType::Int64, &[("East", 1, 10.0), ("East", 3, 30.0)]);
        let mut brushed = table(ColumnType::Int64, &[("East", 3, 5.0)]);
        brushed.add_calc_row(Box::new(TimeSeriesRow::new("Month", 1.0, GapFill::Zero)));
        let view = MergeView::new(shared(all), shared(brushed));

        assert_eq!(view.row_count(), 4);
        assert_eq!(view.value_of("Month", 3).as_i32(), Some(2));
        // The gap row lies in the all-data band and its key was never brushed.
        assert!(view.value_of("Sales", 3).is_null());
        assert_eq!(view.value_of("__all__Sales", 3), ColumnValue::Int64(0));

        let mut view = view;
        view.remove_calc_values();
        assert_eq!(view.row_count(), 3);
    }

    #[test]
    fn test_gap_rows_fill_the_brushed_band_on_its_own() {
        let all = table(
            ColumnType::Int64,
            &[("East", 1, 10.0), ("East", 2, 20.0), ("East", 3, 30.0), ("East", 4, 40.0)],
        );
        let mut brushed = table(ColumnType::Int64, &[("East", 1, 1.0), ("East", 4, 4.0)]);
        brushed.add_calc_row(Box::new(TimeSeriesRow::new("Month", 1.0, GapFill::Zero)));
        let view = MergeView::new(shared(all), shared(brushed));

        // The complete all-data series must not hide the brushed gaps.
        assert_eq!(view.brushed_row_count(), 2);
        assert_eq!(view.all_row_count(), 4);
        assert_eq!(view.row_count(), 8);
        for (row, month) in [(6, 2), (7, 3)] {
            assert_eq!(view.value_of("Month", row).as_i32(), Some(month));
            assert_eq!(view.value_of("Region", row).as_string(), Some("East"));
            // Gap rows of the brushed band keep their measures.
            assert_eq!(view.value_of("Sales", row), ColumnValue::Int64(0));
        }
        assert_eq!(view.calc.synthetic_row(0).map(|r| r.source_row), Some(0));
    }

    #[test]
    fn test_gap_rows_keep_measures_for_brushed_keys() {
        let schema = || {
            Schema::new(vec![
                ("Region".to_string(), ColumnType::String, false),
                ("discrete_Batch".to_string(), ColumnType::Int32, true),
                ("Month".to_string(), ColumnType::Int32, false),
                ("Sales".to_string(), ColumnType::Int64, true),
            ])
        };
        let row = |batch: i32, month: i32, sales: i64| {
            vec![
                ColumnValue::String("East".to_string()),
                ColumnValue::Int32(batch),
                ColumnValue::Int32(month),
                ColumnValue::Int64(sales),
            ]
        };
        let all = DataTable::from_rows(
            "all".to_string(),
            schema(),
            vec![row(1, 1, 10), row(1, 3, 30), row(2, 2, 20)],
        )
        .unwrap();
        let mut brushed = DataTable::from_rows("brushed".to_string(), schema(), vec![row(2, 2, 5)]).unwrap();
        brushed.add_calc_row(Box::new(TimeSeriesRow::new("Month", 1.0, GapFill::Zero)));
        let view = MergeView::new(shared(all), shared(brushed));

        // Batch 1 misses month 2 in the all-data band; (East, 2) was brushed.
        assert_eq!(view.dims(), &["Region".to_string(), "Month".to_string()]);
        assert_eq!(view.row_count(), 5);
        assert_eq!(view.value_of("discrete_Batch", 4).as_i32(), Some(1));
        assert_eq!(view.value_of("Month", 4).as_i32(), Some(2));
        assert!(view.calc.synthetic_row(0).is_some_and(|r| r.source_row >= view.brushed_row_count()));
        assert_eq!(view.value_of("Sales", 4), ColumnValue::Int64(0));
        assert_eq!(view.value_of("__all__Sales", 4), ColumnValue::Int64(0));
    }

    #[test]
    fn test_empty_all_prefix_is_rejected() {
        let options = MergeOptions {
            all_prefix: String::new(),
            ..MergeOptions::default()
        };
        let err = MergeView::with_options(shared(all_data()), shared(zoomed()), options).unwrap_err();
        assert!(matches!(err, ViewError::EmptyPrefix));
    }

    #[test]
    fn test_formats_follow_bands() {
        let mut all = all_data();
        all.set_format("Sales", CellFormat::Decimal(2)).unwrap();
        let view = MergeView::new(shared(all), shared(zoomed()));

        // The prefixed column is empty in the brushed band.
        assert!(view.value(3, 0).is_null());
        assert_eq!(view.format(3, 0), None);
        assert_eq!(view.format(3, 2), Some(CellFormat::Decimal(2)));
        assert_eq!(view.format(2, 0), None);
    }

    #[test]
    fn test_row_and_column_mapping() {
        let view = merged();
        assert_eq!(view.base_row(1), Some(1));
        assert_eq!(view.base_row(2), None);
        assert_eq!(view.root_row(5), Some(5));
        assert_eq!(view.root_row(6), None);
        assert_eq!(view.base_col(2), Some(2));
        assert_eq!(view.base_col(3), None);
        assert_eq!(view.root_col(2), Some(2));

        // The brushed table was filtered, so its second row maps to the third
        // row of the original brushed table.
        let brushed = view.brushed_table();
        let subset = brushed.borrow();
        assert_eq!(subset.as_view().and_then(|v| v.base_row(1)), Some(2));
    }

    #[test]
    fn test_set_value_by_band() {
        let all = shared(all_data());
        let mut view = MergeView::new(Rc::clone(&all), shared(zoomed()));
        view.set_value(3, 2, ColumnValue::Int64(11)).unwrap();
        assert_eq!(all.borrow().value_of("Sales", 0), ColumnValue::Int64(11));
        assert!(matches!(
            view.set_value(3, 0, ColumnValue::Int64(1)),
            Err(ViewError::ReadOnly(_))
        ));
    }

    #[test]
    fn test_clone_independence() {
        let view = merged();
        let copy = view.clone_table(false);
        copy.borrow_mut().set_value(2, 0, ColumnValue::Float64(-1.0)).unwrap();
        copy.borrow_mut().set_value(3, 2, ColumnValue::Int64(-1)).unwrap();

        assert_eq!(view.value_of("Sales", 0).to_f64(), Some(3.0));
        assert_eq!(view.value_of("__all__Sales", 2), ColumnValue::Int64(10));
        assert_eq!(copy.borrow().value_of("Sales", 0).to_f64(), Some(-1.0));
    }
}
