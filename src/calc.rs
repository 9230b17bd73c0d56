//! Computed columns and rows.
//!
//! A computed column is a narrow callback: given the composed table and a
//! row, produce a value. A computed row generator appends synthetic rows
//! after a table's stored rows (time-series gap filling). Both are attached
//! to a table after construction, cached by one computation pass, and can be
//! cleared and recomputed between render passes without rebuilding the table.

use crate::column::{ColumnType, ColumnValue};
use crate::index::{DimensionTuple, KeyValue};
use crate::table::Table;
use log::{trace, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Range;
use std::rc::Rc;

/// Upper bound on synthetic rows one generator may emit.
const MAX_GAP_ROWS: usize = 100_000;

/// Decides whether a measure of a synthetic row is present (filled) or
/// absent (left null so no segment is drawn through it).
pub type PresenceFn = Rc<dyn Fn(&dyn Table, &SyntheticRow, &str) -> bool>;

/// Pluggable computed column.
pub trait CalcColumn {
    fn header(&self) -> &str;

    /// The column the value is computed from.
    fn field(&self) -> &str;

    fn column_type(&self) -> ColumnType {
        ColumnType::Float64
    }

    fn is_measure(&self) -> bool {
        true
    }

    fn is_percent(&self) -> bool {
        false
    }

    /// Column holding the totals a percent column divides by.
    fn total_field(&self) -> Option<&str> {
        None
    }

    /// Precomputes state for a grouping over a row subset.
    fn prepare(&self, _table: &dyn Table, _dimension: Option<&str>, _rows: Option<&[usize]>) {}

    fn calculate(&self, table: &dyn Table, row: usize) -> ColumnValue;

    /// Drops precomputed state.
    fn clear(&self) {}

    /// Copy with `prefix` prepended to the header and every referenced field.
    fn with_prefix(&self, prefix: &str) -> Box<dyn CalcColumn>;

    /// Copy whose totals come from `total`. Columns without totals return an
    /// unchanged copy.
    fn with_total_field(&self, _total: &str) -> Box<dyn CalcColumn> {
        self.box_clone()
    }

    fn box_clone(&self) -> Box<dyn CalcColumn>;
}

impl Clone for Box<dyn CalcColumn> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Pluggable computed-row generator.
pub trait CalcRow {
    /// Generates synthetic rows from `rows` and the first `data_cols`
    /// columns of `table`.
    fn generate(&self, table: &dyn Table, rows: Range<usize>, data_cols: usize) -> Vec<SyntheticRow>;

    fn fills_time_gaps(&self) -> bool {
        false
    }

    fn set_presence(&mut self, _presence: Option<PresenceFn>) {}

    fn box_clone(&self) -> Box<dyn CalcRow>;
}

impl Clone for Box<dyn CalcRow> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// A generated row.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticRow {
    /// Row the synthetic row was derived from
    pub source_row: usize,
    /// One value per data column
    pub values: Vec<ColumnValue>,
}

/// Computed columns and rows attached to one table, with their caches.
#[derive(Clone, Default)]
pub struct CalcSupport {
    columns: Vec<Box<dyn CalcColumn>>,
    rows: Vec<Box<dyn CalcRow>>,
    synthetic: Vec<SyntheticRow>,
    values: RefCell<Vec<Option<Vec<ColumnValue>>>>,
}

impl CalcSupport {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn synthetic_len(&self) -> usize {
        self.synthetic.len()
    }

    pub fn add_column(&mut self, calc: Box<dyn CalcColumn>) {
        self.columns.push(calc);
        self.values.get_mut().push(None);
    }

    pub fn columns(&self) -> &[Box<dyn CalcColumn>] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&dyn CalcColumn> {
        self.columns.get(index).map(|c| c.as_ref())
    }

    pub fn take_columns(&mut self) -> Vec<Box<dyn CalcColumn>> {
        self.values.get_mut().clear();
        std::mem::take(&mut self.columns)
    }

    pub fn add_row(&mut self, calc: Box<dyn CalcRow>) {
        self.rows.push(calc);
    }

    pub fn rows(&self) -> &[Box<dyn CalcRow>] {
        &self.rows
    }

    pub fn take_rows(&mut self) -> Vec<Box<dyn CalcRow>> {
        self.synthetic.clear();
        std::mem::take(&mut self.rows)
    }

    pub fn header(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|c| c.header())
    }

    pub fn index_of(&self, header: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.header() == header)
    }

    pub fn column_type(&self, index: usize) -> Option<ColumnType> {
        self.columns.get(index).map(|c| c.column_type())
    }

    pub fn is_measure(&self, index: usize) -> bool {
        self.columns.get(index).is_some_and(|c| c.is_measure())
    }

    pub fn synthetic_value(&self, index: usize, col: usize) -> ColumnValue {
        self.synthetic
            .get(index)
            .and_then(|row| row.values.get(col))
            .cloned()
            .unwrap_or(ColumnValue::Null)
    }

    pub fn synthetic_row(&self, index: usize) -> Option<&SyntheticRow> {
        self.synthetic.get(index)
    }

    /// Value of computed column `index` at `row`, from the cache when one
    /// exists and computed on demand otherwise.
    pub fn column_value(&self, table: &dyn Table, index: usize, row: usize) -> ColumnValue {
        if let Some(Some(cached)) = self.values.borrow().get(index) {
            if let Some(value) = cached.get(row) {
                return value.clone();
            }
        }
        match self.columns.get(index) {
            Some(calc) if row < table.row_count() => calc.calculate(table, row),
            _ => ColumnValue::Null,
        }
    }

    pub fn prepare(&self, table: &dyn Table, dimension: Option<&str>, rows: Option<&[usize]>) {
        for calc in &self.columns {
            calc.prepare(table, dimension, rows);
        }
    }

    /// Runs every generator once per row band. Bands never share a series.
    pub fn generate_rows(&self, table: &dyn Table, bands: &[Range<usize>], data_cols: usize) -> Vec<SyntheticRow> {
        self.rows
            .iter()
            .flat_map(move |generator| {
                bands
                    .iter()
                    .filter(|band| !band.is_empty())
                    .flat_map(move |band| generator.generate(table, band.clone(), data_cols))
            })
            .collect()
    }

    pub fn set_synthetic(&mut self, rows: Vec<SyntheticRow>) {
        self.synthetic = rows;
    }

    /// Fills the value cache of every computed column over all rows of `table`.
    pub fn compute_values(&self, table: &dyn Table) {
        self.reset_cache();
        let row_count = table.row_count();
        for (index, calc) in self.columns.iter().enumerate() {
            let computed: Vec<ColumnValue> = (0..row_count).map(|row| calc.calculate(table, row)).collect();
            if let Some(slot) = self.values.borrow_mut().get_mut(index) {
                *slot = Some(computed);
            }
        }
        trace!(
            "computed {} calc columns over {} rows ({} synthetic)",
            self.columns.len(),
            row_count,
            self.synthetic.len()
        );
    }

    pub fn reset_cache(&self) {
        for slot in self.values.borrow_mut().iter_mut() {
            *slot = None;
        }
    }

    /// Clears cached values, generated rows and per-column precomputed state.
    pub fn clear_values(&mut self) {
        self.reset_cache();
        self.synthetic.clear();
        for calc in &self.columns {
            calc.clear();
        }
    }
}

/// Tables that own a `CalcSupport`.
pub(crate) trait CalcHost: Table + Sized {
    fn calc(&self) -> &CalcSupport;

    fn calc_mut(&mut self) -> &mut CalcSupport;

    /// Rows before any synthetic rows.
    fn data_rows(&self) -> usize;

    /// Columns before any computed columns.
    fn data_cols(&self) -> usize;

    /// Stored row ranges that are gap-filled independently.
    fn row_bands(&self) -> Vec<Range<usize>> {
        vec![0..self.data_rows()]
    }

    /// One computation pass: regenerate synthetic rows, then cache computed
    /// column values over stored and synthetic rows.
    fn compute_calc(&mut self) {
        self.calc_mut().set_synthetic(Vec::new());
        let synthetic = self
            .calc()
            .generate_rows(&*self, &self.row_bands(), self.data_cols());
        self.calc_mut().set_synthetic(synthetic);
        self.calc().compute_values(&*self);
    }
}

/// Share of a value in the total of its group.
///
/// Without `prepare`, the total is taken over all rows of the table. With a
/// dimension, each row is divided by the total of the rows sharing its
/// dimension value within the prepared row subset.
#[derive(Clone)]
pub struct PercentColumn {
    header: String,
    field: String,
    total_field: String,
    totals: RefCell<Option<Totals>>,
}

#[derive(Clone, Debug)]
struct Totals {
    dimension: Option<String>,
    by_group: HashMap<KeyValue, f64>,
    grand: f64,
}

impl PercentColumn {
    pub fn new(header: impl Into<String>, field: impl Into<String>, total_field: impl Into<String>) -> Self {
        PercentColumn {
            header: header.into(),
            field: field.into(),
            total_field: total_field.into(),
            totals: RefCell::new(None),
        }
    }

    fn compute_totals(&self, table: &dyn Table, dimension: Option<&str>, rows: Option<&[usize]>) -> Totals {
        let mut totals = Totals {
            dimension: dimension.map(str::to_string),
            by_group: HashMap::new(),
            grand: 0.0,
        };
        let Some(total_col) = table.index_of(&self.total_field) else {
            return totals;
        };
        let dim_col = dimension.and_then(|d| table.index_of(d));

        let mut add = |row: usize| {
            if let Some(n) = table.value(total_col, row).to_f64() {
                totals.grand += n;
                if let Some(dim_col) = dim_col {
                    let key = KeyValue::from(&table.value(dim_col, row));
                    *totals.by_group.entry(key).or_insert(0.0) += n;
                }
            }
        };
        match rows {
            Some(rows) => rows.iter().copied().for_each(&mut add),
            None => (0..table.row_count()).for_each(&mut add),
        }
        totals
    }
}

impl CalcColumn for PercentColumn {
    fn header(&self) -> &str {
        &self.header
    }

    fn field(&self) -> &str {
        &self.field
    }

    fn is_percent(&self) -> bool {
        true
    }

    fn total_field(&self) -> Option<&str> {
        Some(&self.total_field)
    }

    fn prepare(&self, table: &dyn Table, dimension: Option<&str>, rows: Option<&[usize]>) {
        let totals = self.compute_totals(table, dimension, rows);
        *self.totals.borrow_mut() = Some(totals);
    }

    fn calculate(&self, table: &dyn Table, row: usize) -> ColumnValue {
        let Some(value) = table.value_of(&self.field, row).to_f64() else {
            return ColumnValue::Null;
        };
        if self.totals.borrow().is_none() {
            let totals = self.compute_totals(table, None, None);
            *self.totals.borrow_mut() = Some(totals);
        }

        let totals = self.totals.borrow();
        let total = match totals.as_ref() {
            Some(Totals {
                dimension: Some(dimension),
                by_group,
                grand,
            }) => {
                let key = KeyValue::from(&table.value_of(dimension, row));
                by_group.get(&key).copied().unwrap_or(*grand)
            }
            Some(totals) => totals.grand,
            None => 0.0,
        };

        if total == 0.0 {
            ColumnValue::Null
        } else {
            ColumnValue::Float64(value / total)
        }
    }

    fn clear(&self) {
        *self.totals.borrow_mut() = None;
    }

    fn with_prefix(&self, prefix: &str) -> Box<dyn CalcColumn> {
        Box::new(PercentColumn::new(
            format!("{}{}", prefix, self.header),
            format!("{}{}", prefix, self.field),
            format!("{}{}", prefix, self.total_field),
        ))
    }

    fn with_total_field(&self, total: &str) -> Box<dyn CalcColumn> {
        Box::new(PercentColumn::new(self.header.clone(), self.field.clone(), total))
    }

    fn box_clone(&self) -> Box<dyn CalcColumn> {
        Box::new(self.clone())
    }
}

/// Value given to measures of gap-filled rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapFill {
    /// Measures read as zero, keeping a line continuous through the gap
    Zero,
    /// Measures read as null, breaking the line at the gap
    Null,
}

/// Fills gaps in a time (or numeric) axis.
///
/// Rows are grouped by their dimension columns other than the time column.
/// Within each group, every missing step between two consecutive observed
/// positions produces one synthetic row copying the dimensions of the
/// earlier row. Measures take the `GapFill` value where the presence
/// predicate reports them present, and null otherwise.
#[derive(Clone)]
pub struct TimeSeriesRow {
    time_field: String,
    step: f64,
    fill: GapFill,
    presence: Option<PresenceFn>,
}

impl TimeSeriesRow {
    /// `step` is in the axis domain of the time column: days for `Date`,
    /// milliseconds for `DateTime`, the value itself for numbers.
    pub fn new(time_field: impl Into<String>, step: f64, fill: GapFill) -> Self {
        TimeSeriesRow {
            time_field: time_field.into(),
            step,
            fill,
            presence: None,
        }
    }

    pub fn time_field(&self) -> &str {
        &self.time_field
    }

    fn axis_value(column_type: Option<ColumnType>, position: f64) -> ColumnValue {
        match column_type {
            Some(ColumnType::Date) => ColumnValue::Date(position.round() as i32),
            Some(ColumnType::DateTime) => ColumnValue::DateTime(position.round() as i64),
            Some(t) => ColumnValue::Float64(position)
                .coerce(t)
                .unwrap_or(ColumnValue::Float64(position)),
            None => ColumnValue::Float64(position),
        }
    }
}

impl CalcRow for TimeSeriesRow {
    fn generate(&self, table: &dyn Table, rows: Range<usize>, data_cols: usize) -> Vec<SyntheticRow> {
        let Some(time_col) = table.index_of(&self.time_field).filter(|c| *c < data_cols) else {
            return Vec::new();
        };
        if !(self.step.is_finite() && self.step > 0.0) {
            return Vec::new();
        }
        let time_type = table.column_type(time_col);
        let group_cols: Vec<usize> = (0..data_cols)
            .filter(|c| *c != time_col && !table.is_measure(*c))
            .collect();
        let measure_cols: Vec<(usize, String)> = (0..data_cols)
            .filter(|c| *c != time_col && table.is_measure(*c))
            .map(|c| (c, table.header(c).unwrap_or_default()))
            .collect();

        // Groups in order of first appearance.
        let mut group_of: HashMap<DimensionTuple, usize> = HashMap::new();
        let mut groups: Vec<Vec<(f64, usize)>> = Vec::new();
        for row in rows {
            let Some(position) = table.value(time_col, row).to_axis_position() else {
                continue;
            };
            let key = DimensionTuple::extract(table, &group_cols, row);
            let group = *group_of.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[group].push((position, row));
        }

        let mut generated = Vec::new();
        'groups: for mut points in groups {
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
            points.dedup_by(|a, b| a.0 == b.0);
            for pair in points.windows(2) {
                let (from, source_row) = pair[0];
                let to = pair[1].0;
                let mut position = from + self.step;
                while position < to - self.step * 1e-9 {
                    if generated.len() >= MAX_GAP_ROWS {
                        warn!(
                            "gap filling on '{}' stopped after {} rows",
                            self.time_field, MAX_GAP_ROWS
                        );
                        break 'groups;
                    }
                    let mut values: Vec<ColumnValue> = (0..data_cols)
                        .map(|c| {
                            if c == time_col {
                                Self::axis_value(time_type, position)
                            } else if table.is_measure(c) {
                                ColumnValue::Null
                            } else {
                                table.value(c, source_row)
                            }
                        })
                        .collect();
                    let mut synthetic = SyntheticRow {
                        source_row,
                        values: Vec::new(),
                    };
                    if self.fill == GapFill::Zero {
                        synthetic.values = values.clone();
                        for (col, header) in &measure_cols {
                            let present = self
                                .presence
                                .as_ref()
                                .map_or(true, |presence| presence(table, &synthetic, header));
                            if present {
                                values[*col] = table
                                    .column_type(*col)
                                    .map_or(ColumnValue::Float64(0.0), ColumnValue::zero);
                            }
                        }
                    }
                    synthetic.values = values;
                    generated.push(synthetic);
                    position += self.step;
                }
            }
        }
        generated
    }

    fn fills_time_gaps(&self) -> bool {
        true
    }

    fn set_presence(&mut self, presence: Option<PresenceFn>) {
        self.presence = presence;
    }

    fn box_clone(&self) -> Box<dyn CalcRow> {
        Box::new(self.clone())
    }
}
