//! DerivedSumView: computed columns holding the sum of two base columns.
//!
//! Used for interval charts, where a bar spans from one measure to that
//! measure plus another (an open value plus a gain).

use crate::column::{ColumnType, ColumnValue};
use crate::error::ViewError;
use crate::format::{CellFormat, FormatSource};
use crate::table::{delegate_calc, shared, Comparator, SharedTable, Table, TableView};
use std::cell::RefCell;
use std::rc::Rc;

/// Header prefix of derived interval columns.
pub const INTERVAL_PREFIX: &str = "__interval__";

#[derive(Debug, Clone)]
struct Interval {
    header: String,
    first: String,
    second: String,
}

/// Resolved operand indices, valid for one base column count.
#[derive(Debug, Clone, Default)]
struct OperandCache {
    base_cols: usize,
    operands: Vec<(Option<usize>, Option<usize>)>,
}

pub struct DerivedSumView {
    base: SharedTable,
    intervals: Vec<Interval>,
    cache: RefCell<Option<OperandCache>>,
}

impl DerivedSumView {
    pub fn new(base: SharedTable) -> Self {
        DerivedSumView {
            base,
            intervals: Vec::new(),
            cache: RefCell::new(None),
        }
    }

    /// Header of the interval column derived from `first`.
    pub fn interval_header(first: &str) -> String {
        format!("{}{}", INTERVAL_PREFIX, first)
    }

    /// Registers `first + second` and returns the derived column's header.
    /// Registering the same first column again replaces its second operand.
    pub fn add_interval(&mut self, first: &str, second: &str) -> String {
        let header = Self::interval_header(first);
        let interval = Interval {
            header: header.clone(),
            first: first.to_string(),
            second: second.to_string(),
        };
        match self.intervals.iter_mut().find(|i| i.header == header) {
            Some(existing) => *existing = interval,
            None => self.intervals.push(interval),
        }
        self.cache.replace(None);
        header
    }

    pub fn interval_count(&self) -> usize {
        self.intervals.len()
    }

    /// Operand indices of interval `index`, re-resolved whenever the base
    /// column count has changed since the last lookup.
    fn operands(&self, index: usize) -> (Option<usize>, Option<usize>) {
        let base = self.base.borrow();
        let base_cols = base.col_count();
        let mut cache = self.cache.borrow_mut();
        let stale = cache.as_ref().map_or(true, |c| c.base_cols != base_cols);
        if stale {
            let operands = self
                .intervals
                .iter()
                .map(|i| (base.index_of(&i.first), base.index_of(&i.second)))
                .collect();
            *cache = Some(OperandCache { base_cols, operands });
        }
        cache
            .as_ref()
            .and_then(|c| c.operands.get(index).copied())
            .unwrap_or((None, None))
    }

    fn interval_at(&self, col: usize) -> Option<usize> {
        let base_cols = self.base.borrow().col_count();
        col.checked_sub(base_cols).filter(|i| *i < self.intervals.len())
    }

    fn sum(&self, index: usize, row: usize) -> ColumnValue {
        let (first, second) = self.operands(index);
        let base = self.base.borrow();
        let Some(first) = first.and_then(|c| base.value(c, row).to_f64()) else {
            return ColumnValue::Null;
        };
        let second = second.and_then(|c| base.value(c, row).to_f64()).unwrap_or(0.0);
        ColumnValue::Float64(first + second)
    }
}

impl Table for DerivedSumView {
    fn row_count(&self) -> usize {
        self.base.borrow().row_count()
    }

    fn row_count_unprojected(&self) -> usize {
        self.base.borrow().row_count_unprojected()
    }

    fn col_count(&self) -> usize {
        self.base.borrow().col_count() + self.intervals.len()
    }

    fn header(&self, col: usize) -> Option<String> {
        match self.interval_at(col) {
            Some(i) => Some(self.intervals[i].header.clone()),
            None => self.base.borrow().header(col),
        }
    }

    fn column_type(&self, col: usize) -> Option<ColumnType> {
        match self.interval_at(col) {
            Some(_) => Some(ColumnType::Float64),
            None => self.base.borrow().column_type(col),
        }
    }

    fn is_measure(&self, col: usize) -> bool {
        self.interval_at(col).is_some() || self.base.borrow().is_measure(col)
    }

    fn index_of(&self, header: &str) -> Option<usize> {
        let base = self.base.borrow();
        match self.intervals.iter().position(|i| i.header == header) {
            Some(pos) => Some(base.col_count() + pos),
            None => base.index_of(header),
        }
    }

    fn value(&self, col: usize, row: usize) -> ColumnValue {
        match self.interval_at(col) {
            Some(i) if row < self.row_count() => self.sum(i, row),
            Some(_) => ColumnValue::Null,
            None => self.base.borrow().value(col, row),
        }
    }

    fn comparator(&self, col: usize) -> Option<Comparator> {
        self.base_col(col)
            .and_then(|c| self.base.borrow().comparator(c))
    }

    fn set_value(&mut self, col: usize, row: usize, value: ColumnValue) -> Result<(), ViewError> {
        match self.interval_at(col) {
            Some(i) => Err(ViewError::ReadOnly(format!(
                "derived column '{}'",
                self.intervals[i].header
            ))),
            None => self.base.borrow_mut().set_value(col, row, value),
        }
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
        shared(DerivedSumView {
            base,
            intervals: self.intervals.clone(),
            cache: RefCell::new(None),
        })
    }

    fn as_view(&self) -> Option<&dyn TableView> {
        Some(self)
    }

    fn formats(&self) -> Option<&dyn FormatSource> {
        Some(self)
    }
}

impl TableView for DerivedSumView {
    fn table(&self) -> SharedTable {
        Rc::clone(&self.base)
    }

    fn base_row(&self, row: usize) -> Option<usize> {
        (row < self.row_count()).then_some(row)
    }

    fn base_col(&self, col: usize) -> Option<usize> {
        (col < self.base.borrow().col_count()).then_some(col)
    }
}

impl FormatSource for DerivedSumView {
    fn format(&self, col: usize, row: usize) -> Option<CellFormat> {
        let base = self.base.borrow();
        let source = base.formats()?;
        match self.interval_at(col) {
            // Intervals display like their first operand.
            Some(i) => source.format(base.index_of(&self.intervals[i].first)?, row),
            None => source.format(col, row),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::PercentColumn;
    use crate::table::{DataTable, Schema};

    fn quotes() -> SharedTable {
        let schema = Schema::new(vec![
            ("Open".to_string(), ColumnType::Int32, true),
            ("Gain".to_string(), ColumnType::Int64, true),
        ]);
        let rows = vec![
            vec![ColumnValue::Int32(10), ColumnValue::Int64(5)],
            vec![ColumnValue::Int32(7), ColumnValue::Null],
            vec![ColumnValue::Null, ColumnValue::Int64(1)],
        ];
        shared(DataTable::from_rows("quotes".to_string(), schema, rows).unwrap())
    }

    #[test]
    fn test_interval_sum() {
        let mut view = DerivedSumView::new(quotes());
        let header = view.add_interval("Open", "Gain");

        assert_eq!(header, "__interval__Open");
        assert_eq!(view.index_of(&header), Some(2));
        assert_eq!(view.value_of(&header, 0), ColumnValue::Float64(15.0));
        assert_eq!(view.type_of(&header), Some(ColumnType::Float64));
        assert!(view.is_measure_header(&header));
        assert_eq!(view.base_col(2), None);
    }

    #[test]
    fn test_missing_operands() {
        let mut view = DerivedSumView::new(quotes());
        let header = view.add_interval("Open", "Gain");
        // Missing second operand counts as zero.
        assert_eq!(view.value_of(&header, 1), ColumnValue::Float64(7.0));
        // Missing first operand yields null.
        assert!(view.value_of(&header, 2).is_null());

        let absent = view.add_interval("Gain", "Volume");
        assert_eq!(view.value_of(&absent, 0), ColumnValue::Float64(5.0));
        let unresolved = view.add_interval("Close", "Gain");
        assert!(view.value_of(&unresolved, 0).is_null());
    }

    #[test]
    fn test_cache_follows_base_column_count() {
        let base = quotes();
        let mut view = DerivedSumView::new(Rc::clone(&base));
        let header = view.add_interval("Open", "Share");
        assert_eq!(view.value_of(&header, 0), ColumnValue::Float64(10.0));

        // A computed column appearing in the base shifts the resolution.
        view.add_calc_column(Box::new(PercentColumn::new("Share", "Open", "Open")));
        view.prepare_calc(None, None, true);
        assert_eq!(view.index_of(&header), Some(3));
        assert_eq!(view.value_of(&header, 0), ColumnValue::Float64(10.0 + 10.0 / 17.0));
    }
}
