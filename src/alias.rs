//! AliasView: redirects column names to other columns of the base table.
//!
//! Each alias is exposed as an extra column appended after the base columns,
//! so it has its own header and position. A name lookup of an alias
//! redirects to its target's column in the base; an alias whose target is
//! missing falls back to normal resolution of the alias name. The appended
//! columns resolve positionally through the alias list.

use crate::column::{ColumnType, ColumnValue};
use crate::error::ViewError;
use crate::format::{CellFormat, FormatSource};
use crate::table::{delegate_calc, shared, Comparator, SharedTable, Table, TableView};
use std::rc::Rc;

pub struct AliasView {
    base: SharedTable,
    aliases: Vec<(String, String)>, // (alias, target)
}

impl AliasView {
    pub fn new(base: SharedTable) -> Self {
        AliasView {
            base,
            aliases: Vec::new(),
        }
    }

    /// Maps `alias` to `target`, replacing an earlier mapping of `alias`.
    pub fn add_alias(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        let alias = alias.into();
        let target = target.into();
        match self.aliases.iter_mut().find(|(a, _)| *a == alias) {
            Some(entry) => entry.1 = target,
            None => self.aliases.push((alias, target)),
        }
    }

    pub fn remove_alias(&mut self, alias: &str) -> bool {
        let before = self.aliases.len();
        self.aliases.retain(|(a, _)| a != alias);
        self.aliases.len() != before
    }

    pub fn target_of(&self, alias: &str) -> Option<&str> {
        self.aliases
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, target)| target.as_str())
    }

    pub fn aliases(&self) -> &[(String, String)] {
        &self.aliases
    }

    fn base_cols(&self) -> usize {
        self.base.borrow().col_count()
    }

    /// Base column of `col`: itself below the base column count, the
    /// alias target's index above it.
    fn resolve(&self, col: usize) -> Option<usize> {
        let base = self.base.borrow();
        let base_cols = base.col_count();
        if col < base_cols {
            return Some(col);
        }
        let (_, target) = self.aliases.get(col - base_cols)?;
        base.index_of(target)
    }
}

impl Table for AliasView {
    fn row_count(&self) -> usize {
        self.base.borrow().row_count()
    }

    fn row_count_unprojected(&self) -> usize {
        self.base.borrow().row_count_unprojected()
    }

    fn col_count(&self) -> usize {
        self.base_cols() + self.aliases.len()
    }

    fn header(&self, col: usize) -> Option<String> {
        let base_cols = self.base_cols();
        if col < base_cols {
            return self.base.borrow().header(col);
        }
        self.aliases.get(col - base_cols).map(|(alias, _)| alias.clone())
    }

    fn column_type(&self, col: usize) -> Option<ColumnType> {
        let base_col = self.resolve(col)?;
        self.base.borrow().column_type(base_col)
    }

    fn is_measure(&self, col: usize) -> bool {
        self.resolve(col)
            .is_some_and(|base_col| self.base.borrow().is_measure(base_col))
    }

    fn index_of(&self, header: &str) -> Option<usize> {
        let base = self.base.borrow();
        self.target_of(header)
            .and_then(|target| base.index_of(target))
            .or_else(|| base.index_of(header))
    }

    fn value(&self, col: usize, row: usize) -> ColumnValue {
        match self.resolve(col) {
            Some(base_col) => self.base.borrow().value(base_col, row),
            None => ColumnValue::Null,
        }
    }

    fn comparator(&self, col: usize) -> Option<Comparator> {
        let base_col = self.resolve(col)?;
        self.base.borrow().comparator(base_col)
    }

    fn set_value(&mut self, col: usize, row: usize, value: ColumnValue) -> Result<(), ViewError> {
        let base_col = self
            .resolve(col)
            .ok_or_else(|| ViewError::ColumnNotFound(self.header(col).unwrap_or_default()))?;
        self.base.borrow_mut().set_value(base_col, row, value)
    }

    fn prepare_calc(&mut self, dimension: Option<&str>, rows: Option<&[usize]>, compute_measures: bool) {
        let dimension = dimension.map(|d| self.target_of(d).unwrap_or(d).to_string());
        self.base
            .borrow_mut()
            .prepare_calc(dimension.as_deref(), rows, compute_measures);
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
        shared(AliasView {
            base,
            aliases: self.aliases.clone(),
        })
    }

    fn as_view(&self) -> Option<&dyn TableView> {
        Some(self)
    }

    fn formats(&self) -> Option<&dyn FormatSource> {
        Some(self)
    }
}

impl TableView for AliasView {
    fn table(&self) -> SharedTable {
        Rc::clone(&self.base)
    }

    fn base_row(&self, row: usize) -> Option<usize> {
        (row < self.row_count()).then_some(row)
    }

    fn base_col(&self, col: usize) -> Option<usize> {
        self.resolve(col)
    }
}

impl FormatSource for AliasView {
    fn format(&self, col: usize, row: usize) -> Option<CellFormat> {
        let base_col = self.resolve(col)?;
        let base = self.base.borrow();
        let source = base.formats()?;
        source.format(base_col, row)
    }
}
