//! Tuple indexes over grouping columns and the semi-join between two tables.
//!
//! A `TupleIndex` maps the normalized tuple of a row's grouping-column
//! values to the set of rows carrying it. Two indexes built over the same
//! columns of two tables can be intersected to find the rows of one table
//! whose key also occurs in the other.

use crate::column::ColumnValue;
use crate::table::{shared, SharedTable, Table};
use crate::view::SubsetView;
use log::debug;
use ordered_float::OrderedFloat;
use roaring::RoaringBitmap;
use std::collections::HashMap;
use std::rc::Rc;

/// Normalized value of one key column.
///
/// Every numeric subtype maps to `Number`, so `Int64(3)` and `Float64(3.0)`
/// compare equal. Null and empty strings pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Null,
    Number(OrderedFloat<f64>),
    Text(String),
    Bool(bool),
    Date(i32),
    DateTime(i64),
}

impl From<&ColumnValue> for KeyValue {
    fn from(value: &ColumnValue) -> Self {
        match value {
            ColumnValue::Null => KeyValue::Null,
            ColumnValue::String(s) => KeyValue::Text(s.clone()),
            ColumnValue::Bool(b) => KeyValue::Bool(*b),
            ColumnValue::Date(d) => KeyValue::Date(*d),
            ColumnValue::DateTime(ms) => KeyValue::DateTime(*ms),
            numeric => numeric
                .to_f64()
                .map_or(KeyValue::Null, |n| KeyValue::Number(OrderedFloat(n))),
        }
    }
}

/// Ordered key-column values of one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DimensionTuple(pub Vec<KeyValue>);

impl DimensionTuple {
    pub fn extract(table: &dyn Table, cols: &[usize], row: usize) -> Self {
        DimensionTuple(cols.iter().map(|c| KeyValue::from(&table.value(*c, row))).collect())
    }

    /// Tuple of a row given as positional values, `None` if a key column
    /// lies outside the row.
    pub fn from_values(values: &[ColumnValue], cols: &[usize]) -> Option<Self> {
        cols.iter()
            .map(|c| values.get(*c).map(KeyValue::from))
            .collect::<Option<Vec<_>>>()
            .map(DimensionTuple)
    }
}

/// Hash index from dimension tuple to the rows carrying it.
#[derive(Debug, Clone, Default)]
pub struct TupleIndex {
    columns: Vec<String>,
    rows: HashMap<DimensionTuple, RoaringBitmap>,
}

impl TupleIndex {
    /// Indexes every row of `table` over `columns`.
    ///
    /// A column the table cannot resolve makes every tuple incomparable; the
    /// index is then empty and matches nothing.
    pub fn build(table: &dyn Table, columns: &[String]) -> Self {
        let mut index = TupleIndex {
            columns: columns.to_vec(),
            rows: HashMap::new(),
        };
        let resolved: Option<Vec<usize>> = columns.iter().map(|c| table.index_of(c)).collect();
        let Some(cols) = resolved else {
            debug!("tuple index over {:?}: unresolved key column, index left empty", columns);
            return index;
        };

        for row in 0..table.row_count() {
            let key = DimensionTuple::extract(table, &cols, row);
            index.rows.entry(key).or_default().insert(row as u32);
        }
        index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains(&self, key: &DimensionTuple) -> bool {
        self.rows.contains_key(key)
    }

    pub fn rows(&self, key: &DimensionTuple) -> Option<&RoaringBitmap> {
        self.rows.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &DimensionTuple> + '_ {
        self.rows.keys()
    }

    /// Number of distinct tuples.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows of this index whose tuple also occurs in `other`.
    pub fn matching_rows(&self, other: &TupleIndex) -> RoaringBitmap {
        let mut matched = RoaringBitmap::new();
        for (key, rows) in &self.rows {
            if other.contains(key) {
                matched |= rows;
            }
        }
        matched
    }
}

/// Result of a semi-join.
pub struct SemiJoin {
    /// Kept rows in their original order
    pub table: SharedTable,
    /// Original row -> kept row, `None` for dropped rows
    pub remap: Vec<Option<usize>>,
    pub dropped: usize,
}

/// Keeps the rows of `table` (indexed by `left`) whose tuple occurs in `right`.
///
/// When nothing is dropped the input table is returned as is. A table with
/// the wrapper capability is filtered on its inner table and re-wrapped.
pub fn semi_join(table: &SharedTable, left: &TupleIndex, right: &TupleIndex) -> SemiJoin {
    let row_count = table.borrow().row_count();
    let kept: Vec<usize> = left.matching_rows(right).iter().map(|r| r as usize).collect();

    let mut remap = vec![None; row_count];
    for (compact, original) in kept.iter().enumerate() {
        if let Some(slot) = remap.get_mut(*original) {
            *slot = Some(compact);
        }
    }
    let dropped = row_count - kept.len().min(row_count);
    if dropped == 0 {
        return SemiJoin {
            table: Rc::clone(table),
            remap,
            dropped,
        };
    }

    let source = table.borrow();
    let filtered = match source.as_wrapper() {
        Some(wrapper) => wrapper.rewrap(shared(SubsetView::new(wrapper.inner(), kept))),
        None => shared(SubsetView::new(Rc::clone(table), kept)),
    };
    drop(source);
    SemiJoin {
        table: filtered,
        remap,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnType;
    use crate::table::{DataTable, Schema};
    use crate::view::MetadataTable;
    use std::collections::BTreeMap;

    fn regions(rows: &[(&str, i64)], qty_type: ColumnType) -> DataTable {
        let schema = Schema::new(vec![
            ("Region".to_string(), ColumnType::String, false),
            ("Year".to_string(), qty_type, false),
        ]);
        let rows = rows
            .iter()
            .map(|(region, year)| {
                vec![
                    ColumnValue::String(region.to_string()),
                    ColumnValue::Int64(*year).coerce(qty_type).unwrap(),
                ]
            })
            .collect();
        DataTable::from_rows("regions".to_string(), schema, rows).unwrap()
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_numeric_keys_normalize_across_subtypes() {
        assert_eq!(
            KeyValue::from(&ColumnValue::Int64(3)),
            KeyValue::from(&ColumnValue::Float64(3.0))
        );
        assert_eq!(KeyValue::from(&ColumnValue::Null), KeyValue::Null);
        assert_eq!(
            KeyValue::from(&ColumnValue::String(String::new())),
            KeyValue::Text(String::new())
        );
    }

    #[test]
    fn test_build_groups_rows() {
        let table = regions(&[("East", 2020), ("West", 2020), ("East", 2020)], ColumnType::Int64);
        let index = TupleIndex::build(&table, &keys(&["Region", "Year"]));
        assert_eq!(index.len(), 2);

        let east = DimensionTuple(vec![
            KeyValue::Text("East".to_string()),
            KeyValue::Number(OrderedFloat(2020.0)),
        ]);
        let rows: Vec<u32> = index.rows(&east).unwrap().iter().collect();
        assert_eq!(rows, vec![0, 2]);
    }

    #[test]
    fn test_unresolved_column_matches_nothing() {
        let table = regions(&[("East", 2020)], ColumnType::Int64);
        let index = TupleIndex::build(&table, &keys(&["Country"]));
        assert!(index.is_empty());
        assert!(index.matching_rows(&index).is_empty());
    }

    #[test]
    fn test_semi_join_drops_missing_keys() {
        let all = regions(&[("East", 2020), ("West", 2020)], ColumnType::Float64);
        let brushed = shared(regions(
            &[("East", 2020), ("North", 2020), ("West", 2020)],
            ColumnType::Int64,
        ));
        let cols = keys(&["Region", "Year"]);
        let all_index = TupleIndex::build(&all, &cols);
        let brushed_index = TupleIndex::build(&*brushed.borrow(), &cols);

        let join = semi_join(&brushed, &brushed_index, &all_index);
        assert_eq!(join.dropped, 1);
        assert_eq!(join.remap, vec![Some(0), None, Some(1)]);

        let filtered = join.table.borrow();
        assert_eq!(filtered.row_count(), 2);
        assert_eq!(filtered.value_of("Region", 0).as_string(), Some("East"));
        assert_eq!(filtered.value_of("Region", 1).as_string(), Some("West"));
    }

    #[test]
    fn test_semi_join_keeps_table_when_nothing_dropped() {
        let table = shared(regions(&[("East", 2020)], ColumnType::Int64));
        let cols = keys(&["Region"]);
        let index = TupleIndex::build(&*table.borrow(), &cols);
        let join = semi_join(&table, &index, &index);
        assert_eq!(join.dropped, 0);
        assert!(Rc::ptr_eq(&join.table, &table));
    }

    #[test]
    fn test_semi_join_rewraps_decorated_table() {
        let mut metadata = BTreeMap::new();
        metadata.insert("top".to_string(), "2".to_string());
        let inner = shared(regions(&[("East", 2020), ("North", 2020)], ColumnType::Int64));
        let brushed = shared(MetadataTable::new(inner, metadata));
        let all = regions(&[("East", 2020)], ColumnType::Int64);

        let cols = keys(&["Region"]);
        let brushed_index = TupleIndex::build(&*brushed.borrow(), &cols);
        let all_index = TupleIndex::build(&all, &cols);
        let join = semi_join(&brushed, &brushed_index, &all_index);

        let filtered = join.table.borrow();
        assert_eq!(filtered.row_count(), 1);
        let wrapper = filtered.as_wrapper().unwrap();
        assert_eq!(wrapper.metadata("top"), Some("2"));
        assert_eq!(wrapper.inner().borrow().row_count(), 1);
    }
}
