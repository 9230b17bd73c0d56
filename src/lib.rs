//! BrushView - Composable Table Views for Chart Data Preparation
//!
//! A family of read-only virtual tables layered over row/column data. The
//! central piece is `MergeView`, which combines a full ("all") dataset with
//! a brushed (filtered or zoomed) subset into one addressable table for a
//! rendering pipeline. `AppendView`, `DerivedSumView` and `AliasView` add
//! constant, summed and renamed columns on top of any table.
//!
//! Every table and view implements the `Table` contract; views additionally
//! implement `TableView` to map rows and columns back to the table they wrap.

pub mod alias;
pub mod append;
pub mod calc;
pub mod column;
pub mod config;
pub mod derived;
pub mod error;
pub mod format;
pub mod index;
pub mod merge;
pub mod table;
pub mod view;

pub use alias::AliasView;
pub use append::AppendView;
pub use calc::{CalcColumn, CalcRow, CalcSupport, GapFill, PercentColumn, PresenceFn, SyntheticRow, TimeSeriesRow};
pub use column::{Column, ColumnType, ColumnValue};
pub use config::{MergeOptions, ALL_PREFIX, DISCRETE_PREFIX};
pub use derived::{DerivedSumView, INTERVAL_PREFIX};
pub use error::ViewError;
pub use format::{CellFormat, FormatSource};
pub use index::{semi_join, DimensionTuple, KeyValue, SemiJoin, TupleIndex};
pub use merge::MergeView;
pub use table::{root_of, shared, Comparator, DataTable, Schema, SharedTable, Table, TableView};
pub use view::{MetadataTable, SubsetView, TableWrapper};
