//! BrushView Column Implementation
//!
//! A Column is an array-like random-access data container indexed by row.
//! Each Column has a type specifying the type of every non-null value stored,
//! and a flag marking it as a measure (numeric, aggregated) or a dimension
//! (categorical, grouping).
//!
//! # Numeric subtypes
//!
//! Two tables computed independently may disagree on the concrete numeric
//! subtype of the same column (`Int64` in one, `Float64` in the other).
//! `ColumnType::promote` picks the wider of two subtypes using the ranking
//! Int8 < Int16 < Int32 < Int64 < Float32 < Float64, and
//! `ColumnValue::coerce` converts a value into a target subtype.

use crate::error::ViewError;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Bool,
    /// Days since 1970-01-01
    Date,
    /// Milliseconds since the Unix epoch
    DateTime,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        self.numeric_rank().is_some()
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnType::Date | ColumnType::DateTime)
    }

    /// Position in the promotion order, `None` for non-numeric types.
    pub fn numeric_rank(&self) -> Option<u8> {
        match self {
            ColumnType::Int8 => Some(0),
            ColumnType::Int16 => Some(1),
            ColumnType::Int32 => Some(2),
            ColumnType::Int64 => Some(3),
            ColumnType::Float32 => Some(4),
            ColumnType::Float64 => Some(5),
            _ => None,
        }
    }

    /// Returns the wider of two numeric types, or `None` if either is not numeric.
    ///
    /// ```
    /// use brushview::ColumnType;
    ///
    /// assert_eq!(ColumnType::Int64.promote(ColumnType::Float64), Some(ColumnType::Float64));
    /// assert_eq!(ColumnType::Int16.promote(ColumnType::Int8), Some(ColumnType::Int16));
    /// assert_eq!(ColumnType::String.promote(ColumnType::Int8), None);
    /// ```
    pub fn promote(self, other: ColumnType) -> Option<ColumnType> {
        let a = self.numeric_rank()?;
        let b = other.numeric_rank()?;
        Some(if a >= b { self } else { other })
    }
}

/// Column value enum to support multiple types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValue {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bool(bool),
    Date(i32),
    DateTime(i64),
    Null,
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ColumnValue::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ColumnValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            ColumnValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ColumnValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value in the common `f64` domain, whatever the concrete subtype.
    /// Returns None for null and non-numeric values.
    #[inline]
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Int8(n) => Some(*n as f64),
            ColumnValue::Int16(n) => Some(*n as f64),
            ColumnValue::Int32(n) => Some(*n as f64),
            ColumnValue::Int64(n) => Some(*n as f64),
            ColumnValue::Float32(f) => Some(*f as f64),
            ColumnValue::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Position on an ordered axis: numbers as themselves, dates as day
    /// counts and date-times as milliseconds.
    pub fn to_axis_position(&self) -> Option<f64> {
        match self {
            ColumnValue::Date(d) => Some(*d as f64),
            ColumnValue::DateTime(ms) => Some(*ms as f64),
            other => other.to_f64(),
        }
    }

    /// The type of this value, None for null.
    pub fn value_type(&self) -> Option<ColumnType> {
        match self {
            ColumnValue::Int8(_) => Some(ColumnType::Int8),
            ColumnValue::Int16(_) => Some(ColumnType::Int16),
            ColumnValue::Int32(_) => Some(ColumnType::Int32),
            ColumnValue::Int64(_) => Some(ColumnType::Int64),
            ColumnValue::Float32(_) => Some(ColumnType::Float32),
            ColumnValue::Float64(_) => Some(ColumnType::Float64),
            ColumnValue::String(_) => Some(ColumnType::String),
            ColumnValue::Bool(_) => Some(ColumnType::Bool),
            ColumnValue::Date(_) => Some(ColumnType::Date),
            ColumnValue::DateTime(_) => Some(ColumnType::DateTime),
            ColumnValue::Null => None,
        }
    }

    /// Converts a numeric value into the `target` numeric subtype.
    ///
    /// Null converts to null. Returns None when either side is not numeric
    /// or the value does not fit the target (integer overflow, fractional
    /// value into an integer type).
    pub fn coerce(&self, target: ColumnType) -> Option<ColumnValue> {
        if self.is_null() {
            return Some(ColumnValue::Null);
        }
        if self.value_type() == Some(target) {
            return Some(self.clone());
        }
        let n = self.to_f64()?;
        match target {
            ColumnType::Float64 => Some(ColumnValue::Float64(n)),
            ColumnType::Float32 => Some(ColumnValue::Float32(n as f32)),
            ColumnType::Int64 => integral(n).map(|v| ColumnValue::Int64(v as i64)),
            ColumnType::Int32 => integral(n)
                .and_then(|v| i32::try_from(v as i64).ok())
                .map(ColumnValue::Int32),
            ColumnType::Int16 => integral(n)
                .and_then(|v| i16::try_from(v as i64).ok())
                .map(ColumnValue::Int16),
            ColumnType::Int8 => integral(n)
                .and_then(|v| i8::try_from(v as i64).ok())
                .map(ColumnValue::Int8),
            _ => None,
        }
    }

    /// Zero of a numeric type, used for gap filling.
    pub fn zero(column_type: ColumnType) -> ColumnValue {
        ColumnValue::Float64(0.0)
            .coerce(column_type)
            .unwrap_or(ColumnValue::Null)
    }
}

fn integral(n: f64) -> Option<f64> {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Some(n)
    } else {
        None
    }
}

/// Storage for one column of a `DataTable`.
/// Handles type checking; every column accepts null.
#[derive(Clone)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    measure: bool,
    values: Vec<ColumnValue>,
}

impl Column {
    pub fn new(name: String, column_type: ColumnType, measure: bool) -> Self {
        Column {
            name,
            column_type,
            measure,
            values: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn is_measure(&self) -> bool {
        self.measure
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Validate a value against the column type
    fn validate_value(&self, value: ColumnValue) -> Result<ColumnValue, ViewError> {
        match value.value_type() {
            None => Ok(ColumnValue::Null),
            Some(t) if t == self.column_type => Ok(value),
            Some(_) => Err(ViewError::TypeMismatch {
                column: self.name.clone(),
                expected: self.column_type,
                value,
            }),
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&ColumnValue> {
        self.values.get(index)
    }

    pub fn set(&mut self, index: usize, value: ColumnValue) -> Result<(), ViewError> {
        let value = self.validate_value(value)?;
        let len = self.values.len();
        let slot = self
            .values
            .get_mut(index)
            .ok_or(ViewError::RowOutOfRange { row: index, len })?;
        *slot = value;
        Ok(())
    }

    pub fn append(&mut self, value: ColumnValue) -> Result<(), ViewError> {
        let value = self.validate_value(value)?;
        self.values.push(value);
        Ok(())
    }

    /// Checks a value without storing it.
    pub(crate) fn check(&self, value: &ColumnValue) -> Result<(), ViewError> {
        self.validate_value(value.clone()).map(|_| ())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnValue> + '_ {
        self.values.iter()
    }
}

impl Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Column {{ name: '{}', type: {:?}, measure: {}, len: {} }}",
            self.name,
            self.column_type,
            self.measure,
            self.len()
        )
    }
}
