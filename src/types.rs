//! Core in-memory table types.
//!
//! A [`DataSet`] is what gets sprayed to the cluster and what downloads and script outputs are
//! parsed back into. Columns are described by a [`Schema`] (a list of typed [`Field`]s).

use std::fmt;

use crate::error::{HpccError, HpccResult};

/// Logical data type for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
}

impl DataType {
    /// Infer the narrowest type able to hold every non-empty raw cell.
    ///
    /// Preference order is `Int64`, `Float64`, `Bool`, then `Utf8`. A column with no non-empty
    /// cells is `Utf8`.
    pub fn infer<'a, I>(raw_cells: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let (mut int, mut float, mut boolean, mut seen) = (true, true, true, false);
        for raw in raw_cells {
            let cell = raw.trim();
            if cell.is_empty() {
                continue;
            }
            seen = true;
            int = int && cell.parse::<i64>().is_ok();
            float = float && cell.parse::<f64>().is_ok();
            boolean = boolean && parse_bool(cell).is_some();
            if !(int || float || boolean) {
                return Self::Utf8;
            }
        }
        match (seen, int, float, boolean) {
            (false, ..) => Self::Utf8,
            (true, true, _, _) => Self::Int64,
            (true, _, true, _) => Self::Float64,
            (true, _, _, true) => Self::Bool,
            _ => Self::Utf8,
        }
    }

    /// Parse a raw cell into a [`Value`] of this type. Empty cells become [`Value::Null`].
    ///
    /// Returns `None` if the cell does not parse as this type.
    pub fn parse(self, raw: &str) -> Option<Value> {
        let cell = raw.trim();
        if cell.is_empty() && (self != Self::Utf8 || raw.is_empty()) {
            return Some(Value::Null);
        }
        match self {
            Self::Utf8 => Some(Value::Utf8(raw.to_owned())),
            Self::Int64 => cell.parse().ok().map(Value::Int64),
            Self::Float64 => cell.parse().ok().map(Value::Float64),
            Self::Bool => parse_bool(cell).map(Value::Bool),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// A single named, typed column in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Column name, exactly as the source spelled it.
    pub name: String,
    /// Column data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered column descriptions of a [`DataSet`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` if the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single typed cell in a [`DataSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// `true` for [`Value::Null`] and for NaN floats.
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Float64(v) => v.is_nan(),
            _ => false,
        }
    }
}

/// Textual form used when a cell is written as a string literal or to CSV.
///
/// Missing values render as `nan`, floats always carry a fractional part (`3.0`) and booleans
/// render as `True`/`False`, matching how delimited sources usually spell them.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("nan"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) if v.is_nan() => f.write_str("nan"),
            Self::Float64(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{v:.1}")
            }
            Self::Float64(v) => write!(f, "{v}"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Utf8(s) => f.write_str(s),
        }
    }
}

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns in the dataset.
    pub fn column_count(&self) -> usize {
        self.schema.len()
    }

    /// Check that every row has exactly one value per schema field.
    pub fn validate(&self) -> HpccResult<()> {
        let expected = self.schema.len();
        match self.rows.iter().position(|row| row.len() != expected) {
            None => Ok(()),
            Some(idx) => Err(HpccError::invalid_input(format!(
                "row {idx} has {} values but the schema has {expected} fields",
                self.rows[idx].len()
            ))),
        }
    }

    /// Append `other`'s rows. Both datasets must have the same column names.
    pub fn append(&mut self, other: DataSet) -> HpccResult<()> {
        if self.schema.is_empty() && self.rows.is_empty() {
            *self = other;
            return Ok(());
        }
        if !self.schema.field_names().eq(other.schema.field_names()) {
            return Err(HpccError::invalid_input(format!(
                "cannot append dataset with columns {:?} to dataset with columns {:?}",
                other.schema.field_names().collect::<Vec<_>>(),
                self.schema.field_names().collect::<Vec<_>>()
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Re-type every `Utf8` column whose cells all parse as a narrower [`DataType`].
    ///
    /// Columns that are already typed are left as they are. Cells missing from short rows count
    /// as empty and are left missing.
    pub fn infer_types(self) -> Self {
        let Self { mut schema, mut rows } = self;
        for (idx, field) in schema.fields.iter_mut().enumerate() {
            if field.data_type != DataType::Utf8 {
                continue;
            }
            let inferred = DataType::infer(rows.iter().map(|row| match row.get(idx) {
                Some(Value::Utf8(s)) => s.as_str(),
                _ => "",
            }));
            if inferred == DataType::Utf8 {
                continue;
            }
            for cell in rows.iter_mut().filter_map(|row| row.get_mut(idx)) {
                if let Value::Utf8(s) = cell {
                    *cell = inferred.parse(s).unwrap_or(Value::Null);
                }
            }
            field.data_type = inferred;
        }
        Self { schema, rows }
    }
}
