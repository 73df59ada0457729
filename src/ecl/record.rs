//! Record-layout derivation: turn [`DataSet`] columns into an ECL `RECORD` body.

use std::collections::HashSet;
use std::fmt;

use crate::types::{DataSet, DataType};

/// How column types are mapped onto ECL field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypePolicy {
    /// Every column is declared `STRING`.
    ///
    /// This is the default: typed ECL fields cannot hold missing values, so string fields
    /// keep empty cells empty instead of silently turning them into zeros.
    #[default]
    StringOnly,
    /// Map the column's [`DataType`] onto the closest ECL type.
    Inferred,
}

impl TypePolicy {
    /// ECL type used for a column of type `data_type` under this policy.
    pub fn ecl_type(self, data_type: DataType) -> EclType {
        match (self, data_type) {
            (Self::StringOnly, _) | (Self::Inferred, DataType::Utf8) => EclType::String,
            (Self::Inferred, DataType::Int64) => EclType::Integer,
            (Self::Inferred, DataType::Float64) => EclType::Decimal,
            (Self::Inferred, DataType::Bool) => EclType::Boolean,
        }
    }
}

/// ECL field types emitted in record layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EclType {
    String,
    Integer,
    /// Wide enough to avoid truncating typical floating point input.
    Decimal,
    Boolean,
}

impl EclType {
    /// The ECL keyword for this type.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Integer => "INTEGER",
            Self::Decimal => "DECIMAL32_12",
            Self::Boolean => "BOOLEAN",
        }
    }
}

impl fmt::Display for EclType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One `TYPE name` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordField {
    pub ecl_type: EclType,
    /// Identifier that is legal in ECL and unique within its [`RecordSchema`].
    pub name: String,
}

/// Ordered ECL field declarations, positionally aligned with a dataset's columns.
///
/// Displays as the body of a record literal, e.g. `STRING id;STRING name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    fields: Vec<RecordField>,
}

impl RecordSchema {
    /// Derive a layout for `dataset`, one field per column in column order.
    ///
    /// Column names are reduced to ASCII letters and digits; names that end up empty become
    /// `unnamed0`, `unnamed1`, ... and names starting with a digit are prefixed with `num`.
    /// Repeated names get a numeric suffix (`name`, `name1`, `name2`, ...).
    pub fn derive(dataset: &DataSet, policy: TypePolicy) -> Self {
        let mut fields: Vec<RecordField> = Vec::with_capacity(dataset.column_count());
        let mut taken: HashSet<String> = HashSet::with_capacity(dataset.column_count());
        let mut unnamed = 0usize;

        for column in &dataset.schema.fields {
            let mut base: String = column
                .name
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect();
            if base.is_empty() {
                base = format!("unnamed{unnamed}");
                unnamed += 1;
            }
            if base.starts_with(|c: char| c.is_ascii_digit()) {
                base.insert_str(0, "num");
            }

            let mut name = base.clone();
            let mut suffix = 0usize;
            while taken.contains(&name) {
                suffix += 1;
                name = format!("{base}{suffix}");
            }
            taken.insert(name.clone());

            fields.push(RecordField {
                ecl_type: policy.ecl_type(column.data_type),
                name,
            });
        }

        Self { fields }
    }

    /// Field declarations in column order.
    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for RecordSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, field) in self.fields.iter().enumerate() {
            if idx > 0 {
                f.write_str(";")?;
            }
            write!(f, "{} {}", field.ecl_type, field.name)?;
        }
        Ok(())
    }
}
