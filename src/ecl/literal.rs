//! Cell normalization and ECL inline-dataset serialization.

use std::ops::Range;

use super::record::{EclType, RecordSchema};
use crate::types::{DataSet, Value};

/// Spellings treated as missing in string columns (compared case-insensitively).
const NULL_MARKERS: [&str; 3] = ["nan", "na", "null"];

/// A dataset with every cell already rendered as an ECL literal.
///
/// Built once per upload, before any chunk is serialized; afterwards it is only read, so chunk
/// workers can serialize disjoint row ranges concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralTable {
    rows: Vec<Vec<String>>,
}

impl LiteralTable {
    /// Render every cell of `dataset` according to the field types in `schema`.
    ///
    /// `schema` must have been derived from `dataset`.
    pub fn prepare(dataset: &DataSet, schema: &RecordSchema) -> Self {
        let types: Vec<EclType> = schema.fields().iter().map(|f| f.ecl_type).collect();
        let rows = dataset
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&types)
                    .map(|(value, ty)| literal(value, *ty))
                    .collect()
            })
            .collect();
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Serialize rows `range` as `{v1,v2},{v1,v2},...`.
    ///
    /// The range is not re-validated beyond clamping to the table.
    pub fn serialize_rows(&self, range: Range<usize>) -> String {
        let end = range.end.min(self.rows.len());
        let start = range.start.min(end);
        let rows = &self.rows[start..end];

        let width: usize = rows
            .iter()
            .map(|r| r.iter().map(|c| c.len() + 1).sum::<usize>() + 3)
            .sum();
        let mut out = String::with_capacity(width);
        for (idx, row) in rows.iter().enumerate() {
            if idx > 0 {
                out.push(',');
            }
            out.push('{');
            out.push_str(&row.join(","));
            out.push('}');
        }
        out
    }

    /// Serialize every row.
    pub fn serialize_all(&self) -> String {
        self.serialize_rows(0..self.rows.len())
    }
}

/// Render one cell as an ECL literal of type `ty`.
pub fn literal(value: &Value, ty: EclType) -> String {
    match ty {
        EclType::String => quote(&string_cell(value)),
        EclType::Boolean => match value {
            Value::Bool(true) => "TRUE".to_string(),
            v if v.is_missing() => "FALSE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            other => other.to_string(),
        },
        EclType::Integer | EclType::Decimal => {
            if value.is_missing() {
                "0".to_string()
            } else {
                value.to_string()
            }
        }
    }
}

fn string_cell(value: &Value) -> String {
    let text = value.to_string();
    if NULL_MARKERS
        .iter()
        .any(|marker| text.eq_ignore_ascii_case(marker))
    {
        String::new()
    } else {
        text
    }
}

/// Wrap `s` in single quotes, escaping embedded single quotes as `\'`.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Reverse [`quote`]: strip the surrounding quotes and unescape `\'`.
///
/// Returns `None` if `literal` is not a quoted string.
pub fn unquote(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("\\'", "'"))
}
