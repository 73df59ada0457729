//! Delimited-file loading.
//!
//! Files are decoded as Latin-1 (every byte maps to one character), so arbitrary byte content
//! loads without decode failures. Column types are inferred from the cell text.

use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::error::{HpccError, HpccResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

/// Cell spellings loaded as [`Value::Null`].
pub const NA_VALUES: [&str; 10] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "#N/A", "<NA>"];

/// Options for [`load_delimited`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedOptions {
    /// Field separator byte.
    pub delimiter: u8,
    /// First record holds column names. Without headers, columns are named `0`, `1`, ...
    pub has_headers: bool,
    /// Infer `Int64`/`Float64`/`Bool` columns; otherwise every column is `Utf8`.
    pub infer_types: bool,
}

impl Default for DelimitedOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_headers: true,
            infer_types: true,
        }
    }
}

/// Load a delimited file into an in-memory [`DataSet`].
///
/// Rules:
///
/// - Bytes are decoded as Latin-1.
/// - Every record must have as many fields as the header.
/// - Cells listed in [`NA_VALUES`] become nulls.
pub fn load_delimited(path: impl AsRef<Path>, options: &DelimitedOptions) -> HpccResult<DataSet> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    std::fs::File::open(path)?.read_to_end(&mut bytes)?;
    debug!(path = %path.display(), bytes = bytes.len(), "loading delimited file");
    load_delimited_from_bytes(&bytes, options)
}

/// Load delimited data already in memory.
pub fn load_delimited_from_bytes(bytes: &[u8], options: &DelimitedOptions) -> HpccResult<DataSet> {
    let text = decode_latin1(bytes);
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(options.has_headers)
        .from_reader(text.as_bytes());

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        raw_rows.push(record.iter().map(str::to_owned).collect());
    }

    let names: Vec<String> = if options.has_headers {
        rdr.headers()?.iter().map(str::to_owned).collect()
    } else {
        let width = raw_rows.first().map_or(0, Vec::len);
        (0..width).map(|i| i.to_string()).collect()
    };

    if let Some((idx, row)) = raw_rows.iter().enumerate().find(|(_, r)| r.len() != names.len()) {
        return Err(HpccError::invalid_input(format!(
            "record {} has {} fields, expected {}",
            idx + 1,
            row.len(),
            names.len()
        )));
    }

    let fields: Vec<Field> = names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let data_type = if options.infer_types {
                DataType::infer(
                    raw_rows
                        .iter()
                        .map(|r| r[idx].as_str())
                        .filter(|cell| !is_na(cell)),
                )
            } else {
                DataType::Utf8
            };
            Field::new(name, data_type)
        })
        .collect();

    let rows = raw_rows
        .iter()
        .map(|raw| {
            raw.iter()
                .zip(&fields)
                .map(|(cell, field)| parse_cell(cell, field.data_type))
                .collect()
        })
        .collect();

    Ok(DataSet::new(Schema::new(fields), rows))
}

fn is_na(cell: &str) -> bool {
    NA_VALUES.contains(&cell.trim())
}

fn parse_cell(cell: &str, data_type: DataType) -> Value {
    if is_na(cell) {
        return Value::Null;
    }
    // Inference guarantees every non-NA cell parses; keep the text if it somehow does not.
    data_type
        .parse(cell)
        .unwrap_or_else(|| Value::Utf8(cell.to_owned()))
}

/// Decode ISO-8859-1 bytes. Each byte is the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::{DelimitedOptions, decode_latin1, load_delimited_from_bytes};
    use crate::types::{DataType, Value};

    #[test]
    fn latin1_bytes_never_fail_to_decode() {
        assert_eq!(decode_latin1(b"caf\xe9"), "café");
        assert_eq!(decode_latin1(&[0xff, 0x41]), "ÿA");
    }

    #[test]
    fn infers_column_types_and_nulls() {
        let input = b"id,score,ok,name\n1,2.5,true,Ada\n2,NA,false,\n3,4,True,Bob\n";
        let ds = load_delimited_from_bytes(input, &DelimitedOptions::default()).unwrap();
        let types: Vec<DataType> = ds.schema.fields.iter().map(|f| f.data_type).collect();
        assert_eq!(
            types,
            vec![DataType::Int64, DataType::Float64, DataType::Bool, DataType::Utf8]
        );
        assert_eq!(
            ds.rows[1],
            vec![Value::Int64(2), Value::Null, Value::Bool(false), Value::Null]
        );
        assert_eq!(ds.rows[2][1], Value::Float64(4.0));
    }

    #[test]
    fn headerless_files_get_positional_names() {
        let opts = DelimitedOptions {
            has_headers: false,
            delimiter: b'|',
            infer_types: false,
        };
        let ds = load_delimited_from_bytes(b"a|1\nb|2\n", &opts).unwrap();
        assert_eq!(ds.schema.field_names().collect::<Vec<_>>(), vec!["0", "1"]);
        assert_eq!(ds.rows[1][1], Value::Utf8("2".into()));
    }

    #[test]
    fn ragged_records_are_rejected() {
        let err = load_delimited_from_bytes(b"a,b\n1,2\n3\n", &DelimitedOptions::default()).unwrap_err();
        // The csv reader itself rejects unequal lengths unless configured as flexible.
        assert!(err.to_string().contains("csv error") || err.to_string().contains("record 2"));
    }
}
