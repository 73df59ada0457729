//! Writing results and logical files to local CSV.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::download::{DownloadOptions, get_logical_file};
use crate::error::HpccResult;
use crate::gateway::{EclGateway, RunOptions, ScriptSource};
use crate::results::{get_output, get_outputs};
use crate::types::{DataSet, Value};

/// Write `data` as CSV with a header record. Nulls are written as empty fields.
pub fn write_csv<W: Write>(data: &DataSet, writer: W) -> HpccResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(data.schema.field_names())?;
    for row in &data.rows {
        wtr.write_record(row.iter().map(|v| match v {
            Value::Null => String::new(),
            other => other.to_string(),
        }))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Render `data` as a CSV string.
pub fn to_csv_string(data: &DataSet) -> HpccResult<String> {
    let mut buf = Vec::new();
    write_csv(data, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn write_csv_file(data: &DataSet, path: &Path) -> HpccResult<()> {
    write_csv(data, File::create(path)?)?;
    info!(path = %path.display(), rows = data.row_count(), "saved csv");
    Ok(())
}

/// Save the first output of a script to `path`.
pub fn save_output<G: EclGateway + ?Sized>(
    gateway: &G,
    script: ScriptSource<'_>,
    options: &RunOptions,
    path: &Path,
) -> HpccResult<()> {
    let data = get_output(gateway, script, options)?;
    write_csv_file(&data, path)
}

/// Save every output of a script into `directory` and return the written paths.
///
/// Files are named `<output name>.csv` unless `filenames` gives a name for that position. A
/// `prefix` is prepended to every file name.
pub fn save_outputs<G: EclGateway + ?Sized>(
    gateway: &G,
    script: ScriptSource<'_>,
    options: &RunOptions,
    directory: &Path,
    filenames: &[String],
    prefix: Option<&str>,
) -> HpccResult<Vec<PathBuf>> {
    let outputs = get_outputs(gateway, script, options)?;
    if filenames.len() > outputs.len() {
        warn!(ignored = ?&filenames[outputs.len()..], "more file names than outputs");
    }

    let mut written = Vec::with_capacity(outputs.len());
    for (idx, output) in outputs.iter().enumerate() {
        let name = output_file_name(&output.name, filenames.get(idx).map(String::as_str), prefix);
        let path = directory.join(name);
        write_csv_file(&output.data, &path)?;
        written.push(path);
    }
    Ok(written)
}

fn output_file_name(output_name: &str, explicit: Option<&str>, prefix: Option<&str>) -> String {
    let name = match explicit {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => format!("{output_name}.csv"),
    };
    format!("{}{name}", prefix.unwrap_or_default())
}

/// Download `logical_file` and save it to `path`.
pub fn save_logical_file<G: EclGateway>(
    gateway: G,
    logical_file: &str,
    path: &Path,
    options: DownloadOptions,
) -> HpccResult<()> {
    let data = get_logical_file(gateway, logical_file, options)?;
    write_csv_file(&data, path)
}

#[cfg(test)]
mod tests {
    use super::{output_file_name, to_csv_string};
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    #[test]
    fn nulls_become_empty_fields() {
        let ds = DataSet::new(
            Schema::new(vec![
                Field::new("a", DataType::Utf8),
                Field::new("b", DataType::Float64),
            ]),
            vec![
                vec![Value::Utf8("x, y".into()), Value::Float64(2.0)],
                vec![Value::Null, Value::Null],
            ],
        );
        assert_eq!(to_csv_string(&ds).unwrap(), "a,b\n\"x, y\",2.0\n,\n");
    }

    #[test]
    fn explicit_names_win_and_prefix_applies() {
        assert_eq!(output_file_name("Result 1", None, None), "Result 1.csv");
        assert_eq!(output_file_name("Result 1", Some("a.csv"), Some("run_")), "run_a.csv");
        assert_eq!(output_file_name("people", Some(""), Some("x")), "xpeople.csv");
    }
}
