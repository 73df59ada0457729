//! Reading script results.
//!
//! `ecl run` prints each `OUTPUT` of a workunit as a `<Dataset name='...'>` element of `<Row>`s.
//! Every field comes back as text, so parsed results are `Utf8` columns; use
//! [`DataSet::infer_types`] to narrow them.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{HpccError, HpccResult};
use crate::gateway::{EclGateway, RunOptions, ScriptSource};
use crate::types::{DataSet, DataType, Field, Schema, Value};

const DATASET_PATTERN: &str = r"(?s)<Dataset name='(?P<name>[^']*)'\s*(?:/>|>(?P<body>.*?)</Dataset>)";
const ROW_PATTERN: &str = r"(?s)<Row>(?P<row>.*?)</Row>";
const FIELD_PATTERN: &str = r"(?s)<(?P<tag>[A-Za-z_][A-Za-z0-9_]*)\s*(?:/>|>(?P<value>.*?)</[A-Za-z_][A-Za-z0-9_]*>)";

/// One named output of a script.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedOutput {
    pub name: String,
    pub data: DataSet,
}

static PATTERNS: LazyLock<Result<Patterns, regex::Error>> = LazyLock::new(Patterns::compile);

struct Patterns {
    dataset: Regex,
    row: Regex,
    field: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            dataset: Regex::new(DATASET_PATTERN)?,
            row: Regex::new(ROW_PATTERN)?,
            field: Regex::new(FIELD_PATTERN)?,
        })
    }
}

/// Patterns compiled once per process.
fn patterns() -> HpccResult<&'static Patterns> {
    PATTERNS.as_ref().map_err(|e| HpccError::parse(e.to_string()))
}

/// Parse every `<Dataset>` in `stdout`, in output order.
pub fn parse_outputs(stdout: &str) -> HpccResult<Vec<NamedOutput>> {
    let patterns = patterns()?;
    let outputs: Vec<NamedOutput> = patterns
        .dataset
        .captures_iter(stdout)
        .map(|caps| NamedOutput {
            name: unescape(&caps["name"]),
            data: parse_rows(&patterns, caps.name("body").map_or("", |m| m.as_str())),
        })
        .collect();
    debug!(outputs = outputs.len(), "parsed script outputs");
    Ok(outputs)
}

/// Parse the first `<Dataset>` in `stdout`.
pub fn parse_first_output(stdout: &str) -> HpccResult<DataSet> {
    parse_outputs(stdout)?
        .into_iter()
        .next()
        .map(|o| o.data)
        .ok_or_else(|| HpccError::parse("script produced no output"))
}

fn parse_rows(patterns: &Patterns, body: &str) -> DataSet {
    let mut columns: Vec<String> = Vec::new();
    let mut records: Vec<Vec<(usize, Value)>> = Vec::new();

    for row in patterns.row.captures_iter(body) {
        let mut record = Vec::new();
        for field in patterns.field.captures_iter(&row["row"]) {
            let tag = &field["tag"];
            let idx = match columns.iter().position(|c| c == tag) {
                Some(idx) => idx,
                None => {
                    columns.push(tag.to_string());
                    columns.len() - 1
                }
            };
            let value = match field.name("value") {
                Some(v) if !v.as_str().is_empty() => Value::Utf8(unescape(v.as_str())),
                _ => Value::Null,
            };
            record.push((idx, value));
        }
        records.push(record);
    }

    let width = columns.len();
    let rows = records
        .into_iter()
        .map(|record| {
            let mut row = vec![Value::Null; width];
            for (idx, value) in record {
                row[idx] = value;
            }
            row
        })
        .collect();
    let schema = Schema::new(
        columns
            .into_iter()
            .map(|c| Field::new(c, DataType::Utf8))
            .collect(),
    );
    DataSet::new(schema, rows)
}

fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Run a script and return its first output.
pub fn get_output<G: EclGateway + ?Sized>(
    gateway: &G,
    script: ScriptSource<'_>,
    options: &RunOptions,
) -> HpccResult<DataSet> {
    let out = gateway.run(script, options)?.into_checked(&script.to_string())?;
    parse_first_output(&out.stdout)
}

/// Run a script and return all of its outputs, in output order.
pub fn get_outputs<G: EclGateway + ?Sized>(
    gateway: &G,
    script: ScriptSource<'_>,
    options: &RunOptions,
) -> HpccResult<Vec<NamedOutput>> {
    let out = gateway.run(script, options)?.into_checked(&script.to_string())?;
    parse_outputs(&out.stdout)
}

#[cfg(test)]
mod tests {
    use super::{parse_first_output, parse_outputs, patterns};
    use crate::types::Value;

    const TWO_OUTPUTS: &str = "\
Using eclcc path /opt/HPCCSystems/bin/eclcc
wuid: W20240101-000000
<Result>
<Dataset name='people'>
 <Row><id>1</id><name>Ada &amp; Co</name></Row>
 <Row><id>2</id><name/><extra>x</extra></Row>
</Dataset>
<Dataset name='Result 2'>
 <Row><Result_2>42</Result_2></Row>
</Dataset>
</Result>
";

    #[test]
    fn parses_every_dataset_in_order() {
        let outputs = parse_outputs(TWO_OUTPUTS).unwrap();
        let names: Vec<&str> = outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["people", "Result 2"]);

        let people = &outputs[0].data;
        assert_eq!(
            people.schema.field_names().collect::<Vec<_>>(),
            vec!["id", "name", "extra"]
        );
        assert_eq!(
            people.rows[0],
            vec![
                Value::Utf8("1".into()),
                Value::Utf8("Ada & Co".into()),
                Value::Null
            ]
        );
        assert_eq!(people.rows[1][1], Value::Null);
        assert_eq!(people.rows[1][2], Value::Utf8("x".into()));
        people.validate().unwrap();
    }

    #[test]
    fn empty_datasets_parse_to_no_rows() {
        let out = parse_first_output("<Result><Dataset name='x'>\n</Dataset></Result>").unwrap();
        assert_eq!(out.row_count(), 0);
        assert_eq!(out.column_count(), 0);
    }

    #[test]
    fn patterns_are_shared_across_parses() {
        assert!(std::ptr::eq(patterns().unwrap(), patterns().unwrap()));

        let once = parse_outputs(TWO_OUTPUTS).unwrap();
        let again = parse_outputs(TWO_OUTPUTS).unwrap();
        assert_eq!(once, again);
    }

    #[test]
    fn missing_output_is_an_error() {
        assert!(parse_first_output("wuid: W1\nstate: completed\n").is_err());
    }
}
