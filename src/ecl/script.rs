//! ECL script text for writing, concatenating, reading and deleting logical files.
//!
//! Everything here is pure string formatting; scripts are executed by an
//! [`crate::gateway::EclGateway`].

use super::record::RecordSchema;

/// Prefix of every temporary logical file created by a chunked spray.
pub const TEMP_PREFIX: &str = "TEMPHPYCC::";

/// Days a temporary chunk file is kept before the cluster may reclaim it.
pub const TEMP_EXPIRE_DAYS: u32 = 1;

/// Deterministic name of the temporary file holding rows `start..end` of an upload to `target`.
pub fn temp_file_name(target: &str, start: usize, end: usize) -> String {
    format!("{TEMP_PREFIX}{target}from{start}to{end}")
}

fn overwrite_flag(overwrite: bool) -> &'static str {
    if overwrite { ", OVERWRITE" } else { "" }
}

/// Script writing the inline rows `data` (see [`super::LiteralTable`]) to `target`.
///
/// `expire_days` adds an `EXPIRE` hint so the cluster can reclaim the file.
pub fn submit_script(
    data: &str,
    schema: &RecordSchema,
    target: &str,
    overwrite: bool,
    expire_days: Option<u32>,
) -> String {
    let expire = match expire_days {
        Some(days) => format!(" , EXPIRE({days})"),
        None => String::new(),
    };
    format!(
        "a := DATASET([{data}], {{{schema}}});\nOUTPUT(a, ,'{target}'{expire}{});",
        overwrite_flag(overwrite)
    )
}

/// Script reading every file in `sources` (in order) and writing their concatenation to `target`.
pub fn concat_script<S: AsRef<str>>(
    sources: &[S],
    schema: &RecordSchema,
    target: &str,
    overwrite: bool,
) -> String {
    let reads = sources
        .iter()
        .map(|name| format!("DATASET('{}', {{{schema}}}, THOR)", name.as_ref()))
        .collect::<Vec<_>>()
        .join("+\n");
    format!(
        "a := {reads};\nOUTPUT(a, ,'{target}' {});",
        overwrite_flag(overwrite)
    )
}

/// Script deleting every file in `names`. Files that no longer exist are skipped by the cluster.
pub fn delete_script<S: AsRef<str>>(names: &[S]) -> String {
    let mut script = String::from("IMPORT std;\n");
    for name in names {
        script.push_str("STD.File.DeleteLogicalFile('");
        script.push_str(name.as_ref());
        script.push_str("', TRUE);\n");
    }
    script
}

/// How a logical file is laid out on the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileLayout {
    /// A THOR flat file with its own record definition.
    #[default]
    Thor,
    /// A sprayed CSV file, read one line per row.
    Csv,
}

fn read_expression(logical_file: &str, layout: FileLayout) -> String {
    match layout {
        FileLayout::Thor => format!(
            "DATASET('{logical_file}', RECORDOF('{logical_file}', LOOKUP), THOR)"
        ),
        FileLayout::Csv => format!(
            "DATASET('{logical_file}', {{STRING line}}, CSV(SEPARATOR(''), QUOTE('')))"
        ),
    }
}

/// Script outputting the row count of `logical_file`.
pub fn count_script(logical_file: &str, layout: FileLayout) -> String {
    format!(
        "a := {};\nCOUNT(a);",
        read_expression(logical_file, layout)
    )
}

/// Script outputting `count` rows of `logical_file` starting at zero-based row `start`.
pub fn read_chunk_script(logical_file: &str, layout: FileLayout, start: usize, count: usize) -> String {
    format!(
        "a := {};\nOUTPUT(CHOOSEN(a, {count}, {}));",
        read_expression(logical_file, layout),
        start + 1
    )
}
