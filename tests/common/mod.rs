#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use hpcc_client::HpccResult;
use hpcc_client::gateway::{EclGateway, EclOutput, RunOptions, ScriptSource};
use hpcc_client::types::{DataSet, DataType, Field, Schema, Value};

/// In-memory stand-in for a cluster.
///
/// Keeps each logical file's inline row text, so a concatenation holds its sources' rows in
/// script order. Rejects writes onto existing files without `OVERWRITE` and concatenation of
/// files that do not exist. Records every script it receives.
#[derive(Default)]
pub struct MockCluster {
    pub scripts: Mutex<Vec<String>>,
    pub files: Mutex<BTreeMap<String, String>>,
    fail_writes_to: HashSet<String>,
    flaky_writes_to: Mutex<HashSet<String>>,
    fail_deletes: bool,
    fail_concat: bool,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write to `name` reports an error.
    pub fn failing_writes_to(mut self, name: &str) -> Self {
        self.fail_writes_to.insert(name.to_string());
        self
    }

    /// The first write to `name` reports an error, later ones succeed.
    pub fn flaky_writes_to(self, name: &str) -> Self {
        self.flaky_writes_to.lock().unwrap().insert(name.to_string());
        self
    }

    pub fn failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    pub fn failing_concat(mut self) -> Self {
        self.fail_concat = true;
        self
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    pub fn files(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    /// Row text of `name`, as written between `DATASET([` and `]`.
    pub fn body(&self, name: &str) -> Option<String> {
        self.files.lock().unwrap().get(name).cloned()
    }

    fn error(msg: String) -> HpccResult<EclOutput> {
        Ok(EclOutput::new("", format!("Error: {msg}\n")))
    }

    fn handle(&self, script: &str) -> HpccResult<EclOutput> {
        if script.starts_with("IMPORT std;") {
            if self.fail_deletes {
                return Self::error("permission denied".into());
            }
            let mut files = self.files.lock().unwrap();
            for name in quoted_after(script, "DeleteLogicalFile('") {
                files.remove(&name);
            }
            return Ok(EclOutput::default());
        }

        let target = quoted_after(script, "OUTPUT(a, ,'").into_iter().next().unwrap_or_default();
        let overwrite = script.contains("OVERWRITE");
        let sources = quoted_after(script, "DATASET('");

        let body = if !sources.is_empty() {
            if self.fail_concat {
                return Self::error("concatenation failed".into());
            }
            let files = self.files.lock().unwrap();
            let mut parts = Vec::with_capacity(sources.len());
            for source in &sources {
                match files.get(source) {
                    Some(part) if part.is_empty() => {}
                    Some(part) => parts.push(part.clone()),
                    None => return Self::error(format!("logical file '{source}' not found")),
                }
            }
            parts.join(",")
        } else if self.fail_writes_to.contains(&target)
            || self.flaky_writes_to.lock().unwrap().remove(&target)
        {
            return Self::error(format!("write to '{target}' failed"));
        } else {
            inline_rows(script).to_string()
        };

        let mut files = self.files.lock().unwrap();
        if files.contains_key(&target) && !overwrite {
            return Self::error(format!("logical file '{target}' already exists"));
        }
        files.insert(target, body);
        Ok(EclOutput::new("wuid: W20240101-000000\nstate: completed\n", ""))
    }
}

impl EclGateway for MockCluster {
    fn run(&self, script: ScriptSource<'_>, _options: &RunOptions) -> HpccResult<EclOutput> {
        let text = match script {
            ScriptSource::Text(text) => text.to_string(),
            ScriptSource::Path(path) => std::fs::read_to_string(path)?,
        };
        self.scripts.lock().unwrap().push(text.clone());
        self.handle(&text)
    }
}

/// Text between `DATASET([` and the `], {` that opens the record of an inline dataset.
fn inline_rows(script: &str) -> &str {
    let Some(start) = script.find("DATASET([").map(|i| i + "DATASET([".len()) else {
        return "";
    };
    match script.rfind("], {") {
        Some(end) if end >= start => &script[start..end],
        _ => "",
    }
}

/// Every `'...'` string that directly follows `marker` in `script`.
pub fn quoted_after(script: &str, marker: &str) -> Vec<String> {
    script
        .split(marker)
        .skip(1)
        .filter_map(|rest| rest.split('\'').next())
        .map(str::to_string)
        .collect()
}

/// `n` rows of `(id, name)`.
pub fn people(n: usize) -> DataSet {
    let schema = Schema::new(vec![
        Field::new("id", DataType::Int64),
        Field::new("name", DataType::Utf8),
    ]);
    let rows = (0..n)
        .map(|i| vec![Value::Int64(i as i64), Value::Utf8(format!("person{i}"))])
        .collect();
    DataSet::new(schema, rows)
}
