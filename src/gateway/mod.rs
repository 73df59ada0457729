//! Running ECL against a cluster.
//!
//! Everything that talks to the cluster goes through the [`EclGateway`] trait. The process-based
//! [`Connection`] shells out to the `ecl`/`eclcc` client tools; tests substitute in-memory
//! gateways.

mod connection;
pub mod syntax;
mod workunit;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{HpccError, HpccResult};

pub use connection::Connection;

/// An ECL script given either inline or as a file on disk.
#[derive(Debug, Clone, Copy)]
pub enum ScriptSource<'a> {
    Text(&'a str),
    Path(&'a Path),
}

impl fmt::Display for ScriptSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(_) => f.write_str("<inline script>"),
            Self::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

/// A value substituted for a `#STORED` variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for StoredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Per-run options passed to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Compile the script with `eclcc -syntax` before submitting it.
    pub syntax_check: bool,
    /// Delete the workunit from the cluster once it completes.
    pub delete_workunit: bool,
    /// Values for stored variables in the script.
    pub stored: BTreeMap<String, StoredValue>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            syntax_check: true,
            delete_workunit: true,
            stored: BTreeMap::new(),
        }
    }
}

impl RunOptions {
    /// Options for scripts generated by this crate: no syntax pre-flight.
    pub fn generated(delete_workunit: bool) -> Self {
        Self {
            syntax_check: false,
            delete_workunit,
            stored: BTreeMap::new(),
        }
    }
}

/// Captured output streams of one script run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EclOutput {
    pub stdout: String,
    pub stderr: String,
}

impl EclOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Treat anything on the error stream as failure of the script writing `target`.
    pub fn into_checked(self, target: &str) -> HpccResult<Self> {
        if self.stderr.trim().is_empty() {
            Ok(self)
        } else {
            Err(HpccError::Submission {
                target: target.to_string(),
                stderr: self.stderr.trim().to_string(),
            })
        }
    }

    /// Workunit id reported by `ecl run`, if present.
    pub fn wuid(&self) -> Option<&str> {
        self.stdout
            .lines()
            .find_map(|line| line.trim().strip_prefix("wuid:"))
            .map(str::trim)
            .filter(|w| !w.is_empty())
    }
}

/// Executes ECL scripts against a cluster.
///
/// Implementations must be safe to call from several threads at once; chunked transfers issue
/// independent runs concurrently.
pub trait EclGateway: Send + Sync {
    /// Run `script` and return its output streams.
    ///
    /// An `Err` means the script could not be run at all. A script that ran but reported errors
    /// returns `Ok` with a non-empty `stderr`; callers decide how to treat it.
    fn run(&self, script: ScriptSource<'_>, options: &RunOptions) -> HpccResult<EclOutput>;

    /// Run an inline script.
    fn run_string(&self, script: &str, options: &RunOptions) -> HpccResult<EclOutput> {
        self.run(ScriptSource::Text(script), options)
    }
}

impl<G: EclGateway + ?Sized> EclGateway for &G {
    fn run(&self, script: ScriptSource<'_>, options: &RunOptions) -> HpccResult<EclOutput> {
        (**self).run(script, options)
    }
}

impl<G: EclGateway + ?Sized> EclGateway for Arc<G> {
    fn run(&self, script: ScriptSource<'_>, options: &RunOptions) -> HpccResult<EclOutput> {
        (**self).run(script, options)
    }
}

#[cfg(test)]
mod tests {
    use super::{EclOutput, StoredValue};

    #[test]
    fn stderr_makes_output_a_submission_error() {
        let ok = EclOutput::new("<Result/>", "  \n").into_checked("t");
        assert!(ok.is_ok());

        let err = EclOutput::new("", "Error: boom\n").into_checked("thor::t").unwrap_err();
        assert_eq!(
            err.to_string(),
            "script writing 'thor::t' returned an error: Error: boom"
        );
    }

    #[test]
    fn wuid_is_read_from_stdout() {
        let out = EclOutput::new("Using eclcc path eclcc\nwuid: W20240101-120000\nstate: completed\n", "");
        assert_eq!(out.wuid(), Some("W20240101-120000"));
        assert_eq!(EclOutput::default().wuid(), None);
    }

    #[test]
    fn stored_values_render_plainly() {
        assert_eq!(StoredValue::Str("x y".into()).to_string(), "x y");
        assert_eq!(StoredValue::Int(-2).to_string(), "-2");
        assert_eq!(StoredValue::Bool(true).to_string(), "true");
    }
}
