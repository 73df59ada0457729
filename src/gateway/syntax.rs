//! `eclcc -syntax` pre-flight checks.

use tracing::{debug, warn};

use crate::error::{HpccError, HpccResult};

/// What the compiler's error stream says about a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxVerdict {
    /// Nothing on the error stream.
    Clean,
    /// Only warnings; the script may still be run.
    Warnings(String),
    /// At least one compile error.
    Errors(String),
    /// Output that is neither an error nor a warning.
    Unrecognized(String),
}

/// Classify `eclcc -syntax` error output.
pub fn classify(stderr: &str) -> SyntaxVerdict {
    let text = stderr.trim();
    if text.is_empty() {
        return SyntaxVerdict::Clean;
    }
    let lower = text.to_ascii_lowercase();
    if lower.contains(": error") {
        SyntaxVerdict::Errors(text.to_string())
    } else if lower.contains(": warning") {
        SyntaxVerdict::Warnings(text.to_string())
    } else {
        SyntaxVerdict::Unrecognized(text.to_string())
    }
}

/// Turn a verdict about `script` into a result, logging warnings.
pub fn check(script: &str, stderr: &str) -> HpccResult<()> {
    match classify(stderr) {
        SyntaxVerdict::Clean => {
            debug!(script, "script passes syntax check");
            Ok(())
        }
        SyntaxVerdict::Warnings(text) => {
            warn!(script, warnings = %text, "script compiles with warnings");
            Ok(())
        }
        SyntaxVerdict::Errors(text) => Err(HpccError::Syntax {
            script: script.to_string(),
            stderr: text,
        }),
        SyntaxVerdict::Unrecognized(text) => Err(HpccError::Syntax {
            script: script.to_string(),
            stderr: format!("unhandled compiler feedback: {text}"),
        }),
    }
}
