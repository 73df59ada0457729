use std::fmt;

use thiserror::Error;

/// Convenience result type for cluster operations.
pub type HpccResult<T> = Result<T, HpccError>;

/// Error type returned by loading, script execution, spray and download functions.
#[derive(Debug, Error)]
pub enum HpccError {
    /// Underlying I/O error (e.g. missing source file, failure to spawn `ecl`).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-file loading or CSV writing error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The worker pool used for chunked transfers could not be created.
    #[error("worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// HTTP error talking to the ESP endpoint.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Caller-supplied input is unusable (zero chunk size, ragged rows, missing script, ...).
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// `eclcc -syntax` rejected a script.
    #[error("script {script} failed syntax check: {stderr}")]
    Syntax { script: String, stderr: String },

    /// A script ran but the cluster reported on its error stream.
    #[error("script writing '{target}' returned an error: {stderr}")]
    Submission { target: String, stderr: String },

    /// One or more chunk submissions failed during a chunked spray.
    ///
    /// Every failed chunk is listed; concatenation was not attempted.
    #[error("{} of the chunk submissions for '{target}' failed: {}", .failures.len(), join_failures(.failures))]
    ChunkSubmissions {
        target: String,
        failures: Vec<ChunkFailure>,
    },

    /// One or more chunk reads failed while downloading a logical file.
    #[error("{} of the chunk reads of '{logical_file}' failed: {}", .failures.len(), join_failures(.failures))]
    ChunkDownloads {
        logical_file: String,
        failures: Vec<ChunkFailure>,
    },

    /// All chunks were written but concatenating them into the target failed.
    #[error("concatenating chunks into '{target}' failed: {source}")]
    Concatenation {
        target: String,
        #[source]
        source: Box<HpccError>,
    },

    /// Script output could not be interpreted.
    #[error("failed to parse script output: {message}")]
    Parse { message: String },
}

impl HpccError {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

/// A single failed chunk submission, after all attempts were exhausted.
#[derive(Debug)]
pub struct ChunkFailure {
    /// Logical file the chunk was written to or read from.
    pub name: String,
    /// First row of the chunk.
    pub start_row: usize,
    /// Number of rows in the chunk.
    pub row_count: usize,
    /// Attempts made before giving up.
    pub attempts: usize,
    /// Error from the final attempt.
    pub error: HpccError,
}

impl fmt::Display for ChunkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (rows {}..{}, {} attempt(s)): {}",
            self.name,
            self.start_row,
            self.start_row + self.row_count,
            self.attempts,
            self.error
        )
    }
}

fn join_failures(failures: &[ChunkFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
