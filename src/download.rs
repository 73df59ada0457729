//! Downloading logical files in parallel chunks.
//!
//! The row count is read first, then each chunk of rows is fetched by its own script with
//! `CHOOSEN`. Chunks are reassembled in row order.

use std::sync::Arc;

use tracing::{debug, info};

use crate::ecl::FileLayout;
use crate::ecl::script;
use crate::error::{ChunkFailure, HpccError, HpccResult};
use crate::execution::{ChunkExecutor, ChunkPlan, ExecutionOptions, TransferMetrics, TransferObserver};
use crate::gateway::{EclGateway, RunOptions};
use crate::results::parse_first_output;
use crate::types::{DataSet, Value};

/// Options controlling a download.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// How the file is stored on the cluster.
    pub layout: FileLayout,
    /// Rows fetched per script.
    pub chunk_size: usize,
    /// Maximum chunk scripts running at once.
    pub max_workers: usize,
    /// Attempts per chunk before giving up.
    pub max_attempts: usize,
    pub delete_workunit: bool,
    pub num_threads: Option<usize>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            layout: FileLayout::Thor,
            chunk_size: 10_000,
            max_workers: 15,
            max_attempts: 3,
            delete_workunit: true,
            num_threads: None,
        }
    }
}

/// Downloads logical files through an [`EclGateway`].
pub struct Downloader<G> {
    gateway: G,
    options: DownloadOptions,
    executor: ChunkExecutor,
}

impl<G: EclGateway> Downloader<G> {
    pub fn new(gateway: G, options: DownloadOptions) -> HpccResult<Self> {
        if options.chunk_size == 0 {
            return Err(HpccError::invalid_input("chunk_size must be > 0"));
        }
        let executor = ChunkExecutor::new(ExecutionOptions {
            num_threads: options.num_threads,
            max_in_flight_chunks: options.max_workers,
            max_attempts: options.max_attempts,
        })?;
        Ok(Self {
            gateway,
            options,
            executor,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.executor = self.executor.with_observer(observer);
        self
    }

    pub fn metrics(&self) -> Arc<TransferMetrics> {
        self.executor.metrics()
    }

    /// Number of rows in `logical_file`.
    pub fn row_count(&self, logical_file: &str) -> HpccResult<usize> {
        let script = script::count_script(logical_file, self.options.layout);
        let out = self
            .gateway
            .run_string(&script, &self.run_options())?
            .into_checked(logical_file)?;
        let counted = parse_first_output(&out.stdout)?;
        match counted.rows.first().and_then(|row| row.first()) {
            Some(Value::Utf8(text)) => text
                .trim()
                .parse()
                .map_err(|_| HpccError::parse(format!("row count '{text}' is not a number"))),
            _ => Err(HpccError::parse(format!("no row count returned for '{logical_file}'"))),
        }
    }

    /// Fetch every row of `logical_file`.
    ///
    /// All chunks are attempted; if any still fails after its retries, every failure is
    /// returned together.
    pub fn get_logical_file(&self, logical_file: &str) -> HpccResult<DataSet> {
        let rows = self.row_count(logical_file)?;
        if rows == 0 {
            return Ok(DataSet::default());
        }
        let plan = ChunkPlan::new(rows, self.options.chunk_size)?;
        info!(logical_file, rows, chunks = plan.len(), "downloading logical file");

        let run_options = self.run_options();
        let layout = self.options.layout;
        let run = self.executor.run(&plan, |chunk, attempt| {
            debug!(logical_file, start = chunk.start, rows = chunk.row_count, attempt, "reading chunk");
            let script = script::read_chunk_script(logical_file, layout, chunk.start, chunk.row_count);
            let out = self
                .gateway
                .run_string(&script, &run_options)?
                .into_checked(logical_file)?;
            parse_first_output(&out.stdout)
        });

        let mut data = DataSet::default();
        let mut failures = Vec::new();
        for outcome in run.outcomes {
            match outcome.result {
                Ok(part) if failures.is_empty() => data.append(part)?,
                Ok(_) => {}
                Err(error) => failures.push(ChunkFailure {
                    name: logical_file.to_string(),
                    start_row: outcome.chunk.start,
                    row_count: outcome.chunk.row_count,
                    attempts: outcome.attempts,
                    error,
                }),
            }
        }
        if !failures.is_empty() {
            return Err(HpccError::ChunkDownloads {
                logical_file: logical_file.to_string(),
                failures,
            });
        }
        Ok(data)
    }

    fn run_options(&self) -> RunOptions {
        RunOptions::generated(self.options.delete_workunit)
    }
}

/// Download `logical_file` with a one-off [`Downloader`].
pub fn get_logical_file<G: EclGateway>(
    gateway: G,
    logical_file: &str,
    options: DownloadOptions,
) -> HpccResult<DataSet> {
    Downloader::new(gateway, options)?.get_logical_file(logical_file)
}
