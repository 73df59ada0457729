//! Uploading ("spraying") a local dataset to a logical file.
//!
//! Small datasets are written in a single script. Larger ones are split into chunks that are
//! written concurrently to temporary logical files, concatenated into the target in row order,
//! and then deleted:
//!
//! ```text
//! Idle -> SchemaDerived -> DirectSubmitted ------------------------------> CleanedUp -> Done
//!                       \-> ChunksSubmitting -> ChunksSubmitted -> Concatenated -/
//! ```
//!
//! Any error moves the spray to `Failed`. Chunk failures are collected from every chunk before
//! the spray gives up, and temporaries are still cleaned up when cleanup is enabled.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::delete::delete_logical_files;
use crate::ecl::script::{self, TEMP_EXPIRE_DAYS};
use crate::ecl::{LiteralTable, RecordSchema, TypePolicy};
use crate::error::{ChunkFailure, HpccError, HpccResult};
use crate::execution::{
    ChunkExecutor, ChunkPlan, ExecutionOptions, TransferEvent, TransferMetrics,
    TransferMetricsSnapshot, TransferObserver,
};
use crate::gateway::{EclGateway, RunOptions};
use crate::ingestion::{DelimitedOptions, load_delimited};
use crate::types::DataSet;

/// Stages of a spray.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprayState {
    Idle,
    SchemaDerived,
    DirectSubmitted,
    ChunksSubmitting,
    ChunksSubmitted,
    Concatenated,
    CleanedUp,
    Done,
    Failed,
}

/// What to spray.
#[derive(Debug, Clone, Copy)]
pub enum SpraySource<'a> {
    /// An in-memory dataset.
    DataSet(&'a DataSet),
    /// A delimited file, loaded with [`SprayOptions::delimited`].
    Path(&'a Path),
}

impl<'a> From<&'a DataSet> for SpraySource<'a> {
    fn from(ds: &'a DataSet) -> Self {
        Self::DataSet(ds)
    }
}

impl<'a> From<&'a Path> for SpraySource<'a> {
    fn from(path: &'a Path) -> Self {
        Self::Path(path)
    }
}

/// Options controlling a spray.
#[derive(Debug, Clone)]
pub struct SprayOptions {
    /// Replace the target if it already exists.
    pub overwrite: bool,
    /// Rows per chunk; datasets no larger than this are written directly.
    pub chunk_size: usize,
    /// Maximum chunk scripts running on the cluster at once.
    ///
    /// Too many will overload this machine or the cluster.
    pub max_workers: usize,
    /// Attempts per chunk before the chunk is reported as failed.
    pub max_attempts: usize,
    /// Delete each workunit once it completes.
    pub delete_workunit: bool,
    /// Delete the temporary chunk files after concatenation (whether or not it succeeded).
    pub delete_temporaries: bool,
    /// How column types map onto ECL types.
    pub type_policy: TypePolicy,
    /// How [`SpraySource::Path`] sources are loaded.
    pub delimited: DelimitedOptions,
    /// Threads used to serialize chunks. `None` uses the available parallelism.
    pub num_threads: Option<usize>,
}

impl Default for SprayOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            chunk_size: 10_000,
            max_workers: 3,
            max_attempts: 1,
            delete_workunit: true,
            delete_temporaries: true,
            type_policy: TypePolicy::default(),
            delimited: DelimitedOptions::default(),
            num_threads: None,
        }
    }
}

/// How the target was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprayPath {
    /// One script wrote every row to the target.
    Direct,
    /// Rows were written in chunks and concatenated.
    Chunked,
}

/// A chunk written to a temporary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReport {
    pub name: String,
    pub start_row: usize,
    pub row_count: usize,
    pub attempts: usize,
}

/// A temporary file that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub name: String,
    pub error: String,
}

impl fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.error)
    }
}

/// Summary of a successful spray.
#[derive(Debug, Clone)]
pub struct SprayReport {
    pub target: String,
    pub rows: usize,
    pub schema: RecordSchema,
    pub path: SprayPath,
    /// Chunks in row order. Empty for [`SprayPath::Direct`].
    pub chunks: Vec<ChunkReport>,
    /// Temporaries left behind. Cleanup failures never fail the spray.
    pub cleanup_failures: Vec<CleanupFailure>,
    /// Metrics of this spray's chunk phase.
    pub metrics: Option<TransferMetricsSnapshot>,
}

/// Sprays datasets through an [`EclGateway`].
pub struct Sprayer<G> {
    gateway: G,
    options: SprayOptions,
    executor: ChunkExecutor,
}

impl<G: EclGateway> Sprayer<G> {
    /// Create a sprayer. Fails on a zero `chunk_size`, `max_workers` or `max_attempts`.
    pub fn new(gateway: G, options: SprayOptions) -> HpccResult<Self> {
        if options.chunk_size == 0 {
            return Err(HpccError::invalid_input("chunk_size must be > 0"));
        }
        if options.max_workers == 0 {
            return Err(HpccError::invalid_input("max_workers must be > 0"));
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

    /// Attach an observer for state changes and chunk events.
    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.executor = self.executor.with_observer(observer);
        self
    }

    /// Real-time chunk metrics of the most recently started spray.
    pub fn metrics(&self) -> Arc<TransferMetrics> {
        self.executor.metrics()
    }

    pub fn options(&self) -> &SprayOptions {
        &self.options
    }

    /// Spray an in-memory dataset to `target`.
    pub fn spray_dataset(&self, dataset: &DataSet, target: &str) -> HpccResult<SprayReport> {
        self.spray(SpraySource::DataSet(dataset), target)
    }

    /// Load a delimited file and spray it to `target`.
    pub fn spray_file(&self, path: impl AsRef<Path>, target: &str) -> HpccResult<SprayReport> {
        self.spray(SpraySource::Path(path.as_ref()), target)
    }

    /// Spray `source` to the logical file `target`.
    pub fn spray(&self, source: SpraySource<'_>, target: &str) -> HpccResult<SprayReport> {
        self.transition(SprayState::Idle);
        match self.spray_impl(source, target) {
            Ok(report) => {
                self.transition(SprayState::Done);
                Ok(report)
            }
            Err(e) => {
                self.transition(SprayState::Failed);
                Err(e)
            }
        }
    }

    fn spray_impl(&self, source: SpraySource<'_>, target: &str) -> HpccResult<SprayReport> {
        let loaded;
        let dataset = match source {
            SpraySource::DataSet(ds) => ds,
            SpraySource::Path(path) => {
                loaded = load_delimited(path, &self.options.delimited)?;
                &loaded
            }
        };
        if target.trim().is_empty() {
            return Err(HpccError::invalid_input("target logical file name is empty"));
        }
        if dataset.column_count() == 0 {
            return Err(HpccError::invalid_input("dataset has no columns"));
        }
        dataset.validate()?;

        let schema = RecordSchema::derive(dataset, self.options.type_policy);
        let table = LiteralTable::prepare(dataset, &schema);
        self.transition(SprayState::SchemaDerived);

        let rows = table.row_count();
        if rows <= self.options.chunk_size {
            info!(target, rows, "spraying directly");
            self.spray_direct(&table, &schema, target)?;
            self.transition(SprayState::CleanedUp);
            return Ok(SprayReport {
                target: target.to_string(),
                rows,
                schema,
                path: SprayPath::Direct,
                chunks: Vec::new(),
                cleanup_failures: Vec::new(),
                metrics: None,
            });
        }

        let plan = ChunkPlan::new(rows, self.options.chunk_size)?;
        info!(target, rows, chunks = plan.len(), workers = self.options.max_workers, "spraying in chunks");
        let (chunks, cleanup_failures, metrics) = self.spray_chunked(&plan, &table, &schema, target)?;

        Ok(SprayReport {
            target: target.to_string(),
            rows,
            schema,
            path: SprayPath::Chunked,
            chunks,
            cleanup_failures,
            metrics: Some(metrics),
        })
    }

    fn spray_direct(&self, table: &LiteralTable, schema: &RecordSchema, target: &str) -> HpccResult<()> {
        let script = script::submit_script(
            &table.serialize_all(),
            schema,
            target,
            self.options.overwrite,
            None,
        );
        self.gateway
            .run_string(&script, &self.run_options())?
            .into_checked(target)?;
        self.transition(SprayState::DirectSubmitted);
        Ok(())
    }

    fn spray_chunked(
        &self,
        plan: &ChunkPlan,
        table: &LiteralTable,
        schema: &RecordSchema,
        target: &str,
    ) -> HpccResult<(Vec<ChunkReport>, Vec<CleanupFailure>, TransferMetricsSnapshot)> {
        let names: Vec<String> = plan
            .chunks()
            .iter()
            .map(|c| script::temp_file_name(target, c.start, c.end()))
            .collect();
        let run_options = self.run_options();

        self.transition(SprayState::ChunksSubmitting);
        let run = self.executor.run(plan, |chunk, attempt| {
            let name = &names[chunk.index];
            debug!(file = %name, start = chunk.start, rows = chunk.row_count, attempt, "submitting chunk");
            let data = table.serialize_rows(chunk.rows());
            // Temporaries are always overwritten so a retry of a half-written chunk succeeds.
            let script = script::submit_script(&data, schema, name, true, Some(TEMP_EXPIRE_DAYS));
            self.gateway
                .run_string(&script, &run_options)?
                .into_checked(name)
                .map(|_| ())
        });

        let mut reports = Vec::with_capacity(run.outcomes.len());
        let mut failures = Vec::new();
        for outcome in run.outcomes {
            let name = names[outcome.chunk.index].clone();
            match outcome.result {
                Ok(()) => reports.push(ChunkReport {
                    name,
                    start_row: outcome.chunk.start,
                    row_count: outcome.chunk.row_count,
                    attempts: outcome.attempts,
                }),
                Err(error) => failures.push(ChunkFailure {
                    name,
                    start_row: outcome.chunk.start,
                    row_count: outcome.chunk.row_count,
                    attempts: outcome.attempts,
                    error,
                }),
            }
        }

        if !failures.is_empty() {
            warn!(target, failed = failures.len(), chunks = names.len(), "chunk submissions failed; skipping concatenation");
            self.cleanup(&names);
            return Err(HpccError::ChunkSubmissions {
                target: target.to_string(),
                failures,
            });
        }
        self.transition(SprayState::ChunksSubmitted);

        let concat = script::concat_script(&names, schema, target, self.options.overwrite);
        let concatenated = self
            .gateway
            .run_string(&concat, &run_options)
            .and_then(|out| out.into_checked(target));
        if let Err(e) = concatenated {
            self.cleanup(&names);
            return Err(HpccError::Concatenation {
                target: target.to_string(),
                source: Box::new(e),
            });
        }
        self.transition(SprayState::Concatenated);

        let cleanup_failures = self.cleanup(&names);
        self.transition(SprayState::CleanedUp);
        Ok((reports, cleanup_failures, run.metrics))
    }

    /// Best-effort removal of temporaries. Failures are reported, never returned as errors.
    fn cleanup(&self, names: &[String]) -> Vec<CleanupFailure> {
        if !self.options.delete_temporaries {
            return Vec::new();
        }
        match delete_logical_files(&self.gateway, names, self.options.delete_workunit) {
            Ok(()) => Vec::new(),
            Err(e) => {
                let error = e.to_string();
                warn!(files = names.len(), %error, "failed to delete temporary files");
                names
                    .iter()
                    .map(|name| {
                        self.executor.emit(TransferEvent::CleanupFailed {
                            name: name.clone(),
                            error: error.clone(),
                        });
                        CleanupFailure {
                            name: name.clone(),
                            error: error.clone(),
                        }
                    })
                    .collect()
            }
        }
    }

    fn run_options(&self) -> RunOptions {
        RunOptions::generated(self.options.delete_workunit)
    }

    fn transition(&self, state: SprayState) {
        debug!(?state, "spray state");
        self.executor.emit(TransferEvent::StateChanged { state });
    }
}

/// Spray `source` to `target` with a one-off [`Sprayer`].
pub fn spray<'a, G: EclGateway>(
    gateway: G,
    source: impl Into<SpraySource<'a>>,
    target: &str,
    options: SprayOptions,
) -> HpccResult<SprayReport> {
    Sprayer::new(gateway, options)?.spray(source.into(), target)
}

#[cfg(test)]
mod tests {
    use super::{SprayOptions, SprayPath, SprayState, Sprayer};
    use std::sync::{Arc, Mutex};

    use crate::error::{HpccError, HpccResult};
    use crate::execution::{TransferEvent, TransferObserver};
    use crate::gateway::{EclGateway, EclOutput, RunOptions, ScriptSource};
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    #[derive(Default)]
    struct Recorder {
        scripts: Mutex<Vec<String>>,
    }

    impl EclGateway for Recorder {
        fn run(&self, script: ScriptSource<'_>, _options: &RunOptions) -> HpccResult<EclOutput> {
            match script {
                ScriptSource::Text(s) => self.scripts.lock().unwrap().push(s.to_string()),
                ScriptSource::Path(_) => return Err(HpccError::invalid_input("unexpected path")),
            }
            Ok(EclOutput::default())
        }
    }

    #[derive(Default)]
    struct States(Mutex<Vec<SprayState>>);

    impl TransferObserver for States {
        fn on_event(&self, event: &TransferEvent) {
            if let TransferEvent::StateChanged { state } = event {
                self.0.lock().unwrap().push(*state);
            }
        }
    }

    fn names(n: usize) -> DataSet {
        let schema = Schema::new(vec![Field::new("name", DataType::Utf8)]);
        let rows = (0..n).map(|i| vec![Value::Utf8(format!("n{i}"))]).collect();
        DataSet::new(schema, rows)
    }

    #[test]
    fn direct_path_walks_direct_states() {
        let gateway = Arc::new(Recorder::default());
        let states = Arc::new(States::default());
        let sprayer = Sprayer::new(Arc::clone(&gateway), SprayOptions::default())
            .unwrap()
            .with_observer(states.clone());

        let report = sprayer.spray_dataset(&names(2), "out").unwrap();
        assert_eq!(report.path, SprayPath::Direct);
        assert_eq!(
            *states.0.lock().unwrap(),
            vec![
                SprayState::Idle,
                SprayState::SchemaDerived,
                SprayState::DirectSubmitted,
                SprayState::CleanedUp,
                SprayState::Done,
            ]
        );
        assert_eq!(gateway.scripts.lock().unwrap().len(), 1);
    }

    #[test]
    fn chunked_path_walks_chunked_states() {
        let states = Arc::new(States::default());
        let opts = SprayOptions {
            chunk_size: 2,
            ..Default::default()
        };
        let sprayer = Sprayer::new(Recorder::default(), opts)
            .unwrap()
            .with_observer(states.clone());

        sprayer.spray_dataset(&names(5), "out").unwrap();
        assert_eq!(
            *states.0.lock().unwrap(),
            vec![
                SprayState::Idle,
                SprayState::SchemaDerived,
                SprayState::ChunksSubmitting,
                SprayState::ChunksSubmitted,
                SprayState::Concatenated,
                SprayState::CleanedUp,
                SprayState::Done,
            ]
        );
    }

    #[test]
    fn invalid_inputs_fail_before_any_script_runs() {
        let gateway = Arc::new(Recorder::default());
        assert!(Sprayer::new(Arc::clone(&gateway), SprayOptions { chunk_size: 0, ..Default::default() }).is_err());
        assert!(Sprayer::new(Arc::clone(&gateway), SprayOptions { max_workers: 0, ..Default::default() }).is_err());

        let sprayer = Sprayer::new(Arc::clone(&gateway), SprayOptions::default()).unwrap();
        assert!(sprayer.spray_dataset(&DataSet::default(), "out").is_err());
        assert!(sprayer.spray_dataset(&names(1), " ").is_err());
        assert!(sprayer.spray_file("no/such/file.csv", "out").is_err());
        assert!(gateway.scripts.lock().unwrap().is_empty());
    }
}
