//! Bounded-concurrency execution of chunked transfers.
//!
//! This module sits underneath [`crate::spray`] and [`crate::download`] and provides:
//!
//! - Chunk planning over a row index space ([`ChunkPlan`])
//! - Parallel per-chunk execution with a cap on in-flight cluster calls
//! - Bounded per-chunk retries
//! - Real-time metrics + observer hooks for monitoring

mod observer;
mod plan;
mod semaphore;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::error::{HpccError, HpccResult};

pub use observer::{
    TracingObserver, TransferEvent, TransferMetrics, TransferMetricsSnapshot, TransferObserver,
};
pub use plan::{Chunk, ChunkPlan};

use semaphore::Semaphore;

/// Configuration for the [`ChunkExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Number of worker threads used for per-chunk work (serialization, parsing).
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Upper bound on chunks talking to the cluster at the same time.
    ///
    /// Protects both this host and the cluster; chunks beyond the limit wait their turn.
    pub max_in_flight_chunks: usize,
    /// Attempts per chunk before it is reported as failed. `1` disables retries.
    pub max_attempts: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            num_threads: None,
            max_in_flight_chunks: 3,
            max_attempts: 1,
        }
    }
}

/// The result of running one chunk to completion.
#[derive(Debug)]
pub struct ChunkOutcome<T> {
    pub chunk: Chunk,
    /// Attempts made, including the successful one.
    pub attempts: usize,
    pub result: HpccResult<T>,
}

/// Every chunk outcome of one [`ChunkExecutor::run`], with that run's final metrics.
#[derive(Debug)]
pub struct ChunkRun<T> {
    /// Outcomes in plan order.
    pub outcomes: Vec<ChunkOutcome<T>>,
    pub metrics: TransferMetricsSnapshot,
}

/// Runs a task for every chunk of a [`ChunkPlan`] with bounded concurrency.
///
/// Each run counts into its own [`TransferMetrics`], so concurrent runs on one executor do not
/// mix their numbers.
pub struct ChunkExecutor {
    pool: ThreadPool,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn TransferObserver>>,
    runs: AtomicU64,
    latest: Mutex<Arc<TransferMetrics>>,
}

impl ChunkExecutor {
    /// Create a new executor.
    ///
    /// Fails if `max_in_flight_chunks == 0`, `max_attempts == 0`, `num_threads == Some(0)`, or
    /// the worker pool cannot be started.
    pub fn new(opts: ExecutionOptions) -> HpccResult<Self> {
        if opts.max_in_flight_chunks == 0 {
            return Err(HpccError::invalid_input("max_in_flight_chunks must be > 0"));
        }
        if opts.max_attempts == 0 {
            return Err(HpccError::invalid_input("max_attempts must be > 0"));
        }
        if opts.num_threads == Some(0) {
            return Err(HpccError::invalid_input("num_threads must be > 0 when set"));
        }

        let n_threads = opts
            .num_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
            .max(opts.max_in_flight_chunks);

        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i| format!("hpcc-chunk-{i}"))
            .build()?;

        Ok(Self {
            pool,
            opts,
            observer: None,
            runs: AtomicU64::new(0),
            latest: Mutex::new(Arc::new(TransferMetrics::new())),
        })
    }

    /// Attach an observer for transfer events.
    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Real-time metrics of the most recently started run.
    pub fn metrics(&self) -> Arc<TransferMetrics> {
        Arc::clone(&self.latest.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.opts
    }

    /// Run `task` for every chunk of `plan` and wait for all of them.
    ///
    /// `task` receives the chunk and the 1-based attempt number. A chunk is retried until it
    /// succeeds or `max_attempts` is reached. Failures never stop sibling chunks; every chunk
    /// runs to completion before this returns. Outcomes are in plan order regardless of
    /// completion order.
    pub fn run<T, F>(&self, plan: &ChunkPlan, task: F) -> ChunkRun<T>
    where
        T: Send,
        F: Fn(&Chunk, usize) -> HpccResult<T> + Send + Sync,
    {
        self.pool.install(|| self.run_impl(plan, &task))
    }

    fn run_impl<T, F>(&self, plan: &ChunkPlan, task: &F) -> ChunkRun<T>
    where
        T: Send,
        F: Fn(&Chunk, usize) -> HpccResult<T> + Send + Sync,
    {
        let start = Instant::now();
        let run_id = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        let metrics = Arc::new(TransferMetrics::for_run(run_id));
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&metrics);
        self.emit(TransferEvent::RunStarted { chunks: plan.len() });

        let sem = Semaphore::new(self.opts.max_in_flight_chunks);

        let outcomes: Vec<ChunkOutcome<T>> = plan
            .chunks()
            .par_iter()
            .map(|chunk| {
                let permit = sem.acquire();
                if permit.waited > Duration::ZERO {
                    metrics.on_throttle_wait(permit.waited);
                    self.emit(TransferEvent::ThrottleWaited {
                        duration: permit.waited,
                    });
                }

                metrics.on_chunk_start();
                self.emit(TransferEvent::ChunkStarted {
                    index: chunk.index,
                    start_row: chunk.start,
                    row_count: chunk.row_count,
                });

                let (attempts, result) = self.attempt(chunk, task, &metrics);
                let ok = result.is_ok();

                self.emit(TransferEvent::ChunkFinished {
                    index: chunk.index,
                    attempts,
                    ok,
                });
                metrics.on_chunk_end(chunk.row_count, ok);
                drop(permit);

                ChunkOutcome {
                    chunk: *chunk,
                    attempts,
                    result,
                }
            })
            .collect();

        metrics.end_run(start.elapsed());
        let snapshot = metrics.snapshot();
        self.emit(TransferEvent::RunFinished {
            elapsed: start.elapsed(),
            metrics: snapshot.clone(),
        });

        ChunkRun {
            outcomes,
            metrics: snapshot,
        }
    }

    fn attempt<T, F>(&self, chunk: &Chunk, task: &F, metrics: &TransferMetrics) -> (usize, HpccResult<T>)
    where
        F: Fn(&Chunk, usize) -> HpccResult<T>,
    {
        let mut attempt = 1;
        loop {
            match task(chunk, attempt) {
                Ok(v) => return (attempt, Ok(v)),
                Err(e) if attempt >= self.opts.max_attempts => return (attempt, Err(e)),
                Err(e) => {
                    metrics.on_retry();
                    self.emit(TransferEvent::ChunkRetrying {
                        index: chunk.index,
                        attempt,
                        error: e.to_string(),
                    });
                    attempt += 1;
                }
            }
        }
    }

    /// Forward an event to the attached observer, if any.
    pub(crate) fn emit(&self, event: TransferEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChunkExecutor, ChunkPlan, ExecutionOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::error::HpccError;
    use crate::execution::{TransferEvent, TransferObserver};

    fn executor(max_in_flight: usize, max_attempts: usize) -> ChunkExecutor {
        ChunkExecutor::new(ExecutionOptions {
            num_threads: Some(4),
            max_in_flight_chunks: max_in_flight,
            max_attempts,
        })
        .unwrap()
    }

    struct ConcurrencyObserver {
        active_chunks: AtomicUsize,
        max_active_chunks: AtomicUsize,
    }

    impl ConcurrencyObserver {
        fn new() -> Self {
            Self {
                active_chunks: AtomicUsize::new(0),
                max_active_chunks: AtomicUsize::new(0),
            }
        }
        fn max(&self) -> usize {
            self.max_active_chunks.load(Ordering::SeqCst)
        }
    }

    impl TransferObserver for ConcurrencyObserver {
        fn on_event(&self, event: &TransferEvent) {
            match event {
                TransferEvent::ChunkStarted { .. } => {
                    let now = self.active_chunks.fetch_add(1, Ordering::SeqCst) + 1;
                    self.max_active_chunks.fetch_max(now, Ordering::SeqCst);
                }
                TransferEvent::ChunkFinished { .. } => {
                    self.active_chunks.fetch_sub(1, Ordering::SeqCst);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn max_in_flight_chunks_throttles_concurrency() {
        let observer = Arc::new(ConcurrencyObserver::new());
        let obs_trait: Arc<dyn TransferObserver> = observer.clone();
        let exec = executor(2, 1).with_observer(obs_trait);
        let plan = ChunkPlan::new(40, 1).unwrap();

        let run = exec.run(&plan, |_chunk, _attempt| {
            std::thread::sleep(Duration::from_millis(2));
            Ok(())
        });

        assert_eq!(run.outcomes.len(), 40);
        assert!(run.metrics.max_active_chunks <= 2);
        assert!(observer.max() <= 2);
        assert!(exec.metrics().snapshot().max_active_chunks <= 2);
    }

    #[test]
    fn outcomes_follow_plan_order_not_completion_order() {
        let exec = executor(4, 1);
        let plan = ChunkPlan::new(8, 2).unwrap();

        let run = exec.run(&plan, |chunk, _| {
            // Later chunks finish first.
            std::thread::sleep(Duration::from_millis((4 - chunk.index as u64) * 3));
            Ok(chunk.start)
        });

        let starts: Vec<usize> = run.outcomes.into_iter().map(|o| o.result.unwrap()).collect();
        assert_eq!(starts, vec![0, 2, 4, 6]);
    }

    #[test]
    fn failures_do_not_stop_siblings() {
        let exec = executor(2, 1);
        let plan = ChunkPlan::new(5, 1).unwrap();
        let ran = AtomicUsize::new(0);

        let run = exec.run(&plan, |chunk, _| {
            ran.fetch_add(1, Ordering::SeqCst);
            if chunk.index == 1 {
                Err(HpccError::invalid_input("boom"))
            } else {
                Ok(())
            }
        });

        assert_eq!(ran.load(Ordering::SeqCst), 5);
        let failed: Vec<usize> = run
            .outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.chunk.index)
            .collect();
        assert_eq!(failed, vec![1]);

        assert_eq!(run.metrics.chunks_failed, 1);
        assert_eq!(run.metrics.rows_transferred, 4);
        assert_eq!(exec.metrics().snapshot(), run.metrics);
    }

    #[test]
    fn retries_are_bounded_and_counted() {
        let exec = executor(1, 3);
        let plan = ChunkPlan::new(2, 1).unwrap();
        let attempts_seen = Mutex::new(Vec::new());

        let run = exec.run(&plan, |chunk, attempt| {
            attempts_seen.lock().unwrap().push((chunk.index, attempt));
            match chunk.index {
                // Succeeds on the second attempt.
                0 if attempt < 2 => Err(HpccError::invalid_input("flaky")),
                0 => Ok(()),
                _ => Err(HpccError::invalid_input("always")),
            }
        });

        assert_eq!(run.outcomes[0].attempts, 2);
        assert!(run.outcomes[0].result.is_ok());
        assert_eq!(run.outcomes[1].attempts, 3);
        assert!(run.outcomes[1].result.is_err());
        assert_eq!(run.metrics.retries, 3);
        assert_eq!(attempts_seen.lock().unwrap().len(), 5);
    }

    #[test]
    fn concurrent_runs_keep_separate_metrics() {
        let exec = executor(4, 1);
        let small = ChunkPlan::new(3, 1).unwrap();
        let large = ChunkPlan::new(12, 1).unwrap();
        let task = |_: &super::Chunk, _: usize| {
            std::thread::sleep(Duration::from_millis(2));
            Ok(())
        };

        let (a, b) = std::thread::scope(|s| {
            let a = s.spawn(|| exec.run(&small, task));
            let b = s.spawn(|| exec.run(&large, task));
            (a.join().unwrap(), b.join().unwrap())
        });

        assert_eq!(a.metrics.rows_transferred, 3);
        assert_eq!(a.metrics.chunks_finished, 3);
        assert_eq!(b.metrics.rows_transferred, 12);
        assert_eq!(b.metrics.chunks_finished, 12);
        assert_ne!(a.metrics.run_id, b.metrics.run_id);
    }

    #[test]
    fn invalid_options_are_rejected() {
        for opts in [
            ExecutionOptions { max_in_flight_chunks: 0, ..Default::default() },
            ExecutionOptions { max_attempts: 0, ..Default::default() },
            ExecutionOptions { num_threads: Some(0), ..Default::default() },
        ] {
            assert!(ChunkExecutor::new(opts).is_err());
        }
    }
}
