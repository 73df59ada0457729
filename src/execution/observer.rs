use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::spray::SprayState;

/// Events emitted while sprays and chunked downloads run.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    RunStarted { chunks: usize },
    /// The spray state machine moved to `state`.
    StateChanged { state: SprayState },
    ThrottleWaited { duration: Duration },
    ChunkStarted { index: usize, start_row: usize, row_count: usize },
    /// An attempt failed and another will be made.
    ChunkRetrying { index: usize, attempt: usize, error: String },
    ChunkFinished { index: usize, attempts: usize, ok: bool },
    /// A temporary file could not be deleted. Never fatal.
    CleanupFailed { name: String, error: String },
    RunFinished {
        elapsed: Duration,
        metrics: TransferMetricsSnapshot,
    },
}

/// Observer hook for transfer events.
pub trait TransferObserver: Send + Sync {
    fn on_event(&self, event: &TransferEvent);
}

/// Forwards transfer events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl TransferObserver for TracingObserver {
    fn on_event(&self, event: &TransferEvent) {
        match event {
            TransferEvent::ChunkRetrying { index, attempt, error } => {
                warn!(chunk = index, attempt, %error, "chunk attempt failed, retrying")
            }
            TransferEvent::ChunkFinished { index, attempts, ok: false } => {
                warn!(chunk = index, attempts, "chunk failed")
            }
            TransferEvent::CleanupFailed { name, error } => {
                warn!(file = %name, %error, "failed to delete temporary file")
            }
            TransferEvent::RunFinished { elapsed, metrics } => {
                info!(?elapsed, %metrics, "transfer finished")
            }
            other => debug!(event = ?other, "transfer event"),
        }
    }
}

/// Real-time counters for a transfer run.
///
/// Updated by the executor while chunks run; callers can snapshot them at any time.
pub struct TransferMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    rows_transferred: AtomicU64,
    chunks_started: AtomicU64,
    chunks_finished: AtomicU64,
    chunks_failed: AtomicU64,
    retries: AtomicU64,
    throttle_wait_ns: AtomicU64,

    active_chunks: AtomicUsize,
    max_active_chunks: AtomicUsize,
}

impl TransferMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
            rows_transferred: AtomicU64::new(0),
            chunks_started: AtomicU64::new(0),
            chunks_finished: AtomicU64::new(0),
            chunks_failed: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            throttle_wait_ns: AtomicU64::new(0),
            active_chunks: AtomicUsize::new(0),
            max_active_chunks: AtomicUsize::new(0),
        }
    }

    /// Fresh counters for the run numbered `run_id`.
    pub fn for_run(run_id: u64) -> Self {
        let metrics = Self::new();
        metrics.run_id.store(run_id, Ordering::SeqCst);
        metrics
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns.store(saturating_nanos(elapsed), Ordering::SeqCst);
    }

    pub fn on_chunk_start(&self) {
        self.chunks_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_chunks.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_chunks.fetch_max(now, Ordering::SeqCst);
    }

    pub fn on_chunk_end(&self, rows: usize, ok: bool) {
        self.chunks_finished.fetch_add(1, Ordering::SeqCst);
        self.active_chunks.fetch_sub(1, Ordering::SeqCst);
        if ok {
            self.rows_transferred.fetch_add(rows as u64, Ordering::SeqCst);
        } else {
            self.chunks_failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn on_retry(&self) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_throttle_wait(&self, d: Duration) {
        self.throttle_wait_ns.fetch_add(saturating_nanos(d), Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> TransferMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        TransferMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed: (elapsed_ns > 0).then(|| Duration::from_nanos(elapsed_ns)),
            rows_transferred: self.rows_transferred.load(Ordering::SeqCst),
            chunks_started: self.chunks_started.load(Ordering::SeqCst),
            chunks_finished: self.chunks_finished.load(Ordering::SeqCst),
            chunks_failed: self.chunks_failed.load(Ordering::SeqCst),
            retries: self.retries.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_chunks: self.max_active_chunks.load(Ordering::SeqCst),
        }
    }
}

impl Default for TransferMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    d.as_nanos().min(u64::MAX as u128) as u64
}

/// Immutable snapshot of [`TransferMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub rows_transferred: u64,
    pub chunks_started: u64,
    pub chunks_finished: u64,
    pub chunks_failed: u64,
    pub retries: u64,
    pub throttle_wait: Duration,
    pub max_active_chunks: usize,
}

impl fmt::Display for TransferMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, rows={}, chunks={}/{} (failed={}, retries={}), max_active_chunks={}, throttle_wait={:?}, elapsed={:?}",
            self.run_id,
            self.rows_transferred,
            self.chunks_finished,
            self.chunks_started,
            self.chunks_failed,
            self.retries,
            self.max_active_chunks,
            self.throttle_wait,
            self.elapsed
        )
    }
}
