//! Online aggregation of per-work outcomes.
//!
//! The collector is shared by every worker. `total` (submissions) is an
//! atomic counter touched by the producer; everything else lives behind a
//! mutex updated once per completed work item. Rates and the average
//! latency are derived at snapshot time from the running sums.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::BenchError;

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of a single work item. Immutable once emitted.
#[derive(Debug)]
pub struct WorkResult {
    /// Index assigned by the producer.
    pub work_index: u64,
    /// Wall-clock time the work item took, including a timed-out wait.
    pub elapsed: Duration,
    /// The failure, if any. `None` means success.
    pub error: Option<BenchError>,
}

/// Aggregated outcome of a benchmark run.
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    /// Name of the testcase that ran.
    pub testcase: String,
    /// Work items submitted to the work channel.
    pub total: u64,
    /// Work items that completed without error.
    pub succeeded: u64,
    /// Work items that failed or timed out.
    pub failed: u64,
    /// Smallest observed latency.
    pub min_latency: Duration,
    /// Largest observed latency.
    pub max_latency: Duration,
    /// Mean latency over all completed items.
    pub avg_latency: Duration,
    /// Completed items per second of run time.
    pub exec_per_sec: f64,
    /// Submitted items per second of run time.
    pub submit_per_sec: f64,
    /// Wall-clock start of the run.
    pub start_time: DateTime<Utc>,
    /// Elapsed run time at the moment of the snapshot.
    pub time_taken: Duration,
}

impl BenchmarkResult {
    /// Completed (succeeded or failed) work items.
    #[must_use]
    pub const fn executed(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Submitted items still outstanding.
    #[must_use]
    pub const fn working(&self) -> u64 {
        self.total.saturating_sub(self.succeeded + self.failed)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORTER CAPABILITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Sink for per-work results, flushed periodically to an external store.
///
/// Implementations must never propagate failures into the engine; a failed
/// publish is logged and the next tick starts afresh.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Record one completed work item.
    fn collect_work_result(&self, work: &WorkResult);

    /// Flush accumulated data to the backing store.
    async fn publish_report(&self);
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT COLLECTOR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Aggregates {
    succeeded: u64,
    failed: u64,
    // Duration::ZERO doubles as the "unset" sentinel; the first
    // observation seeds it unconditionally.
    min_latency: Duration,
    max_latency: Duration,
    total_exec_time: Duration,
}

/// Thread-safe online statistics for one benchmark run.
pub struct ResultCollector {
    testcase: String,
    started_at: Instant,
    start_time: DateTime<Utc>,
    total: AtomicU64,
    aggregates: Mutex<Aggregates>,
    reporter: Option<Arc<dyn Reporter>>,
}

impl std::fmt::Debug for ResultCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCollector")
            .field("testcase", &self.testcase)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

impl ResultCollector {
    /// Create a collector for the named testcase, starting the run clock.
    #[must_use]
    pub fn new(testcase: impl Into<String>, reporter: Option<Arc<dyn Reporter>>) -> Self {
        Self {
            testcase: testcase.into(),
            started_at: Instant::now(),
            start_time: Utc::now(),
            total: AtomicU64::new(0),
            aggregates: Mutex::new(Aggregates::default()),
            reporter,
        }
    }

    /// Record a submission. Called by the producer, lock-free.
    pub fn on_work_start(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed work item and forward it to the reporter.
    pub fn on_work_finish(&self, work: WorkResult) {
        if let Some(reporter) = &self.reporter {
            reporter.collect_work_result(&work);
        }
        if let Some(error) = &work.error {
            debug!(work_index = work.work_index, error = %error, "Work item failed");
        }

        let mut agg = self.lock_aggregates();
        agg.total_exec_time += work.elapsed;
        if work.error.is_some() {
            agg.failed += 1;
        } else {
            agg.succeeded += 1;
        }
        if work.elapsed > agg.max_latency {
            agg.max_latency = work.elapsed;
        }
        if agg.min_latency == Duration::ZERO || work.elapsed < agg.min_latency {
            agg.min_latency = work.elapsed;
        }
    }

    /// Submissions so far.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// A consistent snapshot of the aggregates with derived rates.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Counter magnitudes are far below 2^52.
    pub fn snapshot(&self) -> BenchmarkResult {
        let total = self.total();
        let time_taken = self.started_at.elapsed();
        let secs = time_taken.as_secs_f64();
        let agg = self.lock_aggregates();
        let executed = agg.succeeded + agg.failed;

        let avg_latency = if executed == 0 {
            Duration::ZERO
        } else {
            agg.total_exec_time.div_f64(executed as f64)
        };
        let (exec_per_sec, submit_per_sec) = if secs > 0.0 {
            (executed as f64 / secs, total as f64 / secs)
        } else {
            (0.0, 0.0)
        };

        BenchmarkResult {
            testcase: self.testcase.clone(),
            total,
            succeeded: agg.succeeded,
            failed: agg.failed,
            min_latency: agg.min_latency,
            max_latency: agg.max_latency,
            avg_latency,
            exec_per_sec,
            submit_per_sec,
            start_time: self.start_time,
            time_taken,
        }
    }

    fn lock_aggregates(&self) -> std::sync::MutexGuard<'_, Aggregates> {
        self.aggregates.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
