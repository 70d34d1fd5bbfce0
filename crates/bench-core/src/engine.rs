//! The benchmark engine.
//!
//! Orchestrates a run end to end: dial the connection pool, prepare the
//! workload, spawn the worker population, feed indices through a bounded
//! channel at the configured rate until the deadline, then drain and
//! report.
//!
//! # Backpressure
//!
//! The work channel holds `100 × execute_rate` items. When consumers fall
//! behind, the producer blocks on the channel send, which stretches its
//! `take` cadence: the effective submit rate degrades to the achievable
//! rate instead of queueing unboundedly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::collect::{BenchmarkResult, Reporter, ResultCollector, WorkResult};
use crate::error::{BenchError, Result};
use crate::rate::RateLimiter;
use crate::waitgroup::LimitWaitGroup;
use crate::workload::Workload;

/// Work-channel capacity as a multiple of the execute rate.
const CHANNEL_CAPACITY_FACTOR: usize = 100;

/// Cadence of the status printer.
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Benchmark run parameters.
#[derive(Debug, Clone)]
pub struct Options {
    /// JSON-RPC endpoint to drive.
    pub rpc_url: String,
    /// Number of worker tasks.
    pub num_workers: usize,
    /// Number of pooled RPC connections shared by workers.
    pub num_clients: usize,
    /// Target work items per second.
    pub execute_rate: u32,
    /// Total run duration.
    pub duration: Duration,
    /// Per-work-item deadline.
    pub timeout: Duration,
}

impl Options {
    /// Validate the option invariants.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::InvalidOptions`] naming the violated field.
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(BenchError::InvalidOptions("num_workers must be >= 1".into()));
        }
        if self.num_clients == 0 {
            return Err(BenchError::InvalidOptions("num_clients must be >= 1".into()));
        }
        if self.execute_rate == 0 {
            return Err(BenchError::InvalidOptions("execute_rate must be >= 1".into()));
        }
        if self.duration.is_zero() {
            return Err(BenchError::InvalidOptions("duration must be > 0".into()));
        }
        if self.timeout.is_zero() {
            return Err(BenchError::InvalidOptions("timeout must be > 0".into()));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BENCHMARK ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Drives a [`Workload`] at a fixed rate for a fixed duration.
pub struct BenchmarkEngine {
    opts: Options,
    limiter: RateLimiter,
    reporter: Option<Arc<dyn Reporter>>,
}

impl std::fmt::Debug for BenchmarkEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkEngine")
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl BenchmarkEngine {
    /// Create an engine for the given options.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::InvalidOptions`] if any option invariant is
    /// violated.
    pub fn new(opts: Options) -> Result<Self> {
        opts.validate()?;
        let limiter = RateLimiter::new(opts.execute_rate)?;
        Ok(Self {
            opts,
            limiter,
            reporter: None,
        })
    }

    /// Attach a reporter that receives every work result and is asked to
    /// publish once per status tick.
    pub fn set_reporter(&mut self, reporter: Arc<dyn Reporter>) {
        self.reporter = Some(reporter);
    }

    /// The engine's options.
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.opts
    }

    /// Run the workload to completion and return the final aggregates.
    ///
    /// Cancelling `shutdown` stops the producer early; outstanding items
    /// still drain under their per-work deadlines before this returns.
    ///
    /// # Errors
    ///
    /// Only setup failures (connections, preparation, worker creation)
    /// surface here. Per-work failures are counted in the result.
    pub async fn run(
        &self,
        shutdown: &CancellationToken,
        workload: &mut dyn Workload,
    ) -> Result<BenchmarkResult> {
        info!("Preparing connections");
        let connections =
            evm_rpc::create_connections(&self.opts.rpc_url, self.opts.num_clients).await?;

        info!(testcase = workload.name(), "Preparing testcase");
        workload.prepare(&self.opts).await?;

        let collector = Arc::new(ResultCollector::new(workload.name(), self.reporter.clone()));
        let wg = LimitWaitGroup::new(self.opts.num_workers);
        let capacity = CHANNEL_CAPACITY_FACTOR * self.opts.execute_rate as usize;
        let (work_tx, work_rx) = flume::bounded::<u64>(capacity);

        info!(workers = self.opts.num_workers, "Spawning workers");
        for worker_index in 0..self.opts.num_workers {
            let conn = connections[worker_index % connections.len()].clone();
            let mut worker = workload.create_worker(conn, worker_index).await?;
            wg.add().await?;

            let work_rx = work_rx.clone();
            let collector = Arc::clone(&collector);
            let members = wg.clone();
            let work_timeout = self.opts.timeout;
            tokio::spawn(async move {
                while let Ok(work_index) = work_rx.recv_async().await {
                    let started = Instant::now();
                    let outcome = timeout(work_timeout, worker.do_work(work_index)).await;
                    let error = match outcome {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(e),
                        Err(_) => Some(BenchError::Timeout),
                    };
                    collector.on_work_finish(WorkResult {
                        work_index,
                        elapsed: started.elapsed(),
                        error,
                    });
                }
                members.done();
            });
        }

        let printer_stop = shutdown.child_token();
        self.spawn_status_printer(Arc::clone(&collector), work_rx.clone(), printer_stop.clone());
        drop(work_rx);

        info!(
            rate = self.opts.execute_rate,
            duration = ?self.opts.duration,
            "Producing work"
        );
        self.produce_work(shutdown, &work_tx, &collector).await;
        drop(work_tx);

        info!("Waiting for workers to finish");
        wg.wait().await;
        printer_stop.cancel();

        let result = collector.snapshot();
        workload.on_finish(&result);
        Ok(result)
    }

    /// Feed indices into the channel at the limited rate until the
    /// deadline passes or `shutdown` fires. The channel closes when the
    /// last sender (held only here) drops.
    async fn produce_work(
        &self,
        shutdown: &CancellationToken,
        work_tx: &flume::Sender<u64>,
        collector: &ResultCollector,
    ) {
        let deadline = Instant::now() + self.opts.duration;
        for work_index in 0u64.. {
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = self.limiter.take() => {}
            }
            if work_tx.send_async(work_index).await.is_err() {
                break;
            }
            collector.on_work_start();
            if Instant::now() >= deadline {
                break;
            }
        }
    }

    /// Print aggregates once per second and ask the reporter to publish.
    fn spawn_status_printer(
        &self,
        collector: Arc<ResultCollector>,
        depth_rx: flume::Receiver<u64>,
        stop: CancellationToken,
    ) {
        let reporter = self.reporter.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(STATUS_INTERVAL);
            // The first tick of an interval fires immediately.
            tick.tick().await;
            loop {
                tokio::select! {
                    () = stop.cancelled() => return,
                    _ = tick.tick() => {
                        print_status(&collector.snapshot(), depth_rx.len());
                        if let Some(reporter) = &reporter {
                            reporter.publish_report().await;
                        }
                    }
                }
            }
        });
    }
}

/// One status line on stdout, as program output rather than diagnostics.
fn print_status(result: &BenchmarkResult, queued: usize) {
    println!(
        "total={} succeeded={} failed={} working={} queued={} min={:?} avg={:?} max={:?} submit/s={:.2} exec/s={:.2} elapsed={:?}",
        result.total,
        result.succeeded,
        result.failed,
        result.working(),
        queued,
        result.min_latency,
        result.avg_latency,
        result.max_latency,
        result.submit_per_sec,
        result.exec_per_sec,
        result.time_taken,
    );
}
