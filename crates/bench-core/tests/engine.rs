//! End-to-end engine tests against stub workloads.
//!
//! A wiremock server stands in for the RPC endpoint so the connection
//! pool can be created; the stub workloads never touch it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bench_core::{
    BenchError, BenchmarkEngine, Options, Reporter, Result, WorkResult, Worker, Workload,
};
use evm_rpc::RpcConnection;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

/// Captures whether every observed failure was the timeout signal.
#[derive(Debug, Default)]
struct TimeoutProbe {
    observed: AtomicU64,
    timeouts: AtomicU64,
}

#[async_trait]
impl Reporter for TimeoutProbe {
    fn collect_work_result(&self, work: &WorkResult) {
        self.observed.fetch_add(1, Ordering::SeqCst);
        if work.error.as_ref().is_some_and(BenchError::is_timeout) {
            self.timeouts.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn publish_report(&self) {}
}

// ═══════════════════════════════════════════════════════════════════════════════
// STUB WORKLOAD
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy)]
enum StubBehavior {
    /// Complete successfully after the given sleep.
    Succeed(Duration),
    /// Fail immediately with a setup-style error.
    Fail,
    /// Sleep far past the engine deadline.
    Stall(Duration),
}

struct StubWorkload {
    behavior: StubBehavior,
    prepared: bool,
    workers_created: Arc<AtomicU64>,
}

impl StubWorkload {
    fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior,
            prepared: false,
            workers_created: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[async_trait]
impl Workload for StubWorkload {
    fn name(&self) -> &str {
        "stub"
    }

    async fn prepare(&mut self, _opts: &Options) -> Result<()> {
        self.prepared = true;
        Ok(())
    }

    async fn create_worker(
        &self,
        _conn: RpcConnection,
        _worker_index: usize,
    ) -> Result<Box<dyn Worker>> {
        self.workers_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubWorker {
            behavior: self.behavior,
        }))
    }
}

struct StubWorker {
    behavior: StubBehavior,
}

#[async_trait]
impl Worker for StubWorker {
    async fn do_work(&mut self, _work_index: u64) -> Result<()> {
        match self.behavior {
            StubBehavior::Succeed(latency) => {
                tokio::time::sleep(latency).await;
                Ok(())
            }
            StubBehavior::Fail => Err(BenchError::Setup("x".into())),
            StubBehavior::Stall(for_how_long) => {
                tokio::time::sleep(for_how_long).await;
                Ok(())
            }
        }
    }
}

fn options(server: &MockServer, workers: usize, rate: u32, duration: Duration) -> Options {
    Options {
        rpc_url: server.uri(),
        num_workers: workers,
        num_clients: 1,
        execute_rate: rate,
        duration,
        timeout: Duration::from_secs(5),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn fast_workload_succeeds_at_target_rate() {
    let server = MockServer::start().await;
    let opts = options(&server, 4, 10, Duration::from_secs(1));
    let engine = BenchmarkEngine::new(opts).unwrap();
    let mut workload = StubWorkload::new(StubBehavior::Succeed(Duration::from_millis(1)));

    let shutdown = CancellationToken::new();
    let result = engine.run(&shutdown, &mut workload).await.unwrap();

    assert!(workload.prepared);
    assert_eq!(workload.workers_created.load(Ordering::SeqCst), 4);
    // Rate 10 over 1s, plus up to a token of slack either way.
    assert!((5..=15).contains(&result.total), "total = {}", result.total);
    assert_eq!(result.succeeded, result.total);
    assert_eq!(result.failed, 0);
    assert!(result.max_latency < Duration::from_millis(100));
}

#[tokio::test]
async fn failing_workload_counts_every_item_as_failed() {
    let server = MockServer::start().await;
    let opts = options(&server, 8, 100, Duration::from_secs(2));
    let engine = BenchmarkEngine::new(opts).unwrap();
    let mut workload = StubWorkload::new(StubBehavior::Fail);

    let shutdown = CancellationToken::new();
    let result = engine.run(&shutdown, &mut workload).await.unwrap();

    assert!(result.total > 0);
    assert_eq!(result.succeeded, 0);
    assert_eq!(result.failed, result.total);
}

#[tokio::test]
async fn stalled_workload_times_out_per_item() {
    let server = MockServer::start().await;
    let mut opts = options(&server, 2, 5, Duration::from_secs(1));
    opts.timeout = Duration::from_millis(500);
    let mut engine = BenchmarkEngine::new(opts).unwrap();
    let probe = Arc::new(TimeoutProbe::default());
    engine.set_reporter(Arc::clone(&probe) as Arc<dyn Reporter>);
    let mut workload = StubWorkload::new(StubBehavior::Stall(Duration::from_secs(2)));

    let shutdown = CancellationToken::new();
    let result = engine.run(&shutdown, &mut workload).await.unwrap();

    // Every recorded failure carried the distinct timeout signal.
    assert_eq!(
        probe.observed.load(Ordering::SeqCst),
        probe.timeouts.load(Ordering::SeqCst)
    );
    assert_eq!(probe.observed.load(Ordering::SeqCst), result.total);
    assert!(result.total > 0);
    assert_eq!(result.failed, result.total);
    assert_eq!(result.succeeded, 0);
    // Each item runs into the 500ms deadline; elapsed includes only
    // scheduling noise past it.
    assert!(result.max_latency >= Duration::from_millis(500));
    assert!(result.max_latency < Duration::from_millis(700));
    assert!(result.min_latency >= Duration::from_millis(500));
}

#[tokio::test]
async fn submit_rate_tracks_configured_rate() {
    let server = MockServer::start().await;
    let opts = options(&server, 10, 1000, Duration::from_secs(3));
    let capacity = 100 * 1000;
    let engine = BenchmarkEngine::new(opts).unwrap();
    let mut workload = StubWorkload::new(StubBehavior::Succeed(Duration::from_millis(1)));

    let shutdown = CancellationToken::new();
    let result = engine.run(&shutdown, &mut workload).await.unwrap();

    assert!(
        result.submit_per_sec >= 800.0 && result.submit_per_sec <= 1200.0,
        "submit_per_sec = {}",
        result.submit_per_sec
    );
    // Consumers keep up, so the backlog never approaches capacity.
    assert!(result.total < capacity as u64);
    assert_eq!(result.executed(), result.total);
}

// ═══════════════════════════════════════════════════════════════════════════════
// INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn every_produced_index_gets_exactly_one_outcome() {
    let server = MockServer::start().await;
    let opts = options(&server, 4, 50, Duration::from_secs(1));
    let engine = BenchmarkEngine::new(opts).unwrap();
    let mut workload = StubWorkload::new(StubBehavior::Succeed(Duration::from_millis(2)));

    let shutdown = CancellationToken::new();
    let result = engine.run(&shutdown, &mut workload).await.unwrap();

    assert_eq!(result.succeeded + result.failed, result.total);
    assert_eq!(result.working(), 0);
}

#[tokio::test]
async fn cancellation_stops_the_producer_and_drains() {
    let server = MockServer::start().await;
    let opts = options(&server, 2, 20, Duration::from_secs(30));
    let engine = BenchmarkEngine::new(opts).unwrap();
    let mut workload = StubWorkload::new(StubBehavior::Succeed(Duration::from_millis(1)));

    let shutdown = CancellationToken::new();
    let canceller = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let result = engine.run(&shutdown, &mut workload).await.unwrap();

    // Returned long before the 30s deadline, with the books balanced.
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.succeeded + result.failed, result.total);
}

#[tokio::test]
async fn rejects_invalid_options() {
    let opts = Options {
        rpc_url: "http://localhost:1".into(),
        num_workers: 0,
        num_clients: 1,
        execute_rate: 10,
        duration: Duration::from_secs(1),
        timeout: Duration::from_secs(1),
    };
    assert!(matches!(
        BenchmarkEngine::new(opts),
        Err(BenchError::InvalidOptions(_))
    ));
}
