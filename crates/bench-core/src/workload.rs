//! Workload capability traits.
//!
//! A workload (testcase) plugs into the engine through two capability
//! objects: the [`Workload`] itself, prepared once per run, and the
//! [`Worker`] units it creates, one per worker task. The engine owns all
//! scheduling concerns (pacing, timeouts, accounting); a worker only has
//! to perform one unit of work per call.

use async_trait::async_trait;
use evm_rpc::RpcConnection;

use crate::collect::BenchmarkResult;
use crate::engine::Options;
use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════════════
// WORKLOAD TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// A benchmark testcase.
///
/// # Lifecycle
///
/// 1. [`prepare`](Self::prepare) runs once before any worker exists; it
///    may dial its own connections, fetch nonces, or deploy contracts.
/// 2. [`create_worker`](Self::create_worker) runs once per worker index,
///    each bound to one pooled connection.
/// 3. [`on_finish`](Self::on_finish) runs after the channel has drained.
#[async_trait]
pub trait Workload: Send + Sync {
    /// Human-readable testcase name, used in the summary table.
    fn name(&self) -> &str;

    /// One-time setup before workers are created. Failure is fatal.
    async fn prepare(&mut self, opts: &Options) -> Result<()>;

    /// Create the worker bound to `worker_index` and `conn`.
    async fn create_worker(
        &self,
        conn: RpcConnection,
        worker_index: usize,
    ) -> Result<Box<dyn Worker>>;

    /// Called once with the final aggregates after the run drains.
    fn on_finish(&self, _result: &BenchmarkResult) {}
}

/// A per-worker unit that consumes work items serially.
#[async_trait]
pub trait Worker: Send {
    /// Perform the work item with the given index.
    ///
    /// The engine wraps each call in the per-work deadline; an
    /// implementation only needs to return an error for its own failure
    /// modes.
    ///
    /// # Errors
    ///
    /// Any error is recorded as a failed work item; the worker continues
    /// with the next item.
    async fn do_work(&mut self, work_index: u64) -> Result<()>;
}
