//! Error types for the benchmark core.
//!
//! Two classes of error flow through the engine:
//!
//! - **Setup errors** (connection, derivation, preparation) abort the run
//!   and surface out of [`BenchmarkEngine::run`](crate::engine::BenchmarkEngine::run).
//! - **Per-work errors** (RPC failures, signing failures, timeouts) are
//!   recorded in the result aggregates and never unwind the engine.

use thiserror::Error;

/// Result type for benchmark operations.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors produced during setup or by individual work items.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Connection-layer error.
    #[error("rpc error: {0}")]
    Rpc(#[from] evm_rpc::RpcError),

    /// Transport error from a provider call.
    #[error("transport error: {0}")]
    Transport(#[from] alloy::transports::TransportError),

    /// Transaction signing failed.
    #[error("signing error: {0}")]
    Sign(#[from] alloy::signers::Error),

    /// Contract call failed.
    #[error("contract error: {0}")]
    Contract(#[from] alloy::contract::Error),

    /// Account derivation from the seed phrase failed.
    #[error("failed to derive account: {0}")]
    Derive(String),

    /// Invalid benchmark options.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// A work item exceeded its deadline.
    #[error("work item timed out")]
    Timeout,

    /// The operation was cancelled before it completed.
    #[error("cancelled")]
    Cancelled,

    /// The confirmation monitor halted while a wait was outstanding.
    #[error("confirmation monitor halted")]
    MonitorHalted,

    /// A transaction was included but reverted (receipt status 0).
    #[error("transaction reverted")]
    Reverted,

    /// Workload preparation failed.
    #[error("setup failed: {0}")]
    Setup(String),
}

impl BenchError {
    /// Whether this error is the per-work timeout signal.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}
