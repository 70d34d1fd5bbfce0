//! Benchmark primitives for the evm-bench load generator.
//!
//! This crate provides the building blocks that the runner binary wires
//! together:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Application Layer                                           │
//! │  └─ evm-bench (CLI runner)                                   │
//! │  └─ eth-workloads (transfer / query testcases)               │
//! └──────────────────────────────────┬───────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Benchmark Layer (bench-core) ◄── YOU ARE HERE               │
//! │  └─ BenchmarkEngine: producer, workers, deadlines, drain     │
//! │  └─ TestWallet: derived accounts, batched nonces             │
//! │  └─ TxMonitor: head-driven confirmation fan-out              │
//! │  └─ ResultCollector: online aggregates, status printing      │
//! │  └─ RateLimiter / LimitWaitGroup: pacing and join control    │
//! └──────────────────────────────────┬───────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Connection Layer (evm-rpc)                                  │
//! │  └─ RpcConnection: pooled, multiplexed JSON-RPC handles      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Execution model
//!
//! One producer task emits integer work indices at the configured rate; a
//! fixed population of worker tasks consumes them from a bounded channel,
//! invoking the workload under a per-item deadline. Every emitted index
//! yields exactly one [`WorkResult`](collect::WorkResult). For
//! transactional workloads, confirmation waits go through the
//! [`TxMonitor`](monitor::TxMonitor) instead of per-transaction receipt
//! polling.

// ═══════════════════════════════════════════════════════════════════════════════
// MODULES
// ═══════════════════════════════════════════════════════════════════════════════

pub mod collect;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod rate;
pub mod waitgroup;
pub mod wallet;
pub mod workload;

// ═══════════════════════════════════════════════════════════════════════════════
// RE-EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

// Error types
pub use error::{BenchError, Result};

// Engine
pub use engine::{BenchmarkEngine, Options};

// Collection
pub use collect::{BenchmarkResult, Reporter, ResultCollector, WorkResult};

// Wallet
pub use wallet::{TestAccount, TestWallet};

// Monitor
pub use monitor::{TxMonitor, TxSubscription};

// Pacing and join control
pub use rate::RateLimiter;
pub use waitgroup::LimitWaitGroup;

// Workload capability
pub use workload::{Worker, Workload};
