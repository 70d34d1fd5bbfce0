//! Workload implementations for the evm-bench engine.
//!
//! Two testcases plug into [`bench_core::Workload`]:
//!
//! - [`TransferEthWorkload`] (testcase 1): signed EIP-1559 self-transfers,
//!   optionally awaiting head-driven confirmation.
//! - [`QueryErc20Workload`] (testcase 2): read-only `balanceOf` calls,
//!   with a one-shot token deployment when no address is supplied.
//!
//! The runner binary selects one by testcase id at startup.

pub mod deploy;
pub mod query;
pub mod transfer;

pub use deploy::TokenDeployment;
pub use query::QueryErc20Workload;
pub use transfer::TransferEthWorkload;
