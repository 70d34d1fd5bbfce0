//! Read-only ERC-20 balance query workload.
//!
//! Every work item issues a `balanceOf` call for the worker's account
//! against a deployed token. When no token address is supplied, `prepare`
//! deploys the benchmark token from the first account.

use std::sync::Arc;

use alloy::primitives::Address;
use alloy::providers::DynProvider;
use alloy::sol;
use async_trait::async_trait;
use bench_core::{BenchError, Options, Result, TestWallet, Worker, Workload};
use evm_rpc::RpcConnection;
use tracing::info;

use crate::deploy::TokenDeployment;

sol! {
    /// Read-side ERC-20 surface used by the query workload.
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// QUERY WORKLOAD
// ═══════════════════════════════════════════════════════════════════════════════

/// Testcase 2: rate-controlled read-only balance queries.
pub struct QueryErc20Workload {
    wallet: Arc<TestWallet>,
    token_address: Option<Address>,
}

impl std::fmt::Debug for QueryErc20Workload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryErc20Workload")
            .field("accounts", &self.wallet.len())
            .field("token_address", &self.token_address)
            .finish_non_exhaustive()
    }
}

impl QueryErc20Workload {
    /// Create the workload.
    ///
    /// With `token_address == None`, `prepare` deploys the benchmark token
    /// from account 0.
    #[must_use]
    pub const fn new(wallet: Arc<TestWallet>, token_address: Option<Address>) -> Self {
        Self {
            wallet,
            token_address,
        }
    }

    /// The token address queried by the workers, once known.
    #[must_use]
    pub const fn token_address(&self) -> Option<Address> {
        self.token_address
    }
}

#[async_trait]
impl Workload for QueryErc20Workload {
    fn name(&self) -> &str {
        "Query ERC20 balance"
    }

    async fn prepare(&mut self, opts: &Options) -> Result<()> {
        if self.token_address.is_some() {
            return Ok(());
        }
        let conn = RpcConnection::connect(&opts.rpc_url).await?;
        let deployer = self.wallet.account(0).signer().clone();
        let address = TokenDeployment::new(conn, deployer).deploy().await?;
        info!(%address, "Benchmark token deployed");
        self.token_address = Some(address);
        Ok(())
    }

    async fn create_worker(
        &self,
        conn: RpcConnection,
        worker_index: usize,
    ) -> Result<Box<dyn Worker>> {
        let token_address = self
            .token_address
            .ok_or_else(|| BenchError::Setup("no token address after prepare".into()))?;
        Ok(Box::new(QueryErc20Worker {
            token: IERC20::new(token_address, conn.provider().clone()),
            account: self.wallet.address(worker_index % self.wallet.len()),
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// QUERY WORKER
// ═══════════════════════════════════════════════════════════════════════════════

struct QueryErc20Worker {
    token: IERC20::IERC20Instance<DynProvider>,
    account: Address,
}

#[async_trait]
impl Worker for QueryErc20Worker {
    async fn do_work(&mut self, _work_index: u64) -> Result<()> {
        let _balance = self.token.balanceOf(self.account).call().await?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const MNEMONIC: &str = "test test test test test test test test test test test junk";

    #[tokio::test]
    async fn prepare_is_a_no_op_with_existing_token() {
        let wallet = Arc::new(TestWallet::from_mnemonic(MNEMONIC, 1).unwrap());
        let token = address!("00000000000000000000000000000000000000aa");
        let mut workload = QueryErc20Workload::new(wallet, Some(token));

        // No connection is dialed, so a bogus URL must not matter.
        let opts = Options {
            rpc_url: "not a url".into(),
            num_workers: 1,
            num_clients: 1,
            execute_rate: 1,
            duration: std::time::Duration::from_secs(1),
            timeout: std::time::Duration::from_secs(1),
        };
        workload.prepare(&opts).await.unwrap();
        assert_eq!(workload.token_address(), Some(token));
    }

    #[test]
    fn workers_cycle_through_accounts() {
        let wallet = Arc::new(TestWallet::from_mnemonic(MNEMONIC, 3).unwrap());
        let workload = QueryErc20Workload::new(Arc::clone(&wallet), None);
        // Worker 4 of 3 accounts maps back to account 1.
        assert_eq!(
            wallet.address(4 % wallet.len()),
            wallet.address(1)
        );
        assert!(workload.token_address().is_none());
    }
}
