//! Bootstrap token deployment.
//!
//! The query workload needs a contract to call. When no address is
//! supplied, `prepare` deploys one from the first account and waits for
//! inclusion by polling `eth_getTransactionReceipt` every 500 ms. Polling
//! is acceptable here because deployment happens once per run; the hot
//! path uses the head-driven monitor instead.

use std::time::Duration;

use alloy::consensus::{SignableTransaction, TxEip1559};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256, bytes};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionReceipt;
use alloy::signers::local::PrivateKeySigner;
use bench_core::{BenchError, Result};
use evm_rpc::RpcConnection;
use tracing::info;

/// Interval between receipt polls while waiting for inclusion.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Overall deadline for deployment including inclusion.
const DEPLOY_TIMEOUT: Duration = Duration::from_secs(10);

/// Gas limit for the deployment transaction.
const DEPLOY_GAS_LIMIT: u64 = 1_000_000;

/// Max fee per gas for the deployment: 101 gwei.
const DEPLOY_MAX_FEE_PER_GAS: u128 = 101_000_000_000;

/// Max priority fee per gas for the deployment: 100 gwei.
const DEPLOY_MAX_PRIORITY_FEE_PER_GAS: u128 = 100_000_000_000;

/// Pre-assembled deploy code for a minimal query-target token.
///
/// The constructor copies a five-byte runtime that answers every call with
/// a 32-byte zero word, which is exactly the shape `balanceOf` needs for a
/// read-path benchmark. Supply `--erc20` to measure against a real token.
static TOKEN_DEPLOY_CODE: Bytes = bytes!("600580600b6000396000f360206000f3");

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN DEPLOYMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// One-shot deployment of the benchmark token.
pub struct TokenDeployment {
    conn: RpcConnection,
    signer: PrivateKeySigner,
}

impl std::fmt::Debug for TokenDeployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenDeployment")
            .field("deployer", &self.signer.address())
            .finish_non_exhaustive()
    }
}

impl TokenDeployment {
    /// Create a deployment funded and signed by `signer`.
    #[must_use]
    pub const fn new(conn: RpcConnection, signer: PrivateKeySigner) -> Self {
        Self { conn, signer }
    }

    /// Deploy the token and wait for inclusion.
    ///
    /// # Errors
    ///
    /// Fails on RPC or signing errors, when the deployment transaction
    /// reverts, or when inclusion is not observed within the deploy
    /// deadline.
    pub async fn deploy(&self) -> Result<Address> {
        let provider = self.conn.provider();
        let chain_id = provider.get_chain_id().await?;
        let nonce = provider
            .get_transaction_count(self.signer.address())
            .pending()
            .await?;

        let mut tx = TxEip1559 {
            chain_id,
            nonce,
            gas_limit: DEPLOY_GAS_LIMIT,
            max_fee_per_gas: DEPLOY_MAX_FEE_PER_GAS,
            max_priority_fee_per_gas: DEPLOY_MAX_PRIORITY_FEE_PER_GAS,
            to: TxKind::Create,
            value: U256::ZERO,
            access_list: Default::default(),
            input: TOKEN_DEPLOY_CODE.clone(),
        };
        let signature = self.signer.sign_transaction_sync(&mut tx).map_err(BenchError::Sign)?;
        let signed = tx.into_signed(signature);
        let hash = *signed.hash();

        info!(deployer = %self.signer.address(), %hash, "Deploying benchmark token");
        provider.send_raw_transaction(&signed.encoded_2718()).await?;

        let receipt = self.wait_for_receipt(hash).await?;
        if !receipt.status() {
            return Err(BenchError::Reverted);
        }
        receipt
            .contract_address
            .ok_or_else(|| BenchError::Setup("deployment receipt has no contract address".into()))
    }

    /// Poll for the receipt every 500 ms until it appears or the deploy
    /// deadline passes.
    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TransactionReceipt> {
        let provider = self.conn.provider();
        let poll = async {
            loop {
                if let Some(receipt) = provider.get_transaction_receipt(hash).await? {
                    return Ok(receipt);
                }
                tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(DEPLOY_TIMEOUT, poll)
            .await
            .map_err(|_| BenchError::Timeout)?
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
