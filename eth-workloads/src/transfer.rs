//! Signed value-transfer workload.
//!
//! Every work item builds an EIP-1559 self-transfer for the worker's
//! account, signs it locally, and submits the raw bytes. With a
//! confirmation monitor attached, the worker registers the transaction
//! hash before submitting and then awaits the head-driven signal under the
//! engine's per-work deadline.

use std::sync::Arc;

use alloy::consensus::{SignableTransaction, TxEip1559};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Bytes, TxHash, TxKind, U256};
use alloy::providers::Provider;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use bench_core::{BenchError, Options, Result, TestWallet, TxMonitor, Worker, Workload};
use evm_rpc::RpcConnection;
use tracing::info;

/// Fixed gas limit for a plain value transfer.
const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Max fee per gas: 101 gwei.
const MAX_FEE_PER_GAS: u128 = 101_000_000_000;

/// Max priority fee per gas: 101 gwei.
const MAX_PRIORITY_FEE_PER_GAS: u128 = 101_000_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFER WORKLOAD
// ═══════════════════════════════════════════════════════════════════════════════

/// Testcase 1: rate-controlled signed transaction submission.
pub struct TransferEthWorkload {
    wallet: Arc<TestWallet>,
    monitor: Option<Arc<TxMonitor>>,
    chain_id: u64,
}

impl std::fmt::Debug for TransferEthWorkload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferEthWorkload")
            .field("accounts", &self.wallet.len())
            .field("wait_for_receipt", &self.monitor.is_some())
            .finish_non_exhaustive()
    }
}

impl TransferEthWorkload {
    /// Create the workload.
    ///
    /// Passing a monitor enables receipt waiting: each worker registers
    /// its transaction hash with the monitor before submitting.
    #[must_use]
    pub fn new(wallet: Arc<TestWallet>, monitor: Option<Arc<TxMonitor>>) -> Self {
        Self {
            wallet,
            monitor,
            chain_id: 0,
        }
    }
}

#[async_trait]
impl Workload for TransferEthWorkload {
    fn name(&self) -> &str {
        "Transfer ETH"
    }

    async fn prepare(&mut self, opts: &Options) -> Result<()> {
        let conn = RpcConnection::connect(&opts.rpc_url).await?;
        self.chain_id = conn.provider().get_chain_id().await?;
        info!(
            chain_id = self.chain_id,
            accounts = self.wallet.len(),
            "Fetching account nonces"
        );
        self.wallet.fetch_nonces(&conn).await?;
        Ok(())
    }

    async fn create_worker(
        &self,
        conn: RpcConnection,
        worker_index: usize,
    ) -> Result<Box<dyn Worker>> {
        Ok(Box::new(TransferEthWorker {
            conn,
            wallet: Arc::clone(&self.wallet),
            account_index: worker_index % self.wallet.len(),
            chain_id: self.chain_id,
            monitor: self.monitor.clone(),
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFER WORKER
// ═══════════════════════════════════════════════════════════════════════════════

struct TransferEthWorker {
    conn: RpcConnection,
    wallet: Arc<TestWallet>,
    account_index: usize,
    chain_id: u64,
    monitor: Option<Arc<TxMonitor>>,
}

#[async_trait]
impl Worker for TransferEthWorker {
    async fn do_work(&mut self, _work_index: u64) -> Result<()> {
        let account = self.wallet.account(self.account_index);
        let nonce = self.wallet.take_nonce(self.account_index);
        let (hash, raw) = build_signed_transfer(account.signer(), self.chain_id, nonce)?;

        // Register before submitting: a transaction mined before
        // registration would never match a head.
        let subscription = self.monitor.as_ref().map(|m| m.subscribe(hash));

        self.conn.provider().send_raw_transaction(&raw).await?;

        if let Some(subscription) = subscription {
            subscription.wait().await?;
        }
        Ok(())
    }
}

/// Build and sign a zero-value self-transfer, returning its hash and the
/// EIP-2718 encoded bytes ready for `eth_sendRawTransaction`.
fn build_signed_transfer(
    signer: &PrivateKeySigner,
    chain_id: u64,
    nonce: u64,
) -> Result<(TxHash, Vec<u8>)> {
    let mut tx = TxEip1559 {
        chain_id,
        nonce,
        gas_limit: TRANSFER_GAS_LIMIT,
        max_fee_per_gas: MAX_FEE_PER_GAS,
        max_priority_fee_per_gas: MAX_PRIORITY_FEE_PER_GAS,
        to: TxKind::Call(signer.address()),
        value: U256::ZERO,
        access_list: Default::default(),
        input: Bytes::new(),
    };
    let signature = signer.sign_transaction_sync(&mut tx).map_err(BenchError::Sign)?;
    let signed = tx.into_signed(signature);
    Ok((*signed.hash(), signed.encoded_2718()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
