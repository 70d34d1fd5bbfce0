//! Head-driven transaction confirmation monitor.
//!
//! Polling `eth_getTransactionReceipt` per transaction collapses at high
//! submit rates. Instead the monitor holds a single `newHeads`
//! subscription on a dedicated connection; for every new head it fetches
//! the block's transaction hash list once and fans a confirmation signal
//! out to every registered waiter whose hash appears in the block. One
//! block-level fetch per head amortizes the cost across all transactions
//! confirmed in that block.
//!
//! # Protocol
//!
//! 1. A submitter calls [`TxMonitor::subscribe`] with the transaction hash
//!    **before** submitting; a transaction mined before registration will
//!    never match.
//! 2. It submits, then awaits [`TxSubscription::wait`] under its work
//!    deadline.
//! 3. The head task delivers the confirming block number through a
//!    one-shot channel and removes the map entry. Dropping an undelivered
//!    subscription (cancellation, timeout) removes the entry instead.
//!
//! Re-orgs are not handled: the first canonical chain the monitor observes
//! is truth, and a transaction dropped by a re-org is not re-signaled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use alloy::primitives::TxHash;
use alloy::providers::Provider;
use evm_rpc::{RpcConnection, RpcError};
use futures::StreamExt;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{BenchError, Result};

type SubscriptionMap = Mutex<HashMap<TxHash, oneshot::Sender<u64>>>;

// ═══════════════════════════════════════════════════════════════════════════════
// TX MONITOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Translates the single new-head subscription into per-transaction-hash
/// confirmation delivery.
#[derive(Debug)]
pub struct TxMonitor {
    subs: Arc<SubscriptionMap>,
}

impl TxMonitor {
    fn new() -> Self {
        Self {
            subs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Dial a dedicated connection, subscribe to `newHeads`, and spawn the
    /// head-consumer task.
    ///
    /// The dial retries until it succeeds or `shutdown` fires. If the head
    /// subscription later errors or ends, the monitor logs and halts;
    /// outstanding waiters are freed by their per-work deadlines.
    ///
    /// # Errors
    ///
    /// Returns an error if the dial loop is cancelled or the subscription
    /// cannot be established.
    pub async fn start(url: &str, shutdown: CancellationToken) -> Result<Arc<Self>> {
        let conn = evm_rpc::try_connect(url, &shutdown).await?;
        let heads = conn
            .provider()
            .subscribe_blocks()
            .await
            .map_err(|e| RpcError::Subscribe(e.to_string()))?;

        let monitor = Arc::new(Self::new());
        let task = Arc::clone(&monitor);
        tokio::spawn(async move {
            task.head_loop(conn, heads.into_stream(), shutdown).await;
        });
        Ok(monitor)
    }

    /// Register interest in `hash`. Must be called before the transaction
    /// is submitted.
    #[must_use]
    pub fn subscribe(&self, hash: TxHash) -> TxSubscription {
        let (tx, rx) = oneshot::channel();
        self.lock_subs().insert(hash, tx);
        TxSubscription {
            hash,
            rx,
            subs: Arc::clone(&self.subs),
            settled: false,
        }
    }

    /// Whether `hash` currently has a registered waiter.
    #[must_use]
    pub fn is_registered(&self, hash: TxHash) -> bool {
        self.lock_subs().contains_key(&hash)
    }

    /// Number of outstanding registrations.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.lock_subs().len()
    }

    async fn head_loop(
        &self,
        conn: RpcConnection,
        mut heads: impl futures::Stream<Item = alloy::rpc::types::Header> + Unpin,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Confirmation monitor stopped");
                    return;
                }
                maybe_head = heads.next() => {
                    let Some(head) = maybe_head else {
                        warn!("Head subscription ended, monitor halting");
                        return;
                    };
                    if let Err(e) = self.handle_head(&conn, head.inner.number).await {
                        error!(error = %e, "Could not fetch block transactions, monitor halting");
                        return;
                    }
                }
            }
        }
    }

    /// Fetch block `number`'s transaction hashes and deliver signals.
    async fn handle_head(&self, conn: &RpcConnection, number: u64) -> Result<()> {
        let started = Instant::now();
        let outstanding = self.outstanding();
        let Some(block) = conn.provider().get_block_by_number(number.into()).await? else {
            return Ok(());
        };
        let hashes: Vec<TxHash> = block.transactions.hashes().collect();
        let confirmed = self.deliver(number, &hashes);
        info!(
            head = number,
            confirmed,
            outstanding,
            elapsed = ?started.elapsed(),
            "New head processed"
        );
        Ok(())
    }

    /// Signal every registered waiter whose hash appears in `hashes`,
    /// removing each entry. Returns the number of deliveries.
    fn deliver(&self, block_number: u64, hashes: &[TxHash]) -> usize {
        let mut subs = self.lock_subs();
        let mut confirmed = 0;
        for hash in hashes {
            if let Some(waiter) = subs.remove(hash) {
                // The receiver may already be gone (timed-out worker);
                // that is its cancellation, not ours.
                let _ = waiter.send(block_number);
                confirmed += 1;
            }
        }
        confirmed
    }

    fn lock_subs(&self) -> std::sync::MutexGuard<'_, HashMap<TxHash, oneshot::Sender<u64>>> {
        self.subs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TX SUBSCRIPTION
// ═══════════════════════════════════════════════════════════════════════════════

/// A one-shot wait handle for a single transaction hash.
///
/// Dropping the handle before delivery unregisters the hash, so a worker
/// whose deadline fires mid-wait leaves no entry behind.
#[derive(Debug)]
pub struct TxSubscription {
    hash: TxHash,
    rx: oneshot::Receiver<u64>,
    subs: Arc<SubscriptionMap>,
    settled: bool,
}

impl TxSubscription {
    /// The transaction hash this subscription is registered for.
    #[must_use]
    pub const fn hash(&self) -> TxHash {
        self.hash
    }

    /// Await the confirmation signal, returning the confirming block
    /// number.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::MonitorHalted`] if the delivery channel was
    /// torn down without a signal.
    pub async fn wait(mut self) -> Result<u64> {
        match (&mut self.rx).await {
            Ok(block_number) => {
                self.settled = true;
                Ok(block_number)
            }
            Err(_) => {
                self.settled = true;
                Err(BenchError::MonitorHalted)
            }
        }
    }
}

impl Drop for TxSubscription {
    fn drop(&mut self) {
        if !self.settled {
            self.subs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.hash);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
