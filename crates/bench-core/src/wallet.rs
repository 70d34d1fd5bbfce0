//! Deterministic test accounts and nonce vending.
//!
//! The benchmark drives many senders concurrently, so querying the chain
//! for every nonce is both too slow and racy. Instead the wallet derives a
//! fixed set of accounts from a BIP-39 seed phrase, fetches all pending
//! nonces once in a single batched request, and then vends nonces from
//! per-account atomic counters.
//!
//! Nonces handed out by [`TestWallet::take_nonce`] are strictly increasing
//! and never reissued. There is no automatic resynchronization: if the node
//! rejects a transaction after its nonce was taken, later submissions from
//! that account fail until the benchmark is restarted.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::{Address, U64};
use alloy::signers::local::coins_bip39::English;
use alloy::signers::local::{MnemonicBuilder, PrivateKeySigner};
use alloy::providers::Provider;
use evm_rpc::RpcConnection;
use tracing::debug;

use crate::error::{BenchError, Result};

/// BIP-44 derivation path prefix for Ethereum accounts.
const DERIVATION_PATH_PREFIX: &str = "m/44'/60'/0'/0/";

// ═══════════════════════════════════════════════════════════════════════════════
// TEST ACCOUNT
// ═══════════════════════════════════════════════════════════════════════════════

/// A single derived account: signing key, address, and its pending nonce.
#[derive(Debug)]
pub struct TestAccount {
    address: Address,
    signer: PrivateKeySigner,
    pending_nonce: AtomicU64,
}

impl TestAccount {
    /// The account address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The account's signing key.
    #[must_use]
    pub const fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEST WALLET
// ═══════════════════════════════════════════════════════════════════════════════

/// A fixed set of accounts derived from one seed phrase.
#[derive(Debug)]
pub struct TestWallet {
    accounts: Vec<TestAccount>,
}

impl TestWallet {
    /// Derive `count` accounts from `phrase` along `m/44'/60'/0'/0/i`.
    ///
    /// Leading and trailing whitespace in the phrase is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Derive`] if the phrase is not a valid BIP-39
    /// mnemonic or a key cannot be derived.
    pub fn from_mnemonic(phrase: &str, count: usize) -> Result<Self> {
        let phrase = phrase.trim();
        let mut accounts = Vec::with_capacity(count);
        for i in 0..count {
            let signer = MnemonicBuilder::<English>::default()
                .phrase(phrase)
                .derivation_path(format!("{DERIVATION_PATH_PREFIX}{i}"))
                .map_err(|e| BenchError::Derive(e.to_string()))?
                .build()
                .map_err(|e| BenchError::Derive(e.to_string()))?;
            accounts.push(TestAccount {
                address: signer.address(),
                signer,
                pending_nonce: AtomicU64::new(0),
            });
        }
        Ok(Self { accounts })
    }

    /// Number of derived accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the wallet holds no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// The account at `index`.
    #[must_use]
    pub fn account(&self, index: usize) -> &TestAccount {
        &self.accounts[index]
    }

    /// The address of the account at `index`.
    #[must_use]
    pub fn address(&self, index: usize) -> Address {
        self.accounts[index].address
    }

    /// Fetch pending nonces for every account in one batched request.
    ///
    /// Issues `eth_getTransactionCount(addr, "pending")` for each account
    /// in a single JSON-RPC batch and seeds the atomic counters.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the batch fails or any element errors.
    pub async fn fetch_nonces(&self, conn: &RpcConnection) -> Result<()> {
        let client = conn.provider().client();
        let mut batch = alloy::rpc::client::BatchRequest::new(client);
        let mut pending = Vec::with_capacity(self.accounts.len());
        for account in &self.accounts {
            let waiter = batch
                .add_call::<_, U64>("eth_getTransactionCount", &(account.address, "pending"))?;
            pending.push(waiter);
        }
        batch.send().await?;

        for (account, waiter) in self.accounts.iter().zip(pending) {
            let nonce = waiter.await?;
            account
                .pending_nonce
                .store(nonce.to::<u64>(), Ordering::SeqCst);
        }
        debug!(accounts = self.accounts.len(), "Fetched pending nonces");
        Ok(())
    }

    /// Atomically return the current pending nonce for account `index` and
    /// advance it.
    ///
    /// Values returned for one account form a strictly increasing,
    /// contiguous sequence from the fetched base; callers on distinct
    /// accounts never contend.
    #[must_use]
    pub fn take_nonce(&self, index: usize) -> u64 {
        self.accounts[index].pending_nonce.fetch_add(1, Ordering::SeqCst)
    }

    /// The next nonce that `take_nonce` would hand out, without advancing.
    #[must_use]
    pub fn pending_nonce(&self, index: usize) -> u64 {
        self.accounts[index].pending_nonce.load(Ordering::SeqCst)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    /// Widely used development mnemonic with well-known derived addresses.
    const TEST_MNEMONIC: &str =
        "test test test test test test test test test test test junk";

    #[test]
    fn derives_known_first_address() {
        let wallet = TestWallet::from_mnemonic(TEST_MNEMONIC, 2).unwrap();
        assert_eq!(wallet.len(), 2);
        assert_eq!(
            wallet.address(0),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
                .parse::<Address>()
                .unwrap()
        );
        assert_ne!(wallet.address(0), wallet.address(1));
    }

    #[test]
    fn trims_whitespace_around_phrase() {
        let padded = format!("  {TEST_MNEMONIC}\n");
        let a = TestWallet::from_mnemonic(&padded, 1).unwrap();
        let b = TestWallet::from_mnemonic(TEST_MNEMONIC, 1).unwrap();
        assert_eq!(a.address(0), b.address(0));
    }

    #[test]
    fn rejects_invalid_phrase() {
        let err = TestWallet::from_mnemonic("definitely not a mnemonic", 1).unwrap_err();
        assert!(matches!(err, BenchError::Derive(_)));
    }

    #[test]
    fn take_nonce_is_sequential_per_account() {
        let wallet = TestWallet::from_mnemonic(TEST_MNEMONIC, 2).unwrap();
        wallet.accounts[0].pending_nonce.store(3, Ordering::SeqCst);

        assert_eq!(wallet.take_nonce(0), 3);
        assert_eq!(wallet.take_nonce(0), 4);
        // A different account is unaffected.
        assert_eq!(wallet.take_nonce(1), 0);
        assert_eq!(wallet.pending_nonce(0), 5);
    }

    #[tokio::test]
    async fn take_nonce_concurrent_is_contiguous() {
        // 1000 concurrent takers on one account with base 7 must receive
        // exactly {7, ..., 1006} with no duplicates and no gaps.
        let wallet = Arc::new(TestWallet::from_mnemonic(TEST_MNEMONIC, 1).unwrap());
        wallet.accounts[0].pending_nonce.store(7, Ordering::SeqCst);

        let mut handles = Vec::new();
        for _ in 0..1000 {
            let wallet = Arc::clone(&wallet);
            handles.push(tokio::spawn(async move { wallet.take_nonce(0) }));
        }

        let mut seen = BTreeSet::new();
        for handle in handles {
            assert!(seen.insert(handle.await.unwrap()));
        }

        let expected: BTreeSet<u64> = (7..1007).collect();
        assert_eq!(seen, expected);
    }
}
