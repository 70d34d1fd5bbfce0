//! Connection dialing and pooling.
//!
//! Benchmark workers share a small pool of long-lived connections; each
//! worker is handed `connections[worker_index % pool_size]`. A single
//! connection multiplexes concurrent requests, so pooling is only needed
//! when the server-side per-connection queue becomes the bottleneck.
//!
//! Two dial paths exist:
//!
//! - [`create_connections`] dials a fixed-size pool sequentially and fails
//!   fast: benchmark setup is fatal on any dial error.
//! - [`try_connect`] retries forever (respecting cancellation) and is used
//!   for subscription-bearing connections that must survive transient
//!   unavailability at startup.

use std::time::Duration;

use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Result, RpcError};

/// Timeout for a single dial attempt.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay between dial attempts in [`try_connect`].
const DIAL_RETRY_DELAY: Duration = Duration::from_secs(1);

// ═══════════════════════════════════════════════════════════════════════════════
// RPC CONNECTION
// ═══════════════════════════════════════════════════════════════════════════════

/// A logically multiplexed JSON-RPC connection.
///
/// Wraps a type-erased alloy provider; WebSocket or HTTP transport is
/// selected from the URL scheme at dial time. Cloning is cheap and clones
/// share the underlying transport, so a single `RpcConnection` is safe for
/// concurrent use by many workers.
#[derive(Clone)]
pub struct RpcConnection {
    url: String,
    provider: DynProvider,
}

impl std::fmt::Debug for RpcConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcConnection")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl RpcConnection {
    /// Dial the endpoint once, with a bounded connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Connect`] if the dial fails and
    /// [`RpcError::ConnectTimeout`] if it does not complete in time.
    pub async fn connect(url: &str) -> Result<Self> {
        let provider = timeout(CONNECT_TIMEOUT, ProviderBuilder::new().connect(url))
            .await
            .map_err(|_| RpcError::ConnectTimeout(url.to_string()))?
            .map_err(|source| RpcError::Connect {
                url: url.to_string(),
                source,
            })?;

        Ok(Self {
            url: url.to_string(),
            provider: provider.erased(),
        })
    }

    /// The endpoint URL this connection was dialed against.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The underlying provider.
    #[must_use]
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POOL CREATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Dial `count` connections to `url` sequentially.
///
/// A single dial failure aborts creation; the caller treats this as a
/// fatal setup error.
///
/// # Errors
///
/// Returns the first dial error encountered.
pub async fn create_connections(url: &str, count: usize) -> Result<Vec<RpcConnection>> {
    let mut connections = Vec::with_capacity(count);
    for idx in 0..count {
        info!(%url, idx, "Dialing RPC node");
        connections.push(RpcConnection::connect(url).await?);
    }
    Ok(connections)
}

/// Dial `url`, retrying every second until it succeeds or `shutdown` fires.
///
/// Used for connections that carry subscriptions and therefore must come
/// up even when the node is briefly unavailable.
///
/// # Errors
///
/// Returns [`RpcError::Cancelled`] if `shutdown` is cancelled before a
/// connection is established.
pub async fn try_connect(url: &str, shutdown: &CancellationToken) -> Result<RpcConnection> {
    loop {
        if shutdown.is_cancelled() {
            return Err(RpcError::Cancelled);
        }
        info!(%url, "Dialing RPC node");
        match RpcConnection::connect(url).await {
            Ok(conn) => return Ok(conn),
            Err(e) => warn!(%url, error = %e, "Dial failed, retrying"),
        }
        tokio::select! {
            () = shutdown.cancelled() => return Err(RpcError::Cancelled),
            () = tokio::time::sleep(DIAL_RETRY_DELAY) => {}
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::MockServer;

    #[tokio::test]
    async fn connect_http_endpoint() {
        let server = MockServer::start().await;
        let conn = RpcConnection::connect(&server.uri()).await.unwrap();
        assert_eq!(conn.url(), server.uri());
    }

    #[tokio::test]
    async fn create_pool_of_requested_size() {
        let server = MockServer::start().await;
        let pool = create_connections(&server.uri(), 3).await.unwrap();
        assert_eq!(pool.len(), 3);
    }

    #[tokio::test]
    async fn connect_rejects_malformed_url() {
        let err = RpcConnection::connect("not a url").await.unwrap_err();
        assert!(matches!(err, RpcError::Connect { .. }));
    }

    #[tokio::test]
    async fn try_connect_honors_cancellation() {
        // The URL never parses, so the loop can only exit via the token.
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let err = try_connect("not a url", &shutdown).await.unwrap_err();
        assert!(matches!(err, RpcError::Cancelled));
    }

    #[tokio::test]
    async fn clones_share_the_endpoint() {
        let server = MockServer::start().await;
        let conn = RpcConnection::connect(&server.uri()).await.unwrap();
        let clone = conn.clone();
        assert_eq!(conn.url(), clone.url());
    }
}
