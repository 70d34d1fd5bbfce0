//! Error types for the RPC connection layer.

use thiserror::Error;

/// Result type for RPC connection operations.
pub type Result<T> = std::result::Result<T, RpcError>;

/// Errors that can occur while dialing or using an RPC connection.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Failed to dial the RPC endpoint.
    #[error("failed to connect to {url}: {source}")]
    Connect {
        /// The endpoint that was dialed.
        url: String,
        /// The underlying transport error.
        source: alloy::transports::TransportError,
    },

    /// The dial attempt did not complete within the connect timeout.
    #[error("connection to {0} timed out")]
    ConnectTimeout(String),

    /// A transport-level error on an established connection.
    #[error(transparent)]
    Transport(#[from] alloy::transports::TransportError),

    /// Failed to establish a subscription on this connection.
    #[error("subscription failed: {0}")]
    Subscribe(String),

    /// The dial loop was cancelled before a connection was established.
    #[error("connection attempt cancelled")]
    Cancelled,
}
