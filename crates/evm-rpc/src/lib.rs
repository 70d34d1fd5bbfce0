//! JSON-RPC connection layer for the evm-bench workspace.
//!
//! This crate owns the two dial paths the benchmark needs:
//!
//! - A fixed-size pool of long-lived connections shared by workers
//!   round-robin ([`create_connections`]). Pool creation is all-or-nothing;
//!   a dial failure is a fatal setup error.
//! - A retrying dial loop ([`try_connect`]) for subscription-bearing
//!   connections, which keeps attempting every second until cancelled.
//!
//! [`RpcConnection`] itself is a thin, cheaply cloneable handle over a
//! type-erased alloy provider. The transport (WebSocket or HTTP) is chosen
//! from the URL scheme; subscriptions require a WebSocket endpoint.

pub mod connection;
pub mod error;

pub use connection::{RpcConnection, create_connections, try_connect};
pub use error::{Result, RpcError};
