//! Error types for the UDP endpoint.

use thiserror::Error;

use slim_transport::error::SignalError;

/// Errors surfaced by the public endpoint API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SocketError {
    /// The endpoint was closed; it is single-use.
    #[error("socket already closed")]
    AlreadyClosed,

    /// A client-only operation was called on an endpoint with no
    /// default peer.
    #[error("socket has no connected peer")]
    NotConnected,

    #[error("failed to bind UDP socket: {0}")]
    BindFailed(#[source] std::io::Error),

    #[error("failed to send datagram: {0}")]
    SendFailed(#[source] std::io::Error),

    /// An outgoing signal could not be encoded.
    #[error("signal could not be encoded: {0}")]
    Signal(#[from] SignalError),
}
