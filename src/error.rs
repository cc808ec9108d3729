//! Error types for the WebSocket session engine.
//!
//! Every variant carries owned, cloneable data so that the same error value
//! can be returned to an awaiting caller and enqueued as an `Errored` event.

use std::time::Duration;

use thiserror::Error;

use crate::connection::ConnectionState;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a WebSocket session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Address scheme is neither `ws` nor `wss`.
    #[error("Unsupported protocol: {0}")]
    InvalidScheme(String),

    /// Address could not be parsed as a URL.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// A request header name or value cannot be encoded by the transport.
    #[error("Invalid request header: {0}")]
    InvalidHeader(String),

    /// Operation attempted outside the state it requires.
    #[error("WebSocket is not ready (state: {0})")]
    NotReady(ConnectionState),

    /// I/O-layer failure reported by the transport.
    #[error("Transport fault: {0}")]
    Transport(String),

    /// Connect did not complete within the configured timeout.
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Operation was cancelled by the caller or by disposal.
    #[error("Operation cancelled")]
    Cancelled,

    /// Reassembled message exceeds the configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Size accumulated so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// A consumer event handler panicked during a drain pass.
    #[error("Event handler panicked: {0}")]
    Handler(String),

    /// The connection has been disposed.
    #[error("WebSocket has been disposed")]
    Disposed,
}

impl Error {
    /// Returns `true` for the expected unwind produced by cancellation.
    ///
    /// Cancelled operations are never reported on the `Errored` channel.
    #[must_use]
    #[inline]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidAddress(err.to_string())
    }
}

#[cfg(feature = "tungstenite")]
impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
