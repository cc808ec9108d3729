//! Transport adapter boundary.
//!
//! The session engine never speaks the WebSocket wire protocol itself. It
//! drives an implementation of [`Transport`], which owns the handshake,
//! framing and the underlying socket.
//!
//! ## Contract
//!
//! - All methods take `&self`: one `receive` and one `send`/`close` may be in
//!   flight at the same time, and the implementation synchronizes internally.
//! - Cancellation is expressed by dropping the returned future; the engine
//!   races every call against its cancellation tokens.
//! - `receive` copies at most `buf.len()` bytes per call and reports whether
//!   the chunk ends the logical message.
//!
//! ## Backends
//!
//! - `TungsteniteTransport` (feature `tungstenite`, on by default) over
//!   `tokio-tungstenite`.
//! - Any user type implementing [`Transport`], passed to the builder.

use std::collections::HashMap;

use async_trait::async_trait;
use url::Url;

use crate::connection::ConnectionState;
use crate::error::Result;
use crate::message::{CloseCode, MessageKind};
use crate::protocol::Received;

#[cfg(feature = "tungstenite")]
mod tungstenite;

#[cfg(feature = "tungstenite")]
pub use self::tungstenite::TungsteniteTransport;

/// Everything a transport needs to open the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Target address (`ws` or `wss`).
    pub address: Url,
    /// Extra request headers for the opening handshake.
    pub headers: HashMap<String, String>,
    /// Subprotocols offered during the handshake, in preference order.
    pub subprotocols: Vec<String>,
}

/// Raw connection phase as reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportState {
    /// Not connected yet.
    #[default]
    None,
    /// Handshake in progress.
    Connecting,
    /// Handshake completed.
    Open,
    /// Local close frame sent, waiting for the peer.
    CloseSent,
    /// Peer close frame received.
    CloseReceived,
    /// Close handshake completed.
    Closed,
    /// Connection dropped or failed.
    Aborted,
}

impl From<TransportState> for ConnectionState {
    fn from(state: TransportState) -> Self {
        match state {
            TransportState::None | TransportState::Connecting => ConnectionState::Connecting,
            TransportState::Open => ConnectionState::Open,
            TransportState::CloseSent | TransportState::CloseReceived => ConnectionState::Closing,
            TransportState::Closed | TransportState::Aborted => ConnectionState::Closed,
        }
    }
}

/// Opaque duplex message transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the opening handshake.
    async fn connect(&self, request: &ConnectRequest) -> Result<()>;

    /// Receive the next chunk into `buf`.
    async fn receive(&self, buf: &mut [u8]) -> Result<Received>;

    /// Write `data` as (part of) a message of type `kind`.
    async fn send(&self, data: &[u8], kind: MessageKind, end_of_message: bool) -> Result<()>;

    /// Send a close frame and wait for the peer to acknowledge it.
    ///
    /// If the peer closed first, this only completes the handshake.
    async fn close(&self, code: CloseCode, reason: &str) -> Result<()>;

    /// Current raw connection phase.
    fn state(&self) -> TransportState;
}
