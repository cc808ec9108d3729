//! Message values, outbound payloads and close status codes.

use std::sync::OnceLock;

use bytes::Bytes;

/// WebSocket close status code per RFC 6455 Section 7.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CloseCode {
    /// Normal closure (1000). The purpose of the connection was fulfilled.
    #[default]
    Normal,
    /// Going away (1001). Server going down or client navigating away.
    GoingAway,
    /// Protocol error (1002).
    ProtocolError,
    /// Unsupported data (1003). Endpoint received a type of data it cannot accept.
    UnsupportedData,
    /// Reserved (1004). Must not be set in a close frame.
    Reserved,
    /// No status received (1005). Must not be set in a close frame.
    NoStatus,
    /// Abnormal closure (1006). Connection dropped without a close frame.
    AbnormalClosure,
    /// Invalid payload data (1007). Data inconsistent with the message type.
    InvalidPayloadData,
    /// Policy violation (1008).
    PolicyViolation,
    /// Message too big (1009).
    TooBigToProcess,
    /// Mandatory extension (1010). Client expected the server to negotiate an extension.
    MandatoryExtension,
    /// Server error (1011). Server hit an unexpected condition.
    ServerError,
    /// TLS handshake failure (1015). Must not be set in a close frame.
    TlsHandshakeFailure,
    /// Any code outside the table above, as seen on the wire.
    Unknown(u16),
}

impl CloseCode {
    /// Create a `CloseCode` from its numeric value.
    ///
    /// Values outside the standard table map to [`CloseCode::Unknown`].
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::UnsupportedData,
            1004 => CloseCode::Reserved,
            1005 => CloseCode::NoStatus,
            1006 => CloseCode::AbnormalClosure,
            1007 => CloseCode::InvalidPayloadData,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::TooBigToProcess,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::ServerError,
            1015 => CloseCode::TlsHandshakeFailure,
            other => CloseCode::Unknown(other),
        }
    }

    /// Get the numeric value of this close code.
    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::Reserved => 1004,
            CloseCode::NoStatus => 1005,
            CloseCode::AbnormalClosure => 1006,
            CloseCode::InvalidPayloadData => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::TooBigToProcess => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::ServerError => 1011,
            CloseCode::TlsHandshakeFailure => 1015,
            CloseCode::Unknown(code) => *code,
        }
    }

    /// Returns `true` for the non-standard sentinel.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, CloseCode::Unknown(_))
    }

    /// Check if this close code is reserved and MUST NOT be sent in a Close frame.
    ///
    /// Reserved codes per RFC 6455 Section 7.4.1:
    /// - 1004: Reserved
    /// - 1005: No Status Received
    /// - 1006: Abnormal Closure
    /// - 1015: TLS Handshake
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        matches!(self.as_u16(), 1004..=1006 | 1015)
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseCode::Unknown(code) => write!(f, "Unknown({code})"),
            other => write!(f, "{:?}({})", other, other.as_u16()),
        }
    }
}

/// Close status and reason reported when a connection reaches `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// The close status code.
    pub code: CloseCode,
    /// Human-readable reason, possibly empty.
    pub reason: String,
}

impl CloseInfo {
    /// Create close info with the given code and reason.
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Close info for a peer close frame that carried no status.
    #[must_use]
    pub fn no_status() -> Self {
        Self::new(CloseCode::NoStatus, "")
    }
}

/// Data message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// UTF-8 text.
    Text,
    /// Arbitrary bytes.
    Binary,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Text => write!(f, "Text"),
            MessageKind::Binary => write!(f, "Binary"),
        }
    }
}

/// A complete, reassembled inbound message.
///
/// The text view of a `Text` message is derived on first access and cached.
/// Payloads that are not valid UTF-8 decode lossily: each invalid sequence
/// becomes U+FFFD. Decoding never fails.
#[derive(Debug, Clone)]
pub struct Message {
    kind: MessageKind,
    payload: Bytes,
    text: OnceLock<String>,
}

impl Message {
    /// Create a message from its kind and payload.
    #[must_use]
    pub fn new(kind: MessageKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            text: OnceLock::new(),
        }
    }

    /// Create a text message.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        let message = Self::new(MessageKind::Text, Bytes::copy_from_slice(s.as_bytes()));
        let _ = message.text.set(s);
        message
    }

    /// Create a binary message.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(MessageKind::Binary, data)
    }

    /// The message type.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Returns `true` if this is a text message.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self.kind, MessageKind::Text)
    }

    /// Returns `true` if this is a binary message.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self.kind, MessageKind::Binary)
    }

    /// Raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Decoded text view, if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self.kind {
            MessageKind::Text => Some(
                self.text
                    .get_or_init(|| String::from_utf8_lossy(&self.payload).into_owned()),
            ),
            MessageKind::Binary => None,
        }
    }

    /// Consume and return the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.payload == other.payload
    }
}

impl Eq for Message {}

/// Outbound data accepted by `send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Sent as a text message.
    Text(String),
    /// Sent as a binary message.
    Binary(Bytes),
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_owned())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<&[u8]> for Payload {
    fn from(data: &[u8]) -> Self {
        Payload::Binary(Bytes::copy_from_slice(data))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Payload::Binary(Bytes::from(data))
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Payload::Binary(data)
    }
}

/// An outbound payload and its message type, owned by the send path while
/// the write is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    /// Message type written to the transport.
    pub kind: MessageKind,
    /// Encoded bytes.
    pub data: Bytes,
}

impl From<Payload> for PendingSend {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Text(s) => PendingSend {
                kind: MessageKind::Text,
                data: Bytes::from(s.into_bytes()),
            },
            Payload::Binary(data) => PendingSend {
                kind: MessageKind::Binary,
                data,
            },
        }
    }
}
