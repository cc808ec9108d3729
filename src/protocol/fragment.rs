//! Receive results as reported by a transport.

use crate::message::{CloseInfo, MessageKind};

/// Header of one data fragment copied into the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    /// Number of bytes written into the receive buffer.
    pub len: usize,
    /// Message type of the logical message this fragment belongs to.
    pub kind: MessageKind,
    /// `true` on the last fragment of a logical message.
    pub fin: bool,
}

/// Outcome of a single `Transport::receive` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A chunk of a data message.
    Fragment(FragmentHeader),
    /// The peer sent a close control frame.
    Close(CloseInfo),
}

impl Received {
    /// Shorthand for a data fragment.
    #[must_use]
    pub const fn fragment(len: usize, kind: MessageKind, fin: bool) -> Self {
        Received::Fragment(FragmentHeader { len, kind, fin })
    }

    /// Returns `true` if this is a peer close frame.
    #[must_use]
    pub const fn is_close(&self) -> bool {
        matches!(self, Received::Close(_))
    }
}
