//! Reassembly of fragmented inbound messages.

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::Result;
use crate::message::{CloseInfo, Message, MessageKind};
use crate::protocol::Received;

/// Result of feeding one receive result to the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembled {
    /// More fragments are needed.
    Pending,
    /// A logical message is complete.
    Message(Message),
    /// The peer closed; any partial message was discarded.
    Close(CloseInfo),
}

/// Accumulates fragments into complete messages.
///
/// The buffer grows with the message; no fragment count is enforced. The
/// only bound is the optional size cap from [`Limits`].
pub struct MessageAssembler {
    buffer: BytesMut,
    kind: Option<MessageKind>,
    fragment_count: usize,
    limits: Limits,
}

impl MessageAssembler {
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            kind: None,
            fragment_count: 0,
            limits,
        }
    }

    /// Feed one receive result along with the buffer it was written into.
    ///
    /// The message type is taken from the first fragment of a sequence.
    pub fn push(&mut self, received: Received, data: &[u8]) -> Result<Assembled> {
        let header = match received {
            Received::Close(info) => {
                self.reset();
                return Ok(Assembled::Close(info));
            }
            Received::Fragment(header) => header,
        };

        let chunk = data.get(..header.len).unwrap_or(data);
        let kind = *self.kind.get_or_insert(header.kind);

        let new_size = self.buffer.len() + chunk.len();
        if let Err(e) = self.limits.check_message_size(new_size) {
            self.reset();
            return Err(e);
        }

        self.buffer.extend_from_slice(chunk);
        self.fragment_count += 1;

        if header.fin {
            let payload = self.buffer.split().freeze();
            self.kind = None;
            self.fragment_count = 0;
            Ok(Assembled::Message(Message::new(kind, payload)))
        } else {
            Ok(Assembled::Pending)
        }
    }

    pub fn is_assembling(&self) -> bool {
        self.kind.is_some()
    }

    /// Bytes accumulated for the message in progress.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragment_count
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.kind = None;
        self.fragment_count = 0;
    }
}
