//! Ordered event buffer shared by the I/O task and the consumer.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::error::Error;
use crate::message::{CloseInfo, Message};

/// Notification produced by a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Connection reached `Open`.
    Opened,
    /// A complete message arrived.
    MessageReceived(Message),
    /// A fault occurred.
    Errored(Error),
    /// Connection reached `Closed`. Always the last event.
    Closed(CloseInfo),
}

impl Event {
    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Event::Opened => "open",
            Event::MessageReceived(_) => "message",
            Event::Errored(_) => "error",
            Event::Closed(_) => "close",
        }
    }
}

#[derive(Default)]
struct Inner {
    records: VecDeque<Event>,
    sealed: bool,
}

/// Multi-producer, single-consumer FIFO of [`Event`]s.
///
/// Once a `Closed` record is queued the queue is sealed and later pushes
/// are dropped, so `Closed` is delivered exactly once and last.
#[derive(Default)]
pub struct EventQueue {
    inner: Mutex<Inner>,
    ready: Notify,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Returns `false` if the queue is sealed.
    pub fn push(&self, event: Event) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.sealed {
                debug!(event = event.name(), "Dropping event queued after close");
                return false;
            }
            if matches!(event, Event::Closed(_)) {
                inner.sealed = true;
            }
            trace!(event = event.name(), queued = inner.records.len() + 1, "Event queued");
            inner.records.push_back(event);
        }
        self.ready.notify_one();
        true
    }

    /// Remove every record queued so far.
    ///
    /// Records pushed after this call belong to the next pass.
    pub fn take_pass(&self) -> VecDeque<Event> {
        std::mem::take(&mut self.inner.lock().records)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }

    /// Returns `true` once a `Closed` record has been queued.
    pub fn is_sealed(&self) -> bool {
        self.inner.lock().sealed
    }

    /// Wait until at least one record is queued.
    pub async fn ready(&self) {
        loop {
            let notified = self.ready.notified();
            if !self.is_empty() {
                return;
            }
            notified.await;
        }
    }
}
