//! Event delivery on a consumer-designated context.
//!
//! The receive task and error paths push [`Event`]s into an [`EventQueue`].
//! The consumer drains it from whatever context it chooses (a UI tick, a
//! dedicated task, a test loop) with [`Dispatcher::dispatch_pending`]. Each
//! pass delivers only the records present when the pass starts, so a
//! steady stream of inbound traffic cannot stall the consumer's context.

mod queue;
mod subscribers;

use std::sync::Arc;

use tracing::trace;

pub use queue::{Event, EventQueue};
pub use subscribers::{
    CloseHandler, ErrorHandler, MessageHandler, OpenHandler, SubscriptionId, Subscribers,
};

/// Pairs the shared queue with the handlers that consume it.
pub struct Dispatcher {
    queue: Arc<EventQueue>,
    subscribers: Subscribers,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Arc::new(EventQueue::new()),
            subscribers: Subscribers::new(),
        }
    }

    /// The producer side, shared with I/O tasks.
    #[must_use]
    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn subscribers(&self) -> &Subscribers {
        &self.subscribers
    }

    /// Run one drain pass. Returns the number of records delivered.
    pub fn dispatch_pending(&self) -> usize {
        let pass = self.queue.take_pass();
        let count = pass.len();
        for event in pass {
            self.subscribers.deliver(&event);
        }
        if count > 0 {
            trace!(count, "Drain pass delivered events");
        }
        count
    }
}
