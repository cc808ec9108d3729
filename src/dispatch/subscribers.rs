//! Typed handler registry, one list per event kind.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::dispatch::Event;
use crate::error::Error;
use crate::message::{CloseInfo, Message};

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type OpenHandler = Arc<dyn Fn() + Send + Sync>;
pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;
pub type CloseHandler = Arc<dyn Fn(&CloseInfo) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    open: Vec<(SubscriptionId, OpenHandler)>,
    message: Vec<(SubscriptionId, MessageHandler)>,
    error: Vec<(SubscriptionId, ErrorHandler)>,
    close: Vec<(SubscriptionId, CloseHandler)>,
}

impl Registry {
    fn next_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }
}

/// Handlers for the four event kinds.
///
/// Handlers are snapshotted before each delivery, so a handler may
/// subscribe or unsubscribe without deadlocking; the change applies from
/// the next event on.
#[derive(Default)]
pub struct Subscribers {
    registry: Mutex<Registry>,
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

fn snapshot<H: Clone>(entries: &[(SubscriptionId, H)]) -> Vec<H> {
    entries.iter().map(|(_, h)| h.clone()).collect()
}

impl Subscribers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_open(&self, handler: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        let mut registry = self.registry.lock();
        let id = registry.next_id();
        registry.open.push((id, Arc::new(handler)));
        id
    }

    pub fn on_message(&self, handler: impl Fn(&Message) + Send + Sync + 'static) -> SubscriptionId {
        let mut registry = self.registry.lock();
        let id = registry.next_id();
        registry.message.push((id, Arc::new(handler)));
        id
    }

    pub fn on_error(&self, handler: impl Fn(&Error) + Send + Sync + 'static) -> SubscriptionId {
        let mut registry = self.registry.lock();
        let id = registry.next_id();
        registry.error.push((id, Arc::new(handler)));
        id
    }

    pub fn on_close(&self, handler: impl Fn(&CloseInfo) + Send + Sync + 'static) -> SubscriptionId {
        let mut registry = self.registry.lock();
        let id = registry.next_id();
        registry.close.push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.open.len()
            + registry.message.len()
            + registry.error.len()
            + registry.close.len();
        registry.open.retain(|(sid, _)| *sid != id);
        registry.message.retain(|(sid, _)| *sid != id);
        registry.error.retain(|(sid, _)| *sid != id);
        registry.close.retain(|(sid, _)| *sid != id);
        let after = registry.open.len()
            + registry.message.len()
            + registry.error.len()
            + registry.close.len();
        before != after
    }

    pub fn len(&self) -> usize {
        let registry = self.registry.lock();
        registry.open.len() + registry.message.len() + registry.error.len() + registry.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut registry = self.registry.lock();
        registry.open.clear();
        registry.message.clear();
        registry.error.clear();
        registry.close.clear();
    }

    /// Invoke every handler registered for `event`.
    ///
    /// Each invocation is isolated: a panic is turned into
    /// [`Error::Handler`] and reported to the error handlers, and delivery
    /// continues with the next handler.
    pub fn deliver(&self, event: &Event) {
        match event {
            Event::Opened => {
                let handlers = snapshot(&self.registry.lock().open);
                for handler in handlers {
                    self.invoke(event, || handler());
                }
            }
            Event::MessageReceived(message) => {
                let handlers = snapshot(&self.registry.lock().message);
                for handler in handlers {
                    self.invoke(event, || handler(message));
                }
            }
            Event::Errored(err) => self.report(err),
            Event::Closed(info) => {
                let handlers = snapshot(&self.registry.lock().close);
                for handler in handlers {
                    self.invoke(event, || handler(info));
                }
            }
        }
    }

    fn invoke(&self, event: &Event, f: impl FnOnce()) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
            let err = Error::Handler(panic_message(panic.as_ref()));
            error!(event = event.name(), error = %err, "Event handler failed");
            self.report(&err);
        }
    }

    /// Deliver `err` to the error handlers. Panics here are only logged.
    fn report(&self, err: &Error) {
        let handlers = snapshot(&self.registry.lock().error);
        for handler in handlers {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(err))) {
                error!(
                    error = %err,
                    panic = %panic_message(panic.as_ref()),
                    "Error handler failed"
                );
            }
        }
    }
}
