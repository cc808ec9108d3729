//! Outbound write serialization.

use std::future::Future;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::connection::state::StateCell;
use crate::error::{Error, Result};
use crate::message::PendingSend;
use crate::transport::Transport;

/// Run `fut` unless either token fires first.
///
/// Linking the connection-lifetime token with the caller's token means
/// disposal cancels every in-flight operation without caller cooperation.
pub(crate) async fn cancellable<T>(
    lifetime: &CancellationToken,
    caller: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = lifetime.cancelled() => Err(Error::Cancelled),
        () = caller.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

/// Guarantees at most one write reaches the transport at a time.
///
/// The lock is tokio's fair mutex: waiters acquire it in arrival order. The
/// guard is dropped on every exit path, including cancellation.
#[derive(Debug, Default)]
pub(crate) struct SendSerializer {
    lock: Mutex<()>,
}

impl SendSerializer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Hold the write lock for the duration of `fut`.
    pub(crate) async fn exclusive<T>(
        &self,
        lifetime: &CancellationToken,
        caller: &CancellationToken,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let _guard = cancellable(lifetime, caller, async { Ok(self.lock.lock().await) }).await?;
        cancellable(lifetime, caller, fut).await
    }

    /// Write one complete message.
    ///
    /// Fails with [`Error::NotReady`] without touching the transport unless
    /// the state is `Open` while the lock is held.
    pub(crate) async fn send(
        &self,
        state: &StateCell,
        transport: &dyn Transport,
        pending: PendingSend,
        lifetime: &CancellationToken,
        caller: &CancellationToken,
    ) -> Result<()> {
        let _guard = cancellable(lifetime, caller, async { Ok(self.lock.lock().await) }).await?;

        let current = state.get();
        if !current.can_send() {
            return Err(Error::NotReady(current));
        }

        trace!(kind = %pending.kind, len = pending.data.len(), "Writing message");
        cancellable(
            lifetime,
            caller,
            transport.send(&pending.data, pending.kind, true),
        )
        .await
    }

    #[cfg(test)]
    fn is_locked(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}
