use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::config::Config;
use crate::connection::ConnectionState;
use crate::connection::sender::{SendSerializer, cancellable};
use crate::connection::state::StateCell;
use crate::dispatch::{Dispatcher, Event, EventQueue, SubscriptionId};
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseInfo, Message, Payload, PendingSend};
use crate::protocol::{Assembled, MessageAssembler};
use crate::transport::{ConnectRequest, Transport, TransportState};

/// State shared between the public handle and the background receive task.
struct Shared {
    request: ConnectRequest,
    config: Config,
    state: StateCell,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    sender: SendSerializer,
    events: Arc<EventQueue>,
    lifetime: CancellationToken,
    disposed: AtomicBool,
}

/// A client-side WebSocket session.
///
/// `WebSocket` owns one transport for its whole life. It drives the
/// `Connecting -> Open -> Closing -> Closed` state machine, runs the receive
/// loop on a background task, serializes outbound writes, and queues
/// `Opened`, `MessageReceived`, `Errored` and `Closed` events for delivery
/// on whichever context calls [`WebSocket::dispatch_pending`].
///
/// ## Example
///
/// ```rust,ignore
/// use wsession::{CloseCode, WebSocket};
///
/// let ws = WebSocket::new("wss://echo.example.test")?;
/// ws.on_message(|msg| println!("{:?}", msg.as_text()));
/// ws.connect().await?;
/// ws.send("hello world!").await?;
///
/// // On the consumer's context, once per tick:
/// ws.dispatch_pending();
///
/// ws.close(CloseCode::Normal, "bye").await?;
/// ws.dispose().await;
/// ```
///
/// ## Teardown
///
/// Call [`WebSocket::dispose`] when done. Dropping an undisposed socket still
/// cancels the background task, but sends no close frame and logs a warning.
pub struct WebSocket {
    shared: Arc<Shared>,
    dispatcher: Dispatcher,
    receive_task: Mutex<Option<JoinHandle<()>>>,
    connecting: AtomicBool,
}

/// Builder for [`WebSocket`].
pub struct WebSocketBuilder {
    address: String,
    headers: HashMap<String, String>,
    subprotocols: Vec<String>,
    config: Config,
    transport: Option<Arc<dyn Transport>>,
}

impl WebSocketBuilder {
    fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            headers: HashMap::new(),
            subprotocols: Vec::new(),
            config: Config::default(),
            transport: None,
        }
    }

    /// Add a request header sent with the opening handshake.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add several request headers.
    #[must_use]
    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Offer a subprotocol. Order of calls is preference order.
    #[must_use]
    pub fn subprotocol(mut self, protocol: impl Into<String>) -> Self {
        self.subprotocols.push(protocol.into());
        self
    }

    /// Offer several subprotocols.
    #[must_use]
    pub fn subprotocols<S: Into<String>>(mut self, protocols: impl IntoIterator<Item = S>) -> Self {
        self.subprotocols
            .extend(protocols.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use a specific transport instead of the default backend.
    #[must_use]
    pub fn transport<T: Transport + 'static>(mut self, transport: Arc<T>) -> Self {
        self.transport = Some(transport as Arc<dyn Transport>);
        self
    }

    /// Validate the address and create the socket.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAddress`] if the address does not parse
    /// - [`Error::InvalidScheme`] unless the scheme is `ws` or `wss`
    pub fn build(self) -> Result<WebSocket> {
        let address = Url::parse(&self.address)?;
        match address.scheme() {
            "ws" | "wss" => {}
            other => return Err(Error::InvalidScheme(other.to_owned())),
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => Self::default_transport()?,
        };

        let request = ConnectRequest {
            address,
            headers: self.headers,
            subprotocols: self.subprotocols,
        };
        Ok(WebSocket::from_parts(request, self.config, transport))
    }

    #[cfg(feature = "tungstenite")]
    fn default_transport() -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(crate::transport::TungsteniteTransport::new()))
    }

    #[cfg(not(feature = "tungstenite"))]
    fn default_transport() -> Result<Arc<dyn Transport>> {
        Err(Error::Transport("no transport backend configured".into()))
    }
}

impl WebSocket {
    /// Create a socket for `address` with the default transport.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidScheme`] unless the scheme is `ws` or `wss`.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Self::builder(address).build()
    }

    /// Start building a socket for `address`.
    #[must_use]
    pub fn builder(address: impl Into<String>) -> WebSocketBuilder {
        WebSocketBuilder::new(address)
    }

    fn from_parts(request: ConnectRequest, config: Config, transport: Arc<dyn Transport>) -> Self {
        let dispatcher = Dispatcher::new();
        let shared = Arc::new(Shared {
            request,
            config,
            state: StateCell::new(),
            transport: Mutex::new(Some(transport)),
            sender: SendSerializer::new(),
            events: dispatcher.queue().clone(),
            lifetime: CancellationToken::new(),
            disposed: AtomicBool::new(false),
        });
        Self {
            shared,
            dispatcher,
            receive_task: Mutex::new(None),
            connecting: AtomicBool::new(false),
        }
    }

    /// Target address.
    pub fn address(&self) -> &Url {
        &self.shared.request.address
    }

    /// Request headers sent with the opening handshake.
    pub fn request_headers(&self) -> &HashMap<String, String> {
        &self.shared.request.headers
    }

    /// Subprotocols offered during the handshake.
    pub fn subprotocols(&self) -> &[String] {
        &self.shared.request.subprotocols
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// Raw phase reported by the transport, if it has not been released.
    pub fn transport_state(&self) -> Option<TransportState> {
        self.shared.transport.lock().as_ref().map(|t| t.state())
    }

    /// Returns `true` once [`WebSocket::dispose`] has been called.
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    /// Wait until the state reaches `Closed`.
    pub async fn closed(&self) {
        self.shared.state.closed().await;
    }

    /// Open the connection and start the receive loop.
    ///
    /// Returns once the connection is `Open` or has failed.
    ///
    /// # Errors
    ///
    /// - [`Error::NotReady`] from `Closing`/`Closed`, or while another connect runs
    /// - [`Error::Disposed`] after disposal
    /// - [`Error::Cancelled`] if disposal interrupts the handshake
    /// - transport errors, which are also reported as `Errored` then `Closed`
    pub async fn connect(&self) -> Result<()> {
        self.connect_with_cancellation(&CancellationToken::new()).await
    }

    /// [`WebSocket::connect`] with a caller cancellation token.
    pub async fn connect_with_cancellation(&self, cancel: &CancellationToken) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        match self.state() {
            ConnectionState::Open => {
                warn!(address = %self.address(), "WebSocket is already open");
                return Ok(());
            }
            ConnectionState::Connecting => {}
            other => return Err(Error::NotReady(other)),
        }
        if self.connecting.swap(true, Ordering::AcqRel) {
            return Err(Error::NotReady(ConnectionState::Connecting));
        }

        let shared = &self.shared;
        let transport = shared.transport()?;
        debug!(address = %shared.request.address, "Connecting");

        let handshake = async {
            match shared.config.timeouts.connect {
                Some(limit) => timeout(limit, transport.connect(&shared.request))
                    .await
                    .map_err(|_| Error::ConnectTimeout(limit))?,
                None => transport.connect(&shared.request).await,
            }
        };

        match cancellable(&shared.lifetime, cancel, handshake).await {
            Ok(()) => {}
            Err(Error::Cancelled) => {
                debug!(address = %shared.request.address, "Connect cancelled");
                shared.state.close();
                shared.release_transport();
                return Err(Error::Cancelled);
            }
            Err(e) => {
                shared.fault(ConnectionState::Connecting, e.clone());
                return Err(e);
            }
        }

        let raw = transport.state();
        if raw != TransportState::Open {
            let e = Error::Transport(format!("transport reported {raw:?} after handshake"));
            shared.fault(ConnectionState::Connecting, e.clone());
            return Err(e);
        }

        // The task slot lock orders this against dispose: either dispose sees
        // Open with a task to join, or the transition below fails.
        let mut receive_task = self.receive_task.lock();
        if !shared
            .state
            .compare_and_set(ConnectionState::Connecting, ConnectionState::Open)
        {
            return Err(Error::NotReady(self.state()));
        }
        debug!(address = %shared.request.address, "Open");
        shared.events.push(Event::Opened);
        *receive_task = Some(tokio::spawn(Arc::clone(shared).receive_loop(transport)));
        Ok(())
    }

    /// Send a text or binary message.
    ///
    /// Concurrent sends are written one at a time in lock-acquisition order.
    ///
    /// # Errors
    ///
    /// - [`Error::NotReady`] unless the state is `Open`; the transport is not contacted
    /// - [`Error::Cancelled`] if disposal interrupts the write
    /// - transport errors, which are also reported as `Errored`; the connection stays open
    pub async fn send(&self, payload: impl Into<Payload>) -> Result<()> {
        self.send_with_cancellation(payload, &CancellationToken::new()).await
    }

    /// [`WebSocket::send`] with a caller cancellation token.
    pub async fn send_with_cancellation(
        &self,
        payload: impl Into<Payload>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let pending = PendingSend::from(payload.into());
        let shared = &self.shared;

        let state = shared.state.get();
        if !state.can_send() {
            return Err(Error::NotReady(state));
        }
        let Some(transport) = shared.transport_handle() else {
            return Err(Error::NotReady(shared.state.get()));
        };

        match shared
            .sender
            .send(&shared.state, transport.as_ref(), pending, &shared.lifetime, cancel)
            .await
        {
            Ok(()) => Ok(()),
            Err(e @ (Error::Cancelled | Error::NotReady(_))) => Err(e),
            Err(e) => {
                error!(address = %shared.request.address, error = %e, "Send failed");
                shared.events.push(Event::Errored(e.clone()));
                Err(e)
            }
        }
    }

    /// Close the connection.
    ///
    /// No-op unless the state is `Open`. Otherwise performs the close
    /// handshake, then queues `Closed(code, reason)`.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if the handshake was cancelled; the socket still ends `Closed`
    /// - transport errors, which are also reported as `Errored` then `Closed(AbnormalClosure)`
    pub async fn close(&self, code: CloseCode, reason: &str) -> Result<()> {
        self.close_with_cancellation(code, reason, &CancellationToken::new()).await
    }

    /// [`WebSocket::close`] with a caller cancellation token.
    pub async fn close_with_cancellation(
        &self,
        code: CloseCode,
        reason: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let shared = &self.shared;
        if !shared
            .state
            .compare_and_set(ConnectionState::Open, ConnectionState::Closing)
        {
            trace!(state = %self.state(), "Close ignored outside Open");
            return Ok(());
        }
        debug!(address = %shared.request.address, %code, reason, "Closing");

        let Some(transport) = shared.transport_handle() else {
            shared.finish(CloseInfo::new(code, reason));
            return Ok(());
        };

        match shared
            .close_handshake(transport.as_ref(), code, reason, cancel)
            .await
        {
            Ok(()) => {
                shared.finish(CloseInfo::new(code, reason));
                Ok(())
            }
            Err(Error::Cancelled) => {
                debug!(address = %shared.request.address, "Close cancelled");
                shared.finish(CloseInfo::new(code, reason));
                Err(Error::Cancelled)
            }
            Err(e) => {
                shared.fault(ConnectionState::Closing, e.clone());
                Err(e)
            }
        }
    }

    /// Tear the connection down.
    ///
    /// Closes an open connection, or waits for an in-flight close, bounded
    /// by the close timeout. Then cancels every in-flight operation,
    /// releases the transport and joins the receive task. Calling it again
    /// does nothing.
    pub async fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            trace!("Already disposed");
            return;
        }
        let shared = &self.shared;
        debug!(address = %shared.request.address, state = %self.state(), "Disposing");

        match self.state() {
            ConnectionState::Open => {
                if let Err(e) = self.close(CloseCode::Normal, "").await {
                    debug!(error = %e, "Close during dispose failed");
                }
            }
            ConnectionState::Closing => {
                if timeout(shared.config.timeouts.close, shared.state.closed())
                    .await
                    .is_err()
                {
                    warn!(
                        address = %shared.request.address,
                        "In-flight close did not finish before dispose"
                    );
                }
            }
            _ => {}
        }

        shared.lifetime.cancel();
        let task = {
            let mut receive_task = self.receive_task.lock();
            if let Some(ConnectionState::Open | ConnectionState::Closing) = shared.state.close() {
                shared.events.push(Event::Closed(CloseInfo::new(
                    CloseCode::AbnormalClosure,
                    "connection disposed",
                )));
            }
            receive_task.take()
        };
        shared.release_transport();

        if let Some(task) = task {
            let _ = task.await;
        }
        debug!(address = %shared.request.address, "Disposed");
    }

    /// Subscribe to `Opened`.
    pub fn on_open(&self, handler: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        self.dispatcher.subscribers().on_open(handler)
    }

    /// Subscribe to `MessageReceived`.
    pub fn on_message(&self, handler: impl Fn(&Message) + Send + Sync + 'static) -> SubscriptionId {
        self.dispatcher.subscribers().on_message(handler)
    }

    /// Subscribe to `Errored`.
    pub fn on_error(&self, handler: impl Fn(&Error) + Send + Sync + 'static) -> SubscriptionId {
        self.dispatcher.subscribers().on_error(handler)
    }

    /// Subscribe to `Closed`.
    pub fn on_close(&self, handler: impl Fn(&CloseInfo) + Send + Sync + 'static) -> SubscriptionId {
        self.dispatcher.subscribers().on_close(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.subscribers().unsubscribe(id)
    }

    /// Deliver every event queued so far to the subscribed handlers.
    ///
    /// Call this from the context that should run the handlers. Returns the
    /// number of events delivered.
    pub fn dispatch_pending(&self) -> usize {
        self.dispatcher.dispatch_pending()
    }

    /// Number of events waiting for the next drain pass.
    pub fn pending_events(&self) -> usize {
        self.shared.events.len()
    }

    /// Wait until at least one event is queued.
    pub async fn events_ready(&self) {
        self.shared.events.ready().await;
    }
}

impl Shared {
    fn transport_handle(&self) -> Option<Arc<dyn Transport>> {
        self.transport.lock().clone()
    }

    fn transport(&self) -> Result<Arc<dyn Transport>> {
        self.transport_handle().ok_or(Error::Disposed)
    }

    fn release_transport(&self) {
        if self.transport.lock().take().is_some() {
            trace!(address = %self.request.address, "Transport released");
        }
    }

    /// Write the close frame under the send lock and wait for the peer.
    ///
    /// Waiting for the lock counts against the close timeout. Running out of
    /// time is not a fault.
    async fn close_handshake(
        &self,
        transport: &dyn Transport,
        code: CloseCode,
        reason: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let limit = self.config.timeouts.close;
        let handshake = self
            .sender
            .exclusive(&self.lifetime, cancel, transport.close(code, reason));
        match timeout(limit, handshake).await {
            Ok(result) => result,
            Err(_) => {
                warn!(address = %self.request.address, ?limit, "Close handshake timed out");
                Ok(())
            }
        }
    }

    /// Reach `Closed` normally and queue `Closed(info)`.
    fn finish(&self, info: CloseInfo) {
        if self.state.close().is_some() {
            debug!(
                address = %self.request.address,
                code = %info.code,
                reason = %info.reason,
                "Closed"
            );
            self.events.push(Event::Closed(info));
            self.release_transport();
        }
    }

    /// Lifecycle fault: queue `Errored` then `Closed(AbnormalClosure)` and
    /// release resources. Ignored unless the state is still `expected`.
    fn fault(&self, expected: ConnectionState, err: Error) -> bool {
        if !self.state.compare_and_set(expected, ConnectionState::Closed) {
            debug!(error = %err, state = %self.state.get(), "Fault after state change ignored");
            return false;
        }
        error!(address = %self.request.address, error = %err, "Connection fault");
        let reason = err.to_string();
        self.events.push(Event::Errored(err));
        self.events
            .push(Event::Closed(CloseInfo::new(CloseCode::AbnormalClosure, reason)));
        self.lifetime.cancel();
        self.release_transport();
        true
    }

    async fn receive_loop(self: Arc<Self>, transport: Arc<dyn Transport>) {
        // A zero-length buffer would make every read an empty fragment.
        let mut buffer = vec![0u8; self.config.receive_buffer_size.max(1)];
        let mut assembler = MessageAssembler::new(self.config.limits.clone());

        // Keep reading while Closing so the peer's close acknowledgement is seen.
        while matches!(
            self.state.get(),
            ConnectionState::Open | ConnectionState::Closing
        ) {
            let received = tokio::select! {
                biased;
                () = self.lifetime.cancelled() => {
                    debug!("Receive loop cancelled");
                    return;
                }
                () = self.state.closed() => break,
                result = transport.receive(&mut buffer) => result,
            };

            match received.and_then(|r| assembler.push(r, &buffer)) {
                Ok(Assembled::Pending) => {}
                Ok(Assembled::Message(message)) => {
                    trace!(kind = %message.kind(), len = message.len(), "Message received");
                    self.events.push(Event::MessageReceived(message));
                }
                Ok(Assembled::Close(info)) => {
                    self.peer_closed(transport.as_ref(), info).await;
                    break;
                }
                Err(e) => {
                    self.fault(ConnectionState::Open, e);
                    break;
                }
            }
        }
        debug!(address = %self.request.address, "Receive loop exited");
    }

    async fn peer_closed(&self, transport: &dyn Transport, info: CloseInfo) {
        if !self
            .state
            .compare_and_set(ConnectionState::Open, ConnectionState::Closing)
        {
            trace!(code = %info.code, "Peer acknowledged close");
            return;
        }
        debug!(code = %info.code, reason = %info.reason, "Peer initiated close");

        // Reserved codes cannot go on the wire; answer them with Normal.
        let reply = if info.code.is_reserved() {
            CloseCode::Normal
        } else {
            info.code
        };
        let never = CancellationToken::new();
        if let Err(e) = self
            .close_handshake(transport, reply, &info.reason, &never)
            .await
        {
            if !e.is_cancelled() {
                warn!(error = %e, "Failed to answer peer close");
            }
        }
        self.finish(info);
    }
}

impl std::fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocket")
            .field("address", &self.shared.request.address.as_str())
            .field("state", &self.state())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Dropping without [`WebSocket::dispose`] skips the close handshake: the
/// lifetime token is cancelled, which stops the receive task and aborts any
/// in-flight operation, and the peer sees the connection drop.
impl Drop for WebSocket {
    fn drop(&mut self) {
        if self.is_disposed() {
            return;
        }
        if matches!(self.state(), ConnectionState::Open | ConnectionState::Closing) {
            warn!(
                address = %self.shared.request.address,
                state = %self.state(),
                "WebSocket dropped without dispose"
            );
        }
        self.shared.lifetime.cancel();
    }
}
